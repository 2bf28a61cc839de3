//! Message parsing and MIME handling
//!
//! The engine no longer pulls a whole message over the wire to decode it:
//! [`crate::client::ImapClient::fetch`] walks the `BODYSTRUCTURE` tree
//! (`crate::bodystructure`) and issues one `BODY.PEEK[HEADER]` fetch plus a
//! `BODY.PEEK[<part>.MIME]`/`BODY.PEEK[<part>]` pair per selected text part.
//! [`parse_full_message`] assembles those pieces into the public
//! [`EmailMessage`] model; [`extract_attachment`] is the exception — it
//! still re-walks an already-fetched whole message, since
//! `fetch_attachment` fetches the complete `BODY.PEEK[]` for the one
//! message it targets rather than addressing a single section twice.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};
use mailparse::{DispositionType, MailHeader, ParsedMail};

use crate::errors::IMAPError;
use crate::models::{Attachment, AttachmentMeta, EmailAddress, EmailMessage, EmailOverview};
use crate::types::EmailRef;

/// Raw section bytes for one MIME part, as fetched by
/// `BODY.PEEK[<part>.MIME]` (the `mime_bytes`) and `BODY.PEEK[<part>]`
/// (the `body_bytes`).
pub struct FetchedPart {
    pub mime_bytes: Vec<u8>,
    pub body_bytes: Vec<u8>,
}

/// Assemble a fully decoded message from its header block, its selected
/// text/HTML parts, and the attachment metadata already derived from
/// `BODYSTRUCTURE`.
///
/// `received_at` is the server's `INTERNALDATE` for this UID, passed in
/// separately since it isn't part of the message bytes themselves. Inline
/// `cid:` rewriting is not done here — see [`crate::inline_cid`] — because
/// it needs attachment bytes fetched on demand, which only the caller can
/// do asynchronously.
pub fn parse_full_message(
    email_ref: EmailRef,
    header_bytes: &[u8],
    text_part: Option<FetchedPart>,
    html_part: Option<FetchedPart>,
    attachments: Vec<AttachmentMeta>,
    received_at: Option<DateTime<Utc>>,
) -> Result<EmailMessage, IMAPError> {
    let (mail_headers, _) =
        mailparse::parse_headers(header_bytes).map_err(|e| IMAPError::UnparseableResponse {
            what: "message headers",
            raw: e.to_string(),
        })?;
    let headers = to_header_map(&mail_headers);

    let text = text_part.map(|p| decode_part_text(&p.mime_bytes, &p.body_bytes)).transpose()?;
    let html = html_part.map(|p| decode_part_text(&p.mime_bytes, &p.body_bytes)).transpose()?;

    let subject = header_lookup(&headers, "subject").cloned();
    let message_id = header_lookup(&headers, "message-id").map(|v| v.trim().to_owned());
    let sent_at = header_lookup(&headers, "date").and_then(|d| parse_rfc2822_date(d));

    Ok(EmailMessage {
        email_ref,
        subject,
        from: header_lookup(&headers, "from").and_then(|v| parse_single_address(v)),
        to: header_lookup(&headers, "to")
            .map(|v| parse_address_list(v))
            .unwrap_or_default(),
        cc: header_lookup(&headers, "cc")
            .map(|v| parse_address_list(v))
            .unwrap_or_default(),
        bcc: header_lookup(&headers, "bcc")
            .map(|v| parse_address_list(v))
            .unwrap_or_default(),
        text,
        html,
        attachments,
        received_at,
        sent_at,
        message_id,
        headers,
    })
}

/// Parse only the header block of a message (e.g. a `BODY.PEEK[HEADER]`
/// fetch) into the lightweight overview projection.
pub fn parse_overview(
    email_ref: EmailRef,
    flags: Vec<String>,
    header_bytes: &[u8],
    received_at: Option<DateTime<Utc>>,
) -> Result<EmailOverview, IMAPError> {
    let (mail_headers, _) =
        mailparse::parse_headers(header_bytes).map_err(|e| IMAPError::UnparseableResponse {
            what: "message headers",
            raw: e.to_string(),
        })?;
    let headers = to_header_map(&mail_headers);

    Ok(EmailOverview {
        email_ref,
        flags,
        subject: header_lookup(&headers, "subject").cloned(),
        from: header_lookup(&headers, "from").and_then(|v| parse_single_address(v)),
        to: header_lookup(&headers, "to")
            .map(|v| parse_address_list(v))
            .unwrap_or_default(),
        sent_at: header_lookup(&headers, "date").and_then(|d| parse_rfc2822_date(d)),
        received_at,
        message_id: header_lookup(&headers, "message-id").map(|v| v.trim().to_owned()),
    })
}

/// Extracts the `Message-ID` header from a full RFC 822 message, for the
/// post-`APPEND` `UID SEARCH` fallback (`async-imap`'s `append` doesn't
/// surface `APPENDUID`; see [`crate::client::ImapClient::append`]).
pub fn extract_message_id(raw: &[u8]) -> Option<String> {
    let (headers, _) = mailparse::parse_headers(raw).ok()?;
    headers
        .iter()
        .find(|h| h.get_key_ref().eq_ignore_ascii_case("Message-ID"))
        .map(|h| h.get_value().trim().to_owned())
}

/// Reconstructs a synthetic RFC 822 stream from a part's MIME header bytes
/// and raw body bytes, then decodes it through `mailparse` rather than
/// hand-rolling base64/quoted-printable decoding ourselves.
fn decode_part_text(mime_bytes: &[u8], body_bytes: &[u8]) -> Result<String, IMAPError> {
    let mut synthetic = mime_bytes.to_vec();
    if !synthetic.ends_with(b"\r\n\r\n") && !synthetic.ends_with(b"\n\n") {
        synthetic.extend_from_slice(b"\r\n\r\n");
    }
    synthetic.extend_from_slice(body_bytes);

    let parsed = mailparse::parse_mail(&synthetic).map_err(|e| IMAPError::UnparseableResponse {
        what: "MIME part",
        raw: e.to_string(),
    })?;
    parsed.get_body().map_err(|e| IMAPError::UnparseableResponse {
        what: "MIME part body",
        raw: e.to_string(),
    })
}

/// Locate one attachment by its dotted part number and return its decoded
/// bytes, re-walking an already-fetched whole message rather than issuing a
/// second section-addressed `FETCH` (used only by `fetch_attachment`, which
/// fetches the complete message for the one UID it targets).
pub fn extract_attachment(raw: &[u8], part: &str) -> Result<Attachment, IMAPError> {
    let parsed = mailparse::parse_mail(raw).map_err(|e| IMAPError::UnparseableResponse {
        what: "RFC822 message",
        raw: e.to_string(),
    })?;

    let found = find_part(&parsed, "1".to_owned(), part).ok_or_else(|| {
        IMAPError::UnparseableResponse {
            what: "attachment part",
            raw: format!("no part numbered '{part}' in message"),
        }
    })?;

    let meta = attachment_meta(found, part.to_owned());
    let data = found
        .get_body_raw()
        .map_err(|e| IMAPError::UnparseableResponse {
            what: "attachment body",
            raw: e.to_string(),
        })?;
    Ok(Attachment { meta, data })
}

fn find_part<'a, 'b>(
    part: &'a ParsedMail<'b>,
    part_id: String,
    want: &str,
) -> Option<&'a ParsedMail<'b>> {
    if part_id == want {
        return Some(part);
    }
    for (idx, sub) in part.subparts.iter().enumerate() {
        let next_id = format!("{part_id}.{}", idx + 1);
        if let Some(found) = find_part(sub, next_id, want) {
            return Some(found);
        }
    }
    None
}

fn attachment_meta(part: &ParsedMail<'_>, part_id: String) -> AttachmentMeta {
    let ctype = part.ctype.mimetype.to_ascii_lowercase();
    let disp = part.get_content_disposition();
    let filename =
        attachment_filename(part, &disp.params).unwrap_or_else(|| format!("attachment-{part_id}"));
    let content_id = part
        .headers
        .iter()
        .find(|h| h.get_key_ref().eq_ignore_ascii_case("Content-ID"))
        .map(|h| h.get_value().trim_matches(['<', '>']).to_owned());
    let size = part.get_body_raw().map(|b| b.len()).unwrap_or(0);

    AttachmentMeta {
        part: part_id,
        filename,
        content_type: ctype,
        size,
        content_id,
        is_inline: false,
    }
}

fn attachment_filename(
    part: &ParsedMail<'_>,
    disp_params: &BTreeMap<String, String>,
) -> Option<String> {
    disp_params
        .get("filename")
        .cloned()
        .or_else(|| part.ctype.params.get("name").cloned())
}

/// Case-preserving header map: the first occurrence of a header name (by
/// case-insensitive comparison) wins, keeping that occurrence's original
/// casing as the key. Use [`header_lookup`] for case-insensitive reads.
fn to_header_map(headers: &[MailHeader<'_>]) -> BTreeMap<String, String> {
    let mut seen = HashSet::new();
    let mut map = BTreeMap::new();
    for h in headers {
        let key = h.get_key();
        if seen.insert(key.to_ascii_lowercase()) {
            map.insert(key, h.get_value());
        }
    }
    map
}

/// Case-insensitive read against a [`to_header_map`]-built map.
fn header_lookup<'a>(headers: &'a BTreeMap<String, String>, name: &str) -> Option<&'a String> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

fn parse_single_address(header_value: &str) -> Option<EmailAddress> {
    parse_address_list(header_value).into_iter().next()
}

fn parse_address_list(header_value: &str) -> Vec<EmailAddress> {
    let Ok(list) = mailparse::addrparse(header_value) else {
        return Vec::new();
    };
    list.into_inner()
        .into_iter()
        .flat_map(|addr| match addr {
            mailparse::MailAddr::Single(info) => vec![EmailAddress {
                name: info.display_name,
                address: info.addr,
            }],
            mailparse::MailAddr::Group(group) => group
                .addrs
                .into_iter()
                .map(|info| EmailAddress {
                    name: info.display_name,
                    address: info.addr,
                })
                .collect(),
        })
        .collect()
}

fn parse_rfc2822_date(value: &str) -> Option<DateTime<Utc>> {
    mailparse::dateparse(value)
        .ok()
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
}
