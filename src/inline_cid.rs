//! Inline `cid:` reference rewriting
//!
//! HTML bodies commonly reference an inline image by `Content-ID`
//! (`<img src="cid:logo123">`). Browsers and most mail readers can't resolve
//! that URI scheme outside a rendered MIME tree, so callers that want a
//! self-contained HTML document get each reference rewritten to a `data:`
//! URI and the matching [`AttachmentMeta`] flagged `is_inline`.
//!
//! Split into two pure passes because resolving a `cid:` to bytes means
//! fetching that attachment's body over the wire, which only the async
//! caller ([`crate::client::ImapClient::fetch`]) can do: [`find_cid_refs`]
//! tells the caller which ids to fetch, [`apply_inline_data_uris`] does the
//! substitution once their bytes are in hand.

use std::collections::HashMap;
use std::sync::OnceLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;

fn cid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)(src|background)\s*=\s*(["'])cid:([^"']+)\2"#)
            .expect("static regex is valid")
    })
}

/// Every `Content-ID` referenced by a `cid:` URI in `html`, trimmed and
/// de-duplicated in first-seen order.
pub fn find_cid_refs(html: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    cid_pattern()
        .captures_iter(html)
        .map(|caps| caps[3].trim().to_owned())
        .filter(|cid| seen.insert(cid.clone()))
        .collect()
}

/// Replace every `cid:<id>` reference in `html` that has an entry in
/// `resolved` (content type, raw bytes) with a `data:` URI. Unmatched
/// references are left untouched.
pub fn apply_inline_data_uris(html: &str, resolved: &HashMap<String, (String, Vec<u8>)>) -> String {
    cid_pattern()
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let attr = &caps[1];
            let quote = &caps[2];
            let cid = caps[3].trim();

            let Some((content_type, bytes)) = resolved.get(cid) else {
                return caps[0].to_owned();
            };
            let encoded = BASE64.encode(bytes);
            format!("{attr}={quote}data:{content_type};base64,{encoded}{quote}")
        })
        .into_owned()
}
