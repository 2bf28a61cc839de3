//! Public façade
//!
//! `ImapClient` is the crate's single entry point: construct one per
//! account, then call its methods from as many concurrent tasks as you
//! like. Every method borrows the shared [`ConnectionPool`] and returns
//! once its operation (plus any pool-level retry) completes.

use imap_proto::NameAttribute;

use crate::config::{IMAPConfig, PoolConfig};
use crate::errors::IMAPError;
use crate::imap_io;
use crate::models::{Attachment, EmailMessage, EmailOverview};
use crate::pagination::PagedSearchResult;
use crate::pool::{ConnectionPool, ConnectionState};
use crate::query::IMAPQuery;
use crate::search::search_progressive;
use crate::types::{EmailRef, assert_same_mailbox};

/// Mailbox message counts and UID bookkeeping returned by [`ImapClient::mailbox_status`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MailboxStatus {
    pub messages: u32,
    pub unseen: u32,
    pub uid_next: u32,
    pub uid_validity: u32,
}

/// Pooled, retrying IMAP client.
pub struct ImapClient {
    pool: ConnectionPool,
}

impl ImapClient {
    /// Eagerly opens and authenticates `pool_config.pool_size` connections.
    pub async fn connect(config: IMAPConfig, pool_config: PoolConfig) -> Result<Self, IMAPError> {
        Ok(Self {
            pool: ConnectionPool::new(config, pool_config).await?,
        })
    }

    /// Convenience wrapper around [`Self::search_page`] returning just the
    /// newest `limit` refs.
    pub async fn search(
        &self,
        mailbox: &str,
        query: &IMAPQuery,
        limit: u32,
    ) -> Result<Vec<EmailRef>, IMAPError> {
        Ok(self.search_page(mailbox, query, limit, None, None).await?.refs)
    }

    /// Progressive UID-window paged search. See [`crate::search`] for the
    /// widening-window algorithm this delegates to.
    pub async fn search_page(
        &self,
        mailbox: &str,
        query: &IMAPQuery,
        page_size: u32,
        before_uid: Option<u32>,
        after_uid: Option<u32>,
    ) -> Result<PagedSearchResult, IMAPError> {
        if before_uid.is_some() && after_uid.is_some() {
            return Err(IMAPError::ProtocolError(
                "cannot specify both before_uid and after_uid".to_owned(),
            ));
        }

        let result = search_progressive(&self.pool, mailbox, query, page_size, before_uid, after_uid).await?;
        Ok(paginate(result.uids, mailbox, page_size, before_uid, after_uid))
    }

    /// Fetch and fully decode `refs`: headers, text/HTML bodies (with
    /// inline `cid:` references rewritten to `data:` URIs), and attachment
    /// metadata. All refs must share one mailbox.
    ///
    /// Per message this issues `(UID INTERNALDATE BODYSTRUCTURE
    /// BODY.PEEK[HEADER])` first, then walks the returned `BODYSTRUCTURE`
    /// to select the best text/HTML parts and every attachment-shaped leaf,
    /// and finally fetches only those parts with
    /// `(BODY.PEEK[<part>.MIME] BODY.PEEK[<part>])` — the whole message is
    /// never pulled over the wire just to decode one projection of it.
    pub async fn fetch(&self, refs: &[EmailRef]) -> Result<Vec<EmailMessage>, IMAPError> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }
        let mailbox = assert_same_mailbox(refs, "fetch")?.to_owned();
        let refs = refs.to_vec();
        let pool = self.pool.clone();

        pool.run(move |state: &mut ConnectionState| {
            let mailbox = mailbox.clone();
            let refs = refs.clone();
            let pool = pool.clone();
            async move {
                pool.ensure_selected(state, &mailbox, true).await?;
                let config = pool.config();
                let mut out = Vec::with_capacity(refs.len());
                for r in &refs {
                    let Some(structure) =
                        imap_io::uid_fetch_structure(config, &mut state.session, r.uid).await?
                    else {
                        continue;
                    };
                    let Some(header_bytes) = structure.header() else {
                        continue;
                    };
                    let received_at = structure.internal_date().map(|d| d.with_timezone(&chrono::Utc));

                    let (text_part, html_part, attachments) = match structure.bodystructure() {
                        Some(bs) => {
                            let tree = crate::bodystructure::build_tree(bs);
                            let selected = crate::bodystructure::pick_best_text_parts(&tree);
                            let text_part =
                                fetch_selected_part(config, &mut state.session, r.uid, selected.plain).await?;
                            let html_part =
                                fetch_selected_part(config, &mut state.session, r.uid, selected.html).await?;
                            let attachments = selected.attachments.iter().map(|p| attachment_meta_from_part(p)).collect();
                            (text_part, html_part, attachments)
                        }
                        None => (None, None, Vec::new()),
                    };

                    let mut msg = crate::mime::parse_full_message(
                        r.clone(),
                        header_bytes,
                        text_part,
                        html_part,
                        attachments,
                        received_at,
                    )?;
                    resolve_inline_cids(config, &mut state.session, r.uid, &mut msg).await?;
                    out.push(msg);
                }
                Ok(out)
            }
        })
        .await
    }

    /// Fetch the lightweight list-view projection: flags, envelope-style
    /// headers, no body, no attachments.
    pub async fn fetch_overview(&self, refs: &[EmailRef]) -> Result<Vec<EmailOverview>, IMAPError> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }
        let mailbox = assert_same_mailbox(refs, "fetch_overview")?.to_owned();
        let refs = refs.to_vec();
        let pool = self.pool.clone();

        pool.run(move |state: &mut ConnectionState| {
            let mailbox = mailbox.clone();
            let refs = refs.clone();
            let pool = pool.clone();
            async move {
                pool.ensure_selected(state, &mailbox, true).await?;
                let config = pool.config();
                let mut out = Vec::with_capacity(refs.len());
                for r in &refs {
                    let query = "(UID FLAGS INTERNALDATE BODY.PEEK[HEADER])";
                    let fetches =
                        imap_io::uid_fetch(config, &mut state.session, &r.uid.to_string(), query).await?;
                    let Some(fetch) = fetches.into_iter().find(|f| f.uid == Some(r.uid)) else {
                        continue;
                    };
                    let Some(header_bytes) = fetch.header() else { continue };
                    let flags: Vec<String> = fetch.flags().map(|f| format!("{f:?}")).collect();
                    let received_at = fetch.internal_date().map(|d| d.with_timezone(&chrono::Utc));
                    out.push(crate::mime::parse_overview(
                        r.clone(),
                        flags,
                        header_bytes,
                        received_at,
                    )?);
                }
                Ok(out)
            }
        })
        .await
    }

    /// Fetch one attachment's decoded bytes by its dotted part number.
    pub async fn fetch_attachment(&self, r: &EmailRef, part: &str) -> Result<Attachment, IMAPError> {
        let mailbox = r.mailbox.clone();
        let uid = r.uid;
        let part = part.to_owned();
        let pool = self.pool.clone();

        pool.run(move |state: &mut ConnectionState| {
            let mailbox = mailbox.clone();
            let part = part.clone();
            let pool = pool.clone();
            async move {
                pool.ensure_selected(state, &mailbox, true).await?;
                let config = pool.config();
                let fetches =
                    imap_io::uid_fetch(config, &mut state.session, &uid.to_string(), "(UID BODY.PEEK[])")
                        .await?;
                let fetch = fetches
                    .into_iter()
                    .find(|f| f.uid == Some(uid))
                    .ok_or_else(|| IMAPError::UnparseableResponse {
                        what: "FETCH",
                        raw: format!("no response for uid {uid}"),
                    })?;
                let raw = fetch.body().ok_or_else(|| IMAPError::UnparseableResponse {
                    what: "FETCH",
                    raw: format!("uid {uid} returned no BODY[] data"),
                })?;
                crate::mime::extract_attachment(raw, &part)
            }
        })
        .await
    }

    /// Fetch just the `Message-ID` header for one message.
    pub async fn fetch_message_id(&self, r: &EmailRef) -> Result<Option<String>, IMAPError> {
        let mailbox = r.mailbox.clone();
        let uid = r.uid;
        let pool = self.pool.clone();

        pool.run(move |state: &mut ConnectionState| {
            let mailbox = mailbox.clone();
            let pool = pool.clone();
            async move {
                pool.ensure_selected(state, &mailbox, true).await?;
                let config = pool.config();
                let fetches = imap_io::uid_fetch(
                    config,
                    &mut state.session,
                    &uid.to_string(),
                    "(UID BODY.PEEK[HEADER.FIELDS (Message-ID)])",
                )
                .await?;
                let Some(fetch) = fetches.into_iter().find(|f| f.uid == Some(uid)) else {
                    return Ok(None);
                };
                let Some(header_bytes) = fetch.header() else {
                    return Ok(None);
                };
                let (headers, _) =
                    mailparse::parse_headers(header_bytes).map_err(|e| IMAPError::UnparseableResponse {
                        what: "Message-ID header",
                        raw: e.to_string(),
                    })?;
                Ok(headers
                    .iter()
                    .find(|h| h.get_key_ref().eq_ignore_ascii_case("Message-ID"))
                    .map(|h| h.get_value().trim().to_owned()))
            }
        })
        .await
    }

    pub async fn add_flags(&self, refs: &[EmailRef], flags: &[String]) -> Result<(), IMAPError> {
        self.store(refs, "+FLAGS", flags).await
    }

    pub async fn remove_flags(&self, refs: &[EmailRef], flags: &[String]) -> Result<(), IMAPError> {
        self.store(refs, "-FLAGS", flags).await
    }

    async fn store(&self, refs: &[EmailRef], mode: &str, flags: &[String]) -> Result<(), IMAPError> {
        if refs.is_empty() {
            return Ok(());
        }
        let mailbox = assert_same_mailbox(refs, "store")?.to_owned();
        let uid_set = uid_list(refs);
        let query = format!("{mode} ({})", flags.join(" "));
        let pool = self.pool.clone();

        pool.run(move |state: &mut ConnectionState| {
            let mailbox = mailbox.clone();
            let uid_set = uid_set.clone();
            let query = query.clone();
            let pool = pool.clone();
            async move {
                pool.ensure_selected(state, &mailbox, false).await?;
                imap_io::uid_store(pool.config(), &mut state.session, &uid_set, &query).await
            }
        })
        .await
    }

    /// `APPEND` a raw RFC 822 message, returning the ref the server assigned.
    ///
    /// `async-imap`'s `append` doesn't surface `APPENDUID`, so the new UID
    /// is recovered with a follow-up `UID SEARCH HEADER Message-ID <id>`
    /// and the highest matching UID is assumed to be the one just
    /// appended. `content` must carry a `Message-ID` header for this to
    /// work; messages without one fail loudly rather than return a
    /// guessed ref.
    pub async fn append(
        &self,
        mailbox: &str,
        content: &[u8],
        flags: &[String],
    ) -> Result<EmailRef, IMAPError> {
        let message_id = crate::mime::extract_message_id(content).ok_or_else(|| {
            IMAPError::UnparseableResponse {
                what: "APPEND content",
                raw: "message has no Message-ID header; cannot recover its UID after APPEND"
                    .to_owned(),
            }
        })?;

        let mailbox = mailbox.to_owned();
        let content = content.to_vec();
        let flags = flags.to_vec();
        let pool = self.pool.clone();

        pool.run(move |state: &mut ConnectionState| {
            let mailbox = mailbox.clone();
            let content = content.clone();
            let flags = flags.clone();
            let message_id = message_id.clone();
            let pool = pool.clone();
            async move {
                imap_io::append(pool.config(), &mut state.session, &mailbox, &content, &flags).await?;
                pool.ensure_selected(state, &mailbox, false).await?;
                let config = pool.config();
                let query = IMAPQuery::new().header("Message-ID", &message_id).build();
                let uids = imap_io::uid_search(config, &mut state.session, &query).await?;
                let uid = uids
                    .into_iter()
                    .max()
                    .ok_or_else(|| IMAPError::UnparseableResponse {
                        what: "UID SEARCH after APPEND",
                        raw: format!("no message found with Message-ID {message_id}"),
                    })?;
                Ok(EmailRef::new(uid, mailbox))
            }
        })
        .await
    }

    /// `EXPUNGE` a mailbox, permanently removing `\Deleted`-flagged messages.
    pub async fn expunge(&self, mailbox: &str) -> Result<(), IMAPError> {
        let mailbox = mailbox.to_owned();
        let pool = self.pool.clone();

        pool.run(move |state: &mut ConnectionState| {
            let mailbox = mailbox.clone();
            let pool = pool.clone();
            async move {
                pool.ensure_selected(state, &mailbox, false).await?;
                imap_io::expunge(pool.config(), &mut state.session).await
            }
        })
        .await
    }

    /// Move `refs` to `dst_mailbox`. Prefers RFC 6851 `MOVE`; on a tagged
    /// failure, falls back to `COPY` + `STORE +FLAGS.SILENT \Deleted` +
    /// `UID EXPUNGE` (RFC 4315), finally `EXPUNGE` if even that is
    /// unsupported.
    pub async fn move_messages(&self, refs: &[EmailRef], dst_mailbox: &str) -> Result<(), IMAPError> {
        if refs.is_empty() {
            return Ok(());
        }
        let mailbox = assert_same_mailbox(refs, "move")?.to_owned();
        let uid_set = uid_list(refs);
        let dst = dst_mailbox.to_owned();
        let pool = self.pool.clone();

        pool.run(move |state: &mut ConnectionState| {
            let mailbox = mailbox.clone();
            let uid_set = uid_set.clone();
            let dst = dst.clone();
            let pool = pool.clone();
            async move {
                pool.ensure_selected(state, &mailbox, false).await?;
                let config = pool.config();

                match imap_io::uid_move(config, &mut state.session, &uid_set, &dst).await {
                    Ok(()) => return Ok(()),
                    Err(IMAPError::ProtocolError(_)) => {}
                    Err(e) => return Err(e),
                }

                imap_io::uid_copy(config, &mut state.session, &uid_set, &dst).await?;
                imap_io::uid_store(config, &mut state.session, &uid_set, "+FLAGS.SILENT (\\Deleted)").await?;

                match imap_io::uid_expunge(config, &mut state.session, &uid_set).await {
                    Ok(()) => Ok(()),
                    Err(IMAPError::ProtocolError(_)) => {
                        imap_io::expunge(config, &mut state.session).await
                    }
                    Err(e) => Err(e),
                }
            }
        })
        .await
    }

    pub async fn copy(&self, refs: &[EmailRef], dst_mailbox: &str) -> Result<(), IMAPError> {
        if refs.is_empty() {
            return Ok(());
        }
        let mailbox = assert_same_mailbox(refs, "copy")?.to_owned();
        let uid_set = uid_list(refs);
        let dst = dst_mailbox.to_owned();
        let pool = self.pool.clone();

        pool.run(move |state: &mut ConnectionState| {
            let mailbox = mailbox.clone();
            let uid_set = uid_set.clone();
            let dst = dst.clone();
            let pool = pool.clone();
            async move {
                pool.ensure_selected(state, &mailbox, false).await?;
                imap_io::uid_copy(pool.config(), &mut state.session, &uid_set, &dst).await
            }
        })
        .await
    }

    pub async fn create_mailbox(&self, name: &str) -> Result<(), IMAPError> {
        let name = name.to_owned();
        let pool = self.pool.clone();
        pool.run(move |state: &mut ConnectionState| {
            let name = name.clone();
            let pool = pool.clone();
            async move { imap_io::create_mailbox(pool.config(), &mut state.session, &name).await }
        })
        .await
    }

    pub async fn delete_mailbox(&self, name: &str) -> Result<(), IMAPError> {
        let name = name.to_owned();
        let pool = self.pool.clone();
        pool.run(move |state: &mut ConnectionState| {
            let name = name.clone();
            let pool = pool.clone();
            async move { imap_io::delete_mailbox(pool.config(), &mut state.session, &name).await }
        })
        .await
    }

    /// List selectable mailboxes, skipping any tagged `\Noselect`.
    pub async fn list_mailboxes(&self) -> Result<Vec<String>, IMAPError> {
        let pool = self.pool.clone();
        pool.run(move |state: &mut ConnectionState| {
            let pool = pool.clone();
            async move {
                let names = imap_io::list_all_mailboxes(pool.config(), &mut state.session).await?;
                Ok(names
                    .into_iter()
                    .filter(|n| !n.attributes().contains(&NameAttribute::NoSelect))
                    .map(|n| n.name().to_owned())
                    .collect())
            }
        })
        .await
    }

    pub async fn mailbox_status(&self, mailbox: &str) -> Result<MailboxStatus, IMAPError> {
        let mailbox = mailbox.to_owned();
        let pool = self.pool.clone();
        pool.run(move |state: &mut ConnectionState| {
            let mailbox = mailbox.clone();
            let pool = pool.clone();
            async move {
                let status = imap_io::status_full(pool.config(), &mut state.session, &mailbox).await?;
                Ok(MailboxStatus {
                    messages: status.exists,
                    unseen: status.unseen.unwrap_or(0),
                    uid_next: status.uid_next.unwrap_or(0),
                    uid_validity: status.uid_validity.unwrap_or(0),
                })
            }
        })
        .await
    }

    pub async fn ping(&self) -> Result<(), IMAPError> {
        let pool = self.pool.clone();
        pool.run(move |state: &mut ConnectionState| {
            let pool = pool.clone();
            async move { imap_io::noop(pool.config(), &mut state.session).await }
        })
        .await
    }

    /// `true` if the server's cached capabilities advertise Gmail's
    /// non-standard `X-GM-EXT-1` extension.
    pub async fn supports_gmail_ext(&self) -> Result<bool, IMAPError> {
        let pool = self.pool.clone();
        pool.run(move |state: &mut ConnectionState| {
            let pool = pool.clone();
            async move {
                let caps = pool.capabilities(state).await?;
                Ok(caps.iter().any(|c| c.contains("X-GM-EXT-1")))
            }
        })
        .await
    }

    /// Logs out and closes every pooled connection. Further calls return
    /// [`IMAPError::ClientClosed`].
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Fetches one selected `BODYSTRUCTURE` leaf's section bytes, if any part
/// was selected at all (a message with no `text/plain` or no `text/html`
/// leaf simply has nothing to fetch for that slot).
async fn fetch_selected_part(
    config: &IMAPConfig,
    session: &mut imap_io::ImapSession,
    uid: u32,
    part: Option<&crate::bodystructure::BodyPart>,
) -> Result<Option<crate::mime::FetchedPart>, IMAPError> {
    let Some(part) = part else {
        return Ok(None);
    };
    let Some((mime_bytes, body_bytes)) =
        imap_io::uid_fetch_part(config, session, uid, &part.part_number).await?
    else {
        return Ok(None);
    };
    Ok(Some(crate::mime::FetchedPart { mime_bytes, body_bytes }))
}

fn attachment_meta_from_part(part: &crate::bodystructure::BodyPart) -> crate::models::AttachmentMeta {
    crate::models::AttachmentMeta {
        part: part.part_number.clone(),
        filename: part
            .filename
            .clone()
            .unwrap_or_else(|| format!("attachment-{}", part.part_number)),
        content_type: format!("{}/{}", part.content_type, part.content_subtype),
        size: part.octets as usize,
        content_id: part.content_id.clone(),
        is_inline: false,
    }
}

/// Rewrites `msg.html`'s `cid:` references to `data:` URIs, fetching only
/// the attachments actually referenced rather than every attachment on
/// the message.
async fn resolve_inline_cids(
    config: &IMAPConfig,
    session: &mut imap_io::ImapSession,
    uid: u32,
    msg: &mut EmailMessage,
) -> Result<(), IMAPError> {
    let Some(html) = msg.html.clone() else {
        return Ok(());
    };
    let cids = crate::inline_cid::find_cid_refs(&html);
    if cids.is_empty() {
        return Ok(());
    }

    let mut resolved = std::collections::HashMap::new();
    for cid in &cids {
        let Some(meta) = msg
            .attachments
            .iter()
            .find(|a| a.content_id.as_deref() == Some(cid.as_str()))
        else {
            continue;
        };
        let part = meta.part.clone();
        let content_type = meta.content_type.clone();
        if let Some((_, body)) = imap_io::uid_fetch_part(config, session, uid, &part).await? {
            resolved.insert(cid.clone(), (content_type, body));
        }
    }
    if resolved.is_empty() {
        return Ok(());
    }

    msg.html = Some(crate::inline_cid::apply_inline_data_uris(&html, &resolved));
    for meta in &mut msg.attachments {
        if let Some(cid) = &meta.content_id
            && resolved.contains_key(cid)
        {
            meta.is_inline = true;
        }
    }
    Ok(())
}

fn uid_list(refs: &[EmailRef]) -> String {
    refs.iter()
        .map(|r| r.uid.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Turn one progressive-search round's accumulated, ascending UIDs into a
/// page plus adjacent-page cursor anchors. Pure and network-free so the
/// pagination invariants (properties 4, 5, 10 and scenarios S1-S3) can be
/// checked directly against crafted UID sets.
fn paginate(
    uids: Vec<u32>,
    mailbox: &str,
    page_size: u32,
    before_uid: Option<u32>,
    after_uid: Option<u32>,
) -> PagedSearchResult {
    if uids.is_empty() {
        return PagedSearchResult::empty();
    }

    let page_size = page_size as usize;
    let page_uids_asc: Vec<u32> = if after_uid.is_some() {
        uids.iter().take(page_size).copied().collect()
    } else {
        let start = uids.len().saturating_sub(page_size);
        uids[start..].to_vec()
    };

    if page_uids_asc.is_empty() {
        return PagedSearchResult::empty();
    }

    let refs: Vec<EmailRef> = page_uids_asc
        .iter()
        .rev()
        .map(|&uid| EmailRef::new(uid, mailbox))
        .collect();
    let oldest_uid = page_uids_asc[0];
    let newest_uid = *page_uids_asc.last().expect("checked non-empty above");
    let known_more_in_window = uids.len() > page_uids_asc.len();

    let (has_older, has_newer) = if before_uid.is_some() {
        (known_more_in_window || oldest_uid > 1, true)
    } else if after_uid.is_some() {
        (true, known_more_in_window)
    } else {
        (known_more_in_window || oldest_uid > 1, false)
    };

    PagedSearchResult {
        refs,
        next_before_uid: has_older.then_some(oldest_uid),
        prev_after_uid: has_newer.then_some(newest_uid),
        newest_uid: Some(newest_uid),
        oldest_uid: Some(oldest_uid),
        total: uids.len(),
        has_next: has_older,
        has_prev: has_newer,
    }
}
