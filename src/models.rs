//! Message and attachment data model
//!
//! Plain value structs returned by the façade. `EmailMessage` is the fully
//! decoded message; `EmailOverview` is the lighter list-view projection.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::types::EmailRef;

/// A parsed `From`/`To`/`Cc`/`Bcc` mailbox: display name plus address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    pub name: Option<String>,
    pub address: String,
}

/// Lightweight metadata for one MIME part, independent of its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMeta {
    /// Dotted IMAP part number, e.g. `"2.1"`.
    pub part: String,
    pub filename: String,
    pub content_type: String,
    pub size: usize,
    pub content_id: Option<String>,
    pub is_inline: bool,
}

/// An attachment's metadata plus its decoded raw bytes.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub meta: AttachmentMeta,
    pub data: Vec<u8>,
}

/// A fully decoded message.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub email_ref: EmailRef,
    pub subject: Option<String>,
    pub from: Option<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub bcc: Vec<EmailAddress>,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<AttachmentMeta>,
    pub received_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub message_id: Option<String>,
    /// Case-preserving header map; first value wins per key, matching
    /// IMAP's own `HEADER.FIELDS` semantics of returning one value.
    pub headers: BTreeMap<String, String>,
}

/// The lighter projection used in list views: no body, no attachments.
#[derive(Debug, Clone)]
pub struct EmailOverview {
    pub email_ref: EmailRef,
    pub flags: Vec<String>,
    pub subject: Option<String>,
    pub from: Option<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub sent_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub message_id: Option<String>,
}
