//! Pooled, retrying IMAP4rev1 client core.
//!
//! [`ImapClient`] is the public entry point: construct one with
//! [`ImapClient::connect`], then call its methods from as many concurrent
//! tasks as you like. Everything else in this crate exists in service of
//! that façade — connection pooling and retry (`pool`), progressive
//! UID-window search (`search`), `BODYSTRUCTURE` part selection
//! (`bodystructure`), MIME decoding (`mime`, `inline_cid`), wire-level
//! IMAP commands (`imap_io`), and the value types threaded through them
//! (`types`, `models`, `query`, `pagination`, `config`, `errors`, `auth`).

pub mod auth;
pub mod bodystructure;
pub mod client;
pub mod config;
pub mod errors;
pub mod imap_io;
pub mod inline_cid;
pub mod mime;
pub mod models;
pub mod pagination;
pub mod pool;
pub mod query;
pub mod search;
pub mod types;

pub use auth::{AuthContext, ImapAuth, NoAuth, OAuth2Auth, PasswordAuth};
pub use client::{ImapClient, MailboxStatus};
pub use config::{IMAPConfig, PoolConfig};
pub use errors::{AuthError, ConfigError, IMAPError, IMAPResult};
pub use models::{Attachment, AttachmentMeta, EmailAddress, EmailMessage, EmailOverview};
pub use pagination::PagedSearchResult;
pub use pool::ConnectionPool;
pub use query::IMAPQuery;
pub use types::EmailRef;
