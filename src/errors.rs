//! Error model for the IMAP client core
//!
//! Three error kinds cover the whole surface: bad construction-time config,
//! authentication failure, and everything else that can go wrong talking to
//! an IMAP server.

use thiserror::Error;

/// Errors raised while constructing an [`crate::config::IMAPConfig`] or
/// [`crate::pool::ConnectionPool`].
///
/// Raised only at construction time, never from a running client.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IMAP host required")]
    MissingHost,
    #[error("IMAP port required")]
    MissingPort,
    #[error("IMAPConfig.auth is required (PasswordAuth or OAuth2Auth)")]
    MissingAuth,
    #[error("invalid pool configuration: {0}")]
    InvalidPoolConfig(String),
}

/// Authentication failed, either during initial pool construction or while
/// replacing a connection dropped for a replacement-triggering error.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("IMAP LOGIN failed: {0}")]
    LoginFailed(String),
    #[error("IMAP XOAUTH2 auth failed: {0}")]
    OAuth2Failed(String),
    #[error("IMAP connection/auth failed: {0}")]
    ConnectFailed(String),
}

/// Everything else: tagged `NO`/`BAD` responses, malformed server
/// responses, empty-refs on ops that require at least one, mailbox
/// mismatch in a batch, pool exhaustion, a closed client, or an
/// unparseable `STATUS`/`APPENDUID`/`BODYSTRUCTURE`.
#[derive(Debug, Error)]
pub enum IMAPError {
    #[error("IMAP operation failed: {0}")]
    ProtocolError(String),
    #[error("IMAP network error: {0}")]
    NetworkError(String),
    #[error("operation timed out: {0}")]
    Timeout(String),
    #[error("{op} called with empty refs")]
    EmptyRefs { op: &'static str },
    #[error("all EmailRef.mailbox must match for {op} (got '{first}' and '{other}')")]
    MailboxMismatch {
        op: &'static str,
        first: String,
        other: String,
    },
    #[error("IMAP connection pool exhausted")]
    PoolExhausted,
    #[error("IMAPClient is closed")]
    ClientClosed,
    #[error("failed to parse {what}: {raw}")]
    UnparseableResponse { what: &'static str, raw: String },
    #[error("mailbox '{0}' not found or not selectable")]
    MailboxNotFound(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl IMAPError {
    /// True for the replacement-triggering error set: `NetworkError`
    /// and `Timeout` (wire-level IMAP abort, socket timeout, generic I/O,
    /// TLS error all funnel into these two variants). Tagged `NO`/`BAD`
    /// responses (`ProtocolError`) are deliberately excluded; retrying a
    /// server-rejected command would just get rejected again.
    pub fn is_replacement_triggering(&self) -> bool {
        matches!(self, Self::NetworkError(_) | Self::Timeout(_))
    }
}

/// Result alias used throughout the crate for IMAP operations.
pub type IMAPResult<T> = Result<T, IMAPError>;
