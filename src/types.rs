//! The opaque handle mutations and fetches are addressed by.

/// Handle to one message: its IMAP `UID` plus the mailbox it lives in.
///
/// UIDs are only unique within a mailbox, and only stable within a single
/// `UIDVALIDITY` epoch — see the glossary in `SPEC_FULL.md`. Every
/// `EmailRef` in a batch operation must share the same `mailbox`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailRef {
    pub uid: u32,
    pub mailbox: String,
}

impl EmailRef {
    pub fn new(uid: u32, mailbox: impl Into<String>) -> Self {
        Self {
            uid,
            mailbox: mailbox.into(),
        }
    }
}

/// Checks that every ref in `refs` shares one mailbox, returning it.
///
/// Used by every batch mutation (`fetch`, `add_flags`, `move`, …) before
/// any network call is made, per the mailbox-mismatch invariant.
pub fn assert_same_mailbox<'a>(
    refs: &'a [EmailRef],
    op: &'static str,
) -> Result<&'a str, crate::errors::IMAPError> {
    let first = refs
        .first()
        .ok_or(crate::errors::IMAPError::EmptyRefs { op })?;
    for r in refs {
        if r.mailbox != first.mailbox {
            return Err(crate::errors::IMAPError::MailboxMismatch {
                op,
                first: first.mailbox.clone(),
                other: r.mailbox.clone(),
            });
        }
    }
    Ok(&first.mailbox)
}
