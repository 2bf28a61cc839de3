//! Paged search result and cursor anchors

use crate::types::EmailRef;

/// One page of UIDs in newest-first order, plus anchors for the adjacent
/// pages. `total` is a *window total*: the count of UIDs matched within
/// the UID range(s) the progressive search engine actually scanned, not
/// a global mailbox count.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PagedSearchResult {
    pub refs: Vec<EmailRef>,
    pub newest_uid: Option<u32>,
    pub oldest_uid: Option<u32>,
    pub next_before_uid: Option<u32>,
    pub prev_after_uid: Option<u32>,
    pub total: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PagedSearchResult {
    pub fn empty() -> Self {
        Self::default()
    }
}
