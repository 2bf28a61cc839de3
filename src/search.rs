//! Progressive UID-window search
//!
//! A plain `UID SEARCH` against a large mailbox can return a response line
//! with tens of thousands of UIDs even when the caller only wants the last
//! page. This module instead scans a widening sequence of non-overlapping
//! UID windows, stopping as soon as enough matches have accumulated, so the
//! typical "give me the newest page" query touches only the newest slice of
//! the mailbox.
//!
//! Ported directly from `_make_window`/`_search_in_window`/`_search_progressive`
//! in the reference implementation; the window-boundary and termination math
//! here is deliberately a line-for-line translation; this is the one module
//! where matching the original's arithmetic exactly matters more than
//! idiomatic restructuring.

use crate::config::PoolConfig;
use crate::errors::IMAPError;
use crate::imap_io::{self, ImapSession};
use crate::pool::{ConnectionPool, ConnectionState};
use crate::query::IMAPQuery;

/// A finite, inclusive UID range scanned in one `SEARCH` round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UidWindow {
    start: u32,
    end: u32,
}

impl UidWindow {
    fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// `before_uid`: UIDs strictly less than `before_uid` (older).
/// `after_uid`: UIDs strictly greater than `after_uid` (newer).
/// neither: the newest page, anchored at `uidnext - 1`.
fn make_window(newest: u32, before_uid: Option<u32>, after_uid: Option<u32>, window_size: u32) -> UidWindow {
    if let Some(before) = before_uid {
        let end = before.saturating_sub(1).max(1);
        let start = end.saturating_sub(window_size - 1).max(1);
        return UidWindow { start, end };
    }

    if let Some(after) = after_uid {
        let start = after + 1;
        let end = if newest >= start {
            (start + window_size - 1).min(newest).max(start)
        } else {
            start - 1
        };
        return UidWindow { start, end };
    }

    let end = newest;
    let start = end.saturating_sub(window_size - 1).max(1);
    UidWindow { start, end }
}

async fn search_in_window(
    session: &mut ImapSession,
    config: &crate::config::IMAPConfig,
    base_query: &IMAPQuery,
    win: UidWindow,
) -> Result<(String, Vec<u32>), IMAPError> {
    if win.is_empty() {
        return Ok((base_query.build(), Vec::new()));
    }

    let windowed = base_query.clone().uid(&format!("{}:{}", win.start, win.end));
    let criteria = windowed.build();
    let uids = imap_io::uid_search(config, session, &criteria).await?;
    Ok((criteria, uids))
}

/// Result of one progressive-search run: the final (widest) criteria string
/// issued, and the ascending, deduplicated, accumulated UIDs.
pub struct ProgressiveSearch {
    pub criteria: String,
    pub uids: Vec<u32>,
}

/// Run the progressive widening search described above against one mailbox.
///
/// `page_size` is the number of results the caller ultimately wants; the
/// engine stops widening once it has accumulated at least that many, or
/// once it hits `search_max_rounds` or `search_max_window_uids`.
pub async fn search_progressive(
    pool: &ConnectionPool,
    mailbox: &str,
    query: &IMAPQuery,
    page_size: u32,
    before_uid: Option<u32>,
    after_uid: Option<u32>,
) -> Result<ProgressiveSearch, IMAPError> {
    if before_uid.is_some() && after_uid.is_some() {
        return Err(IMAPError::ProtocolError(
            "cannot specify both before_uid and after_uid".to_owned(),
        ));
    }

    let pool_config = pool.pool_config().clone();
    let mailbox = mailbox.to_owned();
    let query = query.clone();

    pool.run_search(move |state: &mut ConnectionState| {
        let mailbox = mailbox.clone();
        let query = query.clone();
        let pool_config = pool_config.clone();
        let pool = pool.clone();
        async move { run_progressive(&pool, state, &mailbox, &query, page_size, before_uid, after_uid, &pool_config).await }
    })
    .await
}

#[allow(clippy::too_many_arguments)]
async fn run_progressive(
    pool: &ConnectionPool,
    state: &mut ConnectionState,
    mailbox: &str,
    query: &IMAPQuery,
    page_size: u32,
    before_uid: Option<u32>,
    after_uid: Option<u32>,
    pool_config: &PoolConfig,
) -> Result<ProgressiveSearch, IMAPError> {
    pool.ensure_selected(state, mailbox, true).await?;
    let config = pool.config();

    let want = (page_size.saturating_mul(pool_config.search_window_factor)).max(1);
    let mut chunk_size = want;

    let uidnext = imap_io::status_uidnext(config, &mut state.session, mailbox).await?;
    let newest = uidnext.saturating_sub(1).max(1);

    let mut win = make_window(newest, before_uid, after_uid, chunk_size);

    let mut acc: Vec<u32> = Vec::new();
    let mut scanned_low: Option<u32> = if !win.is_empty() { Some(win.start) } else { None };
    let mut scanned_high: Option<u32> = if !win.is_empty() { Some(win.end) } else { None };
    let mut last_criteria = query.build();

    for _round in 0..pool_config.search_max_rounds {
        if win.is_empty() {
            break;
        }

        let (criteria, uids) = search_in_window(&mut state.session, config, query, win).await?;
        last_criteria = criteria;

        for u in uids {
            if let Err(pos) = acc.binary_search(&u) {
                acc.insert(pos, u);
            }
        }

        if acc.len() as u32 >= want {
            break;
        }

        scanned_low = Some(scanned_low.map_or(win.start, |lo| lo.min(win.start)));
        scanned_high = Some(scanned_high.map_or(win.end, |hi| hi.max(win.end)));

        if let (Some(lo), Some(hi)) = (scanned_low, scanned_high) {
            let scanned_span = hi - lo + 1;
            if scanned_span >= pool_config.search_max_window_uids {
                break;
            }
        }

        chunk_size = chunk_size.saturating_mul(pool_config.search_window_factor);

        win = if after_uid.is_some() {
            let next_start = win.end + 1;
            if next_start > newest {
                break;
            }
            let next_end = (next_start + chunk_size - 1).min(newest);
            UidWindow {
                start: next_start,
                end: next_end,
            }
        } else {
            if win.start <= 1 {
                break;
            }
            let next_end = win.start - 1;
            let next_start = next_end.saturating_sub(chunk_size - 1).max(1);
            UidWindow {
                start: next_start,
                end: next_end,
            }
        };
    }

    if acc.len() > pool_config.max_uids_per_key {
        let drop = acc.len() - pool_config.max_uids_per_key;
        acc.drain(0..drop);
    }

    Ok(ProgressiveSearch {
        criteria: last_criteria,
        uids: acc,
    })
}
