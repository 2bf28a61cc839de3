//! Connection pool: fixed-size, failure-driven replacement, per-connection
//! SELECT and capability caches, and the retry/search-throttle wrappers
//! every façade operation runs under.
//!
//! Grounded on `_ConnState`/`_pool`/`_acquire`/`_run`/`_run_search` in the
//! reference implementation: a bounded queue of connection-owning values,
//! exclusive ownership as the acquisition, a higher-order retry wrapper,
//! and a counting semaphore throttling `SEARCH` independent of pool size.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::auth::AuthContext;
use crate::config::{IMAPConfig, PoolConfig};
use crate::errors::IMAPError;
use crate::imap_io::{self, ImapSession};

/// A live IMAP connection plus the per-connection caches that make
/// repeated operations against one mailbox cheap.
pub struct ConnectionState {
    pub session: ImapSession,
    pub selected_mailbox: Option<String>,
    pub selected_readonly: Option<bool>,
    pub capabilities: Option<HashSet<String>>,
}

impl ConnectionState {
    fn new(session: ImapSession) -> Self {
        Self {
            session,
            selected_mailbox: None,
            selected_readonly: None,
            capabilities: None,
        }
    }
}

struct Inner {
    queue: Mutex<VecDeque<ConnectionState>>,
    permits: Semaphore,
    search_sem: Semaphore,
    closing: Mutex<bool>,
    config: Arc<IMAPConfig>,
    pool_config: PoolConfig,
}

/// Fixed-size pool of authenticated IMAP connections.
///
/// Cloning a `ConnectionPool` is cheap and shares the same underlying
/// queue (it is an `Arc` handle), matching how the façade hands pool
/// access to whichever task is running an operation.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<Inner>,
}

impl ConnectionPool {
    /// Eagerly opens and authenticates `pool_config.pool_size` connections.
    pub async fn new(config: IMAPConfig, pool_config: PoolConfig) -> Result<Self, IMAPError> {
        config
            .validate()
            .map_err(|e| IMAPError::ProtocolError(e.to_string()))?;

        let config = Arc::new(config);
        let count = pool_config.pool_size.max(1);
        let mut queue = VecDeque::with_capacity(count);
        for _ in 0..count {
            queue.push_back(ConnectionState::new(open_new_connection(&config).await?));
        }

        Ok(Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(queue),
                permits: Semaphore::new(count),
                search_sem: Semaphore::new(pool_config.max_concurrent_searches.max(1)),
                closing: Mutex::new(false),
                config,
                pool_config,
            }),
        })
    }

    pub fn config(&self) -> &IMAPConfig {
        &self.inner.config
    }

    pub fn pool_config(&self) -> &PoolConfig {
        &self.inner.pool_config
    }

    /// Run `op` against a pooled connection, retrying replacement-triggering
    /// errors up to `max_retries + 1` attempts total with a fixed backoff
    /// between them. Tagged `NO`/`BAD` (`ProtocolError`) responses are
    /// surfaced immediately, unretried.
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T, IMAPError>
    where
        F: Fn(&mut ConnectionState) -> Fut,
        Fut: Future<Output = Result<T, IMAPError>>,
    {
        let mut last_err: Option<IMAPError> = None;

        for attempt in 0..=self.inner.pool_config.max_retries {
            let mut state = self.acquire().await?;
            match op(&mut state).await {
                Ok(value) => {
                    self.release(state).await;
                    return Ok(value);
                }
                Err(e) if e.is_replacement_triggering() => {
                    warn!(error = %e, attempt, "replacing IMAP connection after failure");
                    self.replace_and_return(state).await;
                    last_err = Some(e);
                    if attempt < self.inner.pool_config.max_retries
                        && !self.inner.pool_config.backoff.is_zero()
                    {
                        tokio::time::sleep(self.inner.pool_config.backoff).await;
                    }
                }
                Err(e) => {
                    self.release(state).await;
                    return Err(e);
                }
            }
        }

        Err(last_err.unwrap_or(IMAPError::PoolExhausted))
    }

    /// Like [`Self::run`], but gated by the search throttle semaphore,
    /// independent of pool size.
    pub async fn run_search<T, F, Fut>(&self, op: F) -> Result<T, IMAPError>
    where
        F: Fn(&mut ConnectionState) -> Fut,
        Fut: Future<Output = Result<T, IMAPError>>,
    {
        let _permit = self
            .inner
            .search_sem
            .acquire()
            .await
            .map_err(|_| IMAPError::ClientClosed)?;
        self.run(op).await
    }

    async fn acquire(&self) -> Result<ConnectionState, IMAPError> {
        if *self.inner.closing.lock().await {
            return Err(IMAPError::ClientClosed);
        }

        let permit = timeout(
            self.inner.pool_config.pool_acquire_timeout,
            self.inner.permits.acquire(),
        )
        .await
        .map_err(|_| IMAPError::PoolExhausted)?
        .map_err(|_| IMAPError::ClientClosed)?;
        permit.forget();

        let mut queue = self.inner.queue.lock().await;
        let state = queue
            .pop_front()
            .expect("semaphore permit guarantees a queued connection");
        drop(queue);

        if *self.inner.closing.lock().await {
            let mut state = state;
            imap_io::logout(&mut state.session).await;
            self.inner.permits.add_permits(1);
            return Err(IMAPError::ClientClosed);
        }

        Ok(state)
    }

    async fn release(&self, mut state: ConnectionState) {
        if *self.inner.closing.lock().await {
            imap_io::logout(&mut state.session).await;
            self.inner.permits.add_permits(1);
            return;
        }
        self.inner.queue.lock().await.push_back(state);
        self.inner.permits.add_permits(1);
    }

    async fn replace_and_return(&self, mut bad: ConnectionState) {
        imap_io::logout(&mut bad.session).await;

        if *self.inner.closing.lock().await {
            self.inner.permits.add_permits(1);
            return;
        }

        match open_new_connection(&self.inner.config).await {
            Ok(session) => {
                self.inner
                    .queue
                    .lock()
                    .await
                    .push_back(ConnectionState::new(session));
            }
            Err(e) => {
                warn!(error = %e, "failed to reopen connection after replacement; pool shrinks by one");
            }
        }
        self.inner.permits.add_permits(1);
    }

    /// Sets the `closing` flag and drains the pool, logging out every
    /// connection. Subsequent `acquire`s return `ClientClosed`; any
    /// connection returned mid-flight after this call is logged out
    /// rather than re-pooled.
    pub async fn close(&self) {
        *self.inner.closing.lock().await = true;
        let mut queue = self.inner.queue.lock().await;
        while let Some(mut state) = queue.pop_front() {
            imap_io::logout(&mut state.session).await;
        }
    }

    /// Per-connection mailbox-selection cache: a read-write selection
    /// satisfies a subsequent read-only request without reselecting; a
    /// read-only selection satisfies only read-only requests.
    pub async fn ensure_selected(
        &self,
        state: &mut ConnectionState,
        mailbox: &str,
        readonly: bool,
    ) -> Result<(), IMAPError> {
        if state.selected_mailbox.as_deref() == Some(mailbox) {
            match state.selected_readonly {
                Some(false) => return Ok(()),
                Some(true) if readonly => return Ok(()),
                _ => {}
            }
        }

        debug!(mailbox, readonly, "SELECT cache miss");
        imap_io::select(&self.inner.config, &mut state.session, mailbox, readonly).await?;
        state.selected_mailbox = Some(mailbox.to_owned());
        state.selected_readonly = Some(readonly);
        Ok(())
    }

    /// Per-connection capability cache: the first probe issues
    /// `CAPABILITY` and memoizes the uppercased token set.
    pub async fn capabilities(
        &self,
        state: &mut ConnectionState,
    ) -> Result<HashSet<String>, IMAPError> {
        if let Some(caps) = &state.capabilities {
            return Ok(caps.clone());
        }

        let caps = imap_io::capabilities(&self.inner.config, &mut state.session).await?;
        let set: HashSet<String> = caps
            .iter()
            .map(|c| format!("{c:?}").to_ascii_uppercase())
            .collect();
        state.capabilities = Some(set.clone());
        Ok(set)
    }
}

async fn open_new_connection(config: &IMAPConfig) -> Result<ImapSession, IMAPError> {
    let client = imap_io::connect(config).await?;
    let ctx = AuthContext {
        host: config.host.clone(),
        port: config.port,
    };
    config
        .auth
        .apply(client, &ctx)
        .await
        .map_err(IMAPError::Auth)
}
