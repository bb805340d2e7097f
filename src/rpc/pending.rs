//! Pending-request registry for RPC correlation.
//!
//! Maps correlation ids to single-shot completion handles. A caller
//! registers an id before dispatching a request and awaits the returned
//! handle; the receive path resolves or rejects the entry when the
//! matching response arrives. Each entry carries a timer that rejects it
//! if no terminal event lands within the timeout budget, and `clear`
//! rejects everything at once during connection teardown.
//!
//! All public operations are atomic with respect to each other: the
//! table is guarded by a mutex that is never held across an await. The
//! only suspension point exposed to callers is awaiting a handle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{Result, SidebandError};
use crate::protocol::FrameId;

/// Default timeout budget for a pending request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

struct PendingEntry<T> {
    tx: oneshot::Sender<Result<T>>,
    timer: JoinHandle<()>,
}

/// Read-only view onto one pending request's terminal outcome.
///
/// Obtained from [`PendingRequests::register`]. Awaiting it suspends
/// until the entry is resolved, rejected, cleared, or timed out.
/// Dropping the handle does not deregister the entry; the timeout
/// bounds its lifetime (or call [`PendingRequests::cancel`]).
#[derive(Debug)]
pub struct ResponseHandle<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> ResponseHandle<T> {
    /// Wait for the terminal outcome.
    pub async fn wait(self) -> Result<T> {
        match self.rx.await {
            Ok(outcome) => outcome,
            // The entry was dropped without a terminal event; only
            // possible if the registry itself was torn down.
            Err(_) => Err(SidebandError::Disconnected(
                "pending request dropped without resolution".to_string(),
            )),
        }
    }
}

/// Process-local registry matching outstanding requests to responses.
///
/// Cheaply cloneable; clones share the same table. Requires a tokio
/// runtime: `register` spawns the per-entry timeout timer.
pub struct PendingRequests<T> {
    inner: Arc<Mutex<HashMap<FrameId, PendingEntry<T>>>>,
    timeout: Duration,
}

impl<T> Clone for PendingRequests<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            timeout: self.timeout,
        }
    }
}

impl<T: Send + 'static> PendingRequests<T> {
    /// Create a registry with the given per-request timeout budget.
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    /// Create a registry with the default 30 second timeout.
    pub fn with_default_timeout() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }

    fn table(&self) -> MutexGuard<'_, HashMap<FrameId, PendingEntry<T>>> {
        // A panic while holding the lock leaves the table usable; the
        // entries themselves are just channels.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a pending request under `cid` and return the handle the
    /// caller awaits. Starts the timeout timer.
    ///
    /// # Errors
    ///
    /// `Correlation` if `cid` is already registered.
    pub fn register(&self, cid: FrameId) -> Result<ResponseHandle<T>> {
        let (tx, rx) = oneshot::channel();
        let mut table = self.table();
        if table.contains_key(&cid) {
            return Err(SidebandError::Correlation(format!(
                "correlation id {} already registered",
                cid
            )));
        }

        let timer = {
            let inner = Arc::clone(&self.inner);
            let timeout = self.timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                let entry = inner
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&cid);
                if let Some(entry) = entry {
                    tracing::debug!(cid = %cid, ?timeout, "pending request timed out");
                    let _ = entry.tx.send(Err(SidebandError::Timeout));
                }
            })
        };

        table.insert(cid, PendingEntry { tx, timer });
        Ok(ResponseHandle { rx })
    }

    /// Resolve the pending request registered under `cid` with `value`.
    /// Cancels its timer synchronously.
    ///
    /// # Errors
    ///
    /// `Correlation` if `cid` is not registered (never registered, or
    /// already resolved, rejected, cleared, or timed out).
    pub fn resolve(&self, cid: FrameId, value: T) -> Result<()> {
        let entry = self.take(cid)?;
        let _ = entry.tx.send(Ok(value));
        Ok(())
    }

    /// Reject the pending request registered under `cid` with `reason`.
    /// Cancels its timer synchronously.
    ///
    /// # Errors
    ///
    /// `Correlation` if `cid` is not registered.
    pub fn reject(&self, cid: FrameId, reason: SidebandError) -> Result<()> {
        let entry = self.take(cid)?;
        let _ = entry.tx.send(Err(reason));
        Ok(())
    }

    /// Cancel the pending request registered under `cid`; its handle
    /// resolves as failed with [`SidebandError::Cancelled`].
    ///
    /// # Errors
    ///
    /// `Correlation` if `cid` is not registered.
    pub fn cancel(&self, cid: FrameId) -> Result<()> {
        self.reject(cid, SidebandError::Cancelled)
    }

    /// Reject every outstanding entry with a disconnect failure and
    /// leave the registry empty. Idempotent; the registry can be reused
    /// afterwards. Entries registered after `clear` returns are
    /// unaffected.
    pub fn clear(&self) {
        let drained: Vec<(FrameId, PendingEntry<T>)> = self.table().drain().collect();
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "clearing pending requests");
        }
        for (_, entry) in drained {
            entry.timer.abort();
            let _ = entry.tx.send(Err(SidebandError::Disconnected(
                "connection closed with request outstanding".to_string(),
            )));
        }
    }

    /// Number of outstanding entries.
    pub fn pending_count(&self) -> usize {
        self.table().len()
    }

    fn take(&self, cid: FrameId) -> Result<PendingEntry<T>> {
        let entry = self.table().remove(&cid).ok_or_else(|| {
            SidebandError::Correlation(format!("correlation id {} is not registered", cid))
        })?;
        entry.timer.abort();
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PendingRequests<u32> {
        PendingRequests::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_register_then_resolve() {
        let pending = engine();
        let cid = FrameId::generate();

        let handle = pending.register(cid).unwrap();
        assert_eq!(pending.pending_count(), 1);

        pending.resolve(cid, 42).unwrap();
        assert_eq!(pending.pending_count(), 0);
        assert_eq!(handle.wait().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_duplicate_register_fails() {
        let pending = engine();
        let cid = FrameId::generate();

        let _handle = pending.register(cid).unwrap();
        let err = pending.register(cid).unwrap_err();
        assert!(matches!(err, SidebandError::Correlation(_)));
        // The original entry is untouched.
        assert_eq!(pending.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_resolve_unknown_cid_fails() {
        let pending = engine();
        let err = pending.resolve(FrameId::generate(), 1).unwrap_err();
        assert!(matches!(err, SidebandError::Correlation(_)));
    }

    #[tokio::test]
    async fn test_reject_resolves_handle_as_failure() {
        let pending = engine();
        let cid = FrameId::generate();

        let handle = pending.register(cid).unwrap();
        pending
            .reject(
                cid,
                SidebandError::Application {
                    code: 2001,
                    message: "refused".into(),
                },
            )
            .unwrap();

        match handle.wait().await {
            Err(SidebandError::Application { code, .. }) => assert_eq!(code, 2001),
            other => panic!("expected application error, got {:?}", other),
        }
        assert_eq!(pending.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_reject_unknown_cid_fails() {
        let pending = engine();
        let err = pending
            .reject(FrameId::generate(), SidebandError::Timeout)
            .unwrap_err();
        assert!(matches!(err, SidebandError::Correlation(_)));
    }

    #[tokio::test]
    async fn test_fire_once_resolve_then_reject_fails() {
        let pending = engine();
        let cid = FrameId::generate();

        let _handle = pending.register(cid).unwrap();
        pending.resolve(cid, 7).unwrap();

        assert!(pending.resolve(cid, 8).is_err());
        assert!(pending.reject(cid, SidebandError::Timeout).is_err());
    }

    #[tokio::test]
    async fn test_clear_rejects_all_outstanding() {
        let pending = engine();
        let handles: Vec<_> = (0..3)
            .map(|_| pending.register(FrameId::generate()).unwrap())
            .collect();
        assert_eq!(pending.pending_count(), 3);

        pending.clear();
        assert_eq!(pending.pending_count(), 0);

        for handle in handles {
            match handle.wait().await {
                Err(SidebandError::Disconnected(_)) => {}
                other => panic!("expected disconnect, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_clear_is_idempotent_and_registry_reusable() {
        let pending = engine();
        pending.clear();
        pending.clear();

        let cid = FrameId::generate();
        let handle = pending.register(cid).unwrap();
        pending.resolve(cid, 1).unwrap();
        assert_eq!(handle.wait().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_entries_registered_after_clear_unaffected() {
        let pending = engine();
        let before = pending.register(FrameId::generate()).unwrap();
        pending.clear();

        let cid = FrameId::generate();
        let after = pending.register(cid).unwrap();
        assert!(before.wait().await.is_err());

        pending.resolve(cid, 9).unwrap();
        assert_eq!(after.wait().await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_timeout_rejects_and_removes_entry() {
        let pending: PendingRequests<u32> = PendingRequests::new(Duration::from_millis(20));
        let cid = FrameId::generate();

        let handle = pending.register(cid).unwrap();
        match handle.wait().await {
            Err(SidebandError::Timeout) => {}
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(pending.pending_count(), 0);
        // Terminal: later resolve on the same id is a caller bug.
        assert!(pending.resolve(cid, 1).is_err());
    }

    #[tokio::test]
    async fn test_resolve_cancels_timer() {
        let pending: PendingRequests<u32> = PendingRequests::new(Duration::from_millis(20));
        let cid = FrameId::generate();

        let handle = pending.register(cid).unwrap();
        pending.resolve(cid, 5).unwrap();

        // Wait past the deadline; the resolved value must survive.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.wait().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_cancel_resolves_as_cancelled() {
        let pending = engine();
        let cid = FrameId::generate();

        let handle = pending.register(cid).unwrap();
        pending.cancel(cid).unwrap();

        assert!(matches!(handle.wait().await, Err(SidebandError::Cancelled)));
        assert_eq!(pending.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_handle_entry_survives_until_timeout() {
        let pending: PendingRequests<u32> = PendingRequests::new(Duration::from_millis(40));
        let cid = FrameId::generate();

        drop(pending.register(cid).unwrap());
        // Dropping the handle does not deregister.
        assert_eq!(pending.pending_count(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(pending.pending_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_and_resolve() {
        let pending: PendingRequests<usize> = PendingRequests::new(Duration::from_secs(10));

        let mut tasks = Vec::new();
        for i in 0..64 {
            let pending = pending.clone();
            tasks.push(tokio::spawn(async move {
                let cid = FrameId::generate();
                let handle = pending.register(cid).unwrap();
                let resolver = pending.clone();
                tokio::spawn(async move {
                    resolver.resolve(cid, i).unwrap();
                });
                handle.wait().await.unwrap()
            }));
        }

        for (i, task) in tasks.into_iter().enumerate() {
            assert_eq!(task.await.unwrap(), i);
        }
        assert_eq!(pending.pending_count(), 0);
    }
}
