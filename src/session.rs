//! Lazy session establishment.
//!
//! The store never connects in its constructor. The first operation drives a
//! one-shot gate through unstarted -> in-flight -> settled; every caller,
//! early or late, observes the same settled outcome. A failed init is
//! memoized and replayed: the store does not retry on its own.

use crate::backend::DocumentBackend;
use crate::error::{Error, Result};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;

/// Produces a bound backend on first use.
///
/// Implementations perform the actual connect-and-bind sequence. Handle
/// classification (URI vs pre-bound collection/database/client) happens here,
/// not in the store.
pub trait Connect: Send + Sync {
    type Backend: DocumentBackend;

    /// Resolve and bind the backing collection.
    ///
    /// Called at most once per store instance, no matter how many operations
    /// race on first use.
    fn connect(&self) -> impl Future<Output = Result<Self::Backend>> + Send;
}

/// One-shot memoized initialization gate.
///
/// `ready()` runs connect + TTL-index creation exactly once across all
/// concurrent callers and stores the `Result` for the lifetime of the store.
/// The `OnceCell` is the only serialization point in the crate: once settled,
/// the backend handle is written-once state read without locks.
pub struct SessionGate<C: Connect> {
    connector: C,
    cell: OnceCell<Result<C::Backend>>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl<C: Connect> SessionGate<C> {
    pub fn new(connector: C) -> Self {
        SessionGate {
            connector,
            cell: OnceCell::new(),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Await the settled session, initializing it on first call.
    ///
    /// The index-creation request is awaited (its failure is fatal and maps
    /// to `ConnectionError`), but the index itself takes effect server-side
    /// whenever the backing store gets to it.
    pub async fn ready(&self) -> Result<&C::Backend> {
        self.started.store(true, Ordering::SeqCst);
        let outcome = self
            .cell
            .get_or_init(|| async {
                // A gate closed before its first connect must never open one
                if self.closed.load(Ordering::SeqCst) {
                    return Err(Error::StoreClosed);
                }
                let backend = self.connector.connect().await?;
                backend
                    .create_ttl_index()
                    .await
                    .map_err(|e| Error::ConnectionError(format!("TTL index creation failed: {}", e)))?;
                debug!("✓ cache session initialized");
                Ok(backend)
            })
            .await;

        outcome.as_ref().map_err(Error::clone)
    }

    /// Refuse any connect that has not begun yet.
    ///
    /// Combined with [`SessionGate::started`], this lets `close()` tear down
    /// an init that is in flight without ever triggering one on an untouched
    /// store: callers that raced past the store's closed check settle on
    /// `StoreClosed` instead of opening a connection nobody will close.
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Whether any caller has begun initialization.
    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// The settled outcome, if initialization has already completed.
    pub fn settled(&self) -> Option<&Result<C::Backend>> {
        self.cell.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, MemoryConnector};
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FailingConnector {
        attempts: Arc<AtomicUsize>,
    }

    impl Connect for FailingConnector {
        type Backend = MemoryBackend;

        async fn connect(&self) -> Result<MemoryBackend> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::ConnectionError("refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_gate_connects_once_across_concurrent_callers() {
        let connector = MemoryConnector::new(MemoryBackend::new());
        let counter = connector.connect_count_handle();
        let gate = Arc::new(SessionGate::new(connector));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.ready().await.map(|_| ()) })
            })
            .collect();

        for result in join_all(tasks).await {
            result.expect("task panicked").expect("init failed");
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gate_memoizes_failure() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let gate = SessionGate::new(FailingConnector {
            attempts: Arc::clone(&attempts),
        });

        let first = gate.ready().await.unwrap_err();
        let second = gate.ready().await.unwrap_err();

        assert!(matches!(first, Error::ConnectionError(_)));
        assert_eq!(first.to_string(), second.to_string());
        // No retry: the failed attempt is permanent for this gate
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gate_replays_success_to_late_arrivals() {
        let gate = SessionGate::new(MemoryConnector::new(MemoryBackend::new()));
        gate.ready().await.expect("init failed");
        assert!(gate.settled().is_some());
        gate.ready().await.expect("late arrival should see cached success");
    }

    #[tokio::test]
    async fn test_gate_unstarted_has_no_settled_outcome() {
        let gate = SessionGate::new(MemoryConnector::new(MemoryBackend::new()));
        assert!(gate.settled().is_none());
        assert!(!gate.started());
    }

    #[tokio::test]
    async fn test_gate_closed_before_start_never_connects() {
        let connector = MemoryConnector::new(MemoryBackend::new());
        let counter = connector.connect_count_handle();
        let gate = SessionGate::new(connector);

        gate.mark_closed();

        // A caller that raced past the store's closed check settles on
        // StoreClosed without opening a connection
        let err = gate.ready().await.unwrap_err();
        assert!(matches!(err, Error::StoreClosed));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_gate_close_joins_in_flight_init() {
        let connector = MemoryConnector::new(MemoryBackend::new());
        let counter = connector.connect_count_handle();
        let gate = Arc::new(SessionGate::new(connector));

        let racer = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.ready().await.map(|_| ()) })
        };
        tokio::task::yield_now().await;

        // Closing after start does not invalidate the settled session; the
        // connect that already began still runs exactly once and stays
        // observable for teardown
        gate.mark_closed();
        racer.await.expect("task panicked").expect("init failed");

        assert!(gate.started());
        assert!(gate.settled().is_some());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
