//! Per-connection registries (`spec.md` §4.3, §4.4): the stream-pointer
//! table and the pending-call table. Both are plain `Mutex`-guarded maps,
//! matching the `Arc<Mutex<HashMap<...>>>` shape the teacher uses for its own
//! request bookkeeping in `mcp/jsonrpc.rs`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};

use crate::error::EngineError;
use crate::message::{RequestId, RpcError};
use crate::stream::StreamSourceHandle;
use crate::value::InvokeValue;

/// Maps a pointer's method-shaped string id to the local endpoint it feeds.
///
/// Only the `readable`-mirror case needs an entry here: notifications
/// addressed to a pointer must be routed to whichever [`StreamSourceHandle`]
/// was registered when the pointer arrived in a response. The symmetric
/// `writable`-mirror case (a local [`crate::stream::StreamSink`] draining
/// into outgoing notifications) needs no registry entry, since nothing
/// inbound needs to find it by pointer id.
#[derive(Debug, Default, Clone)]
pub struct StreamRegistry {
    inner: Arc<Mutex<HashMap<String, StreamSourceHandle>>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, pointer_url: String, handle: StreamSourceHandle) {
        self.inner.lock().await.insert(pointer_url, handle);
    }

    /// Looks up the handle for a pointer without removing it (a stream may
    /// receive many chunks before its terminator).
    pub async fn get(&self, pointer_url: &str) -> Option<StreamSourceHandle> {
        self.inner.lock().await.get(pointer_url).cloned()
    }

    /// Drops the registration once a `null` terminator has been delivered.
    pub async fn remove(&self, pointer_url: &str) {
        self.inner.lock().await.remove(pointer_url);
    }
}

/// Outcome delivered to a pending call once its response arrives.
#[derive(Debug)]
pub enum CallOutcome {
    Success(Vec<InvokeValue>),
    Error(RpcError),
}

/// A handle to an in-flight request, returned to the invoking caller.
///
/// Dropping it without awaiting behaves like [`CallRegistry::cancel`]: the
/// registry entry is reclaimed lazily the next time a response for that id
/// arrives and finds no receiver (`spec.md` has no wire-level cancellation,
/// so this is purely a local bookkeeping cleanup, not a "cancel" message).
/// `CallRegistry::cancel` additionally reclaims the slot immediately instead
/// of leaving it parked for a response that may never come (SPEC_FULL's
/// local-cancellation supplement).
#[derive(Debug)]
pub struct PendingCall {
    rx: oneshot::Receiver<CallOutcome>,
}

impl PendingCall {
    /// Waits for the terminal response. Resolves to [`EngineError::Aborted`]
    /// if the call was aborted, [`EngineError::ConnectionClosed`] if the
    /// connection tore down first.
    pub async fn wait(self) -> Result<CallOutcome, EngineError> {
        self.rx.await.map_err(|_| EngineError::ConnectionClosed)
    }
}

/// Maps an outstanding request id to the oneshot sender that completes it.
#[derive(Debug, Default, Clone)]
pub struct CallRegistry {
    inner: Arc<Mutex<HashMap<RequestId, oneshot::Sender<CallOutcome>>>>,
    next_id: Arc<AtomicU64>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a fresh id and registers a pending slot for it.
    pub async fn begin(&self) -> (RequestId, PendingCall) {
        let id = RequestId::from_sequence(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.inner.lock().await.insert(id.clone(), tx);
        (id, PendingCall { rx })
    }

    /// Completes the pending call for `id`, if one is still registered.
    /// Returns `false` when `id` is unknown — a stray response (`spec.md`
    /// §7 category 6).
    pub async fn complete(&self, id: &RequestId, outcome: CallOutcome) -> bool {
        if let Some(tx) = self.inner.lock().await.remove(id) {
            let _ = tx.send(outcome);
            true
        } else {
            false
        }
    }

    /// Fails every still-pending call, used when the connection tears down.
    pub async fn abort_all(&self) {
        let mut pending = self.inner.lock().await;
        for (_, tx) in pending.drain() {
            let _ = tx.send(CallOutcome::Error(RpcError::internal("connection closed")));
        }
    }

    /// Locally abandons a pending call without waiting for a response
    /// (SPEC_FULL's cancellation supplement). The sender is dropped rather
    /// than completed, so `PendingCall::wait` resolves to
    /// [`EngineError::ConnectionClosed`] for whoever still held it. Returns
    /// `false` if `id` had already reached a terminal response.
    pub async fn cancel(&self, id: &RequestId) -> bool {
        self.inner.lock().await.remove(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[tokio::test]
    async fn completes_pending_call_by_id() {
        let registry = CallRegistry::new();
        let (id, pending) = registry.begin().await;
        assert!(
            registry
                .complete(&id, CallOutcome::Success(vec![InvokeValue::Json(Value::from(1))]))
                .await
        );
        match pending.wait().await.unwrap() {
            CallOutcome::Success(values) => {
                assert_eq!(values.len(), 1);
                assert_eq!(values[0].as_json(), Some(&Value::from(1)));
            }
            CallOutcome::Error(_) => panic!("expected success"),
        }
    }

    #[tokio::test]
    async fn cancel_reclaims_slot_and_leaves_pending_call_closed() {
        let registry = CallRegistry::new();
        let (id, pending) = registry.begin().await;
        assert!(registry.cancel(&id).await);
        assert!(pending.wait().await.is_err());
        assert!(!registry.cancel(&id).await);
        // A late response for a cancelled id is a stray, not a crash.
        assert!(!registry.complete(&id, CallOutcome::Success(vec![])).await);
    }

    #[tokio::test]
    async fn completing_unknown_id_is_reported_as_stray() {
        let registry = CallRegistry::new();
        let unknown = RequestId::from("does-not-exist");
        assert!(
            !registry
                .complete(&unknown, CallOutcome::Success(vec![]))
                .await
        );
    }

    #[tokio::test]
    async fn abort_all_fails_every_pending_call() {
        let registry = CallRegistry::new();
        let (_, pending1) = registry.begin().await;
        let (_, pending2) = registry.begin().await;
        registry.abort_all().await;
        assert!(matches!(
            pending1.wait().await.unwrap(),
            CallOutcome::Error(_)
        ));
        assert!(matches!(
            pending2.wait().await.unwrap(),
            CallOutcome::Error(_)
        ));
    }

    #[tokio::test]
    async fn stream_registry_round_trips_handle() {
        let registry = StreamRegistry::new();
        let (handle, mut source) = crate::stream::StreamSource::channel();
        registry.insert("mascara://abc.readable".to_string(), handle).await;
        let found = registry.get("mascara://abc.readable").await.expect("present");
        found.push(Value::from("chunk")).await.unwrap();
        assert_eq!(source.recv().await, Some(Value::from("chunk")));
        registry.remove("mascara://abc.readable").await;
        assert!(registry.get("mascara://abc.readable").await.is_none());
    }
}
