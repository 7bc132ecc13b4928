//! Client role (`spec.md` §6): constructed with a [`ClientFactory`],
//! `connect` delegates to the factory and returns a [`Connection`] whose
//! `invoke` writes a request and resolves once the matching response
//! arrives.

use std::io;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::connection::{self, ConnectionShared};
use crate::dispatcher::UnhandledEvent;
use crate::error::EngineError;
use crate::message::RpcError;
use crate::registry::{CallOutcome, CallRegistry, StreamRegistry};
use crate::transport::{ClientFactory, Transport};
use crate::value::InvokeValue;
use serde_json::Value;

/// A client-side RPC connection: one transport, framed both ways, with its
/// own call registry and stream registry (`spec.md` §3 "Connection State
/// (client side)").
pub struct Connection {
    shared: ConnectionShared,
    calls: CallRegistry,
    unhandled_rx: mpsc::UnboundedReceiver<UnhandledEvent>,
    call_timeout: Duration,
    writer_handle: JoinHandle<()>,
    reader_handle: JoinHandle<()>,
}

impl Connection {
    fn spawn<T>(transport: T, config: Config) -> Self
    where
        T: Transport,
    {
        let (reader, writer) = tokio::io::split(transport);
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let (unhandled_tx, unhandled_rx) = mpsc::unbounded_channel();
        let calls = CallRegistry::new();

        let shared = ConnectionShared {
            scheme: config.scheme.clone(),
            writer_tx,
            stream_registry: StreamRegistry::new(),
            unhandled_tx,
        };

        let writer_handle = tokio::spawn(connection::writer_task(writer, writer_rx));
        let reader_handle = {
            let shared = shared.clone();
            let calls = calls.clone();
            tokio::spawn(connection::run_client_reader(reader, config.clone(), shared, calls))
        };

        Self {
            shared,
            calls,
            unhandled_rx,
            call_timeout: config.call_timeout,
            writer_handle,
            reader_handle,
        }
    }

    /// Writes a positional-params request and returns a handle for the
    /// pending response (`spec.md` §4.4 `invoke`). The call is live in the
    /// registry from this point until `wait`/`abort` retires it.
    pub async fn invoke(&self, method: &str, params: Vec<Value>) -> PendingInvocation {
        let (id, pending) = self.calls.begin().await;
        connection::send_request(&self.shared, id.clone(), method, params);
        PendingInvocation {
            id,
            calls: self.calls.clone(),
            pending,
            timeout: self.call_timeout,
        }
    }

    /// Awaits the next frame the dispatcher couldn't route locally
    /// (`spec.md` §7 categories 5-6). Resolves to `None` once the
    /// connection's reader task has exited.
    pub async fn unhandled(&mut self) -> Option<UnhandledEvent> {
        self.unhandled_rx.recv().await
    }

    /// Waits for the connection's reader task to observe transport close or
    /// a fatal decode error. Every call still pending at that point
    /// resolves to a connection-closed error (`spec.md` §5).
    pub async fn closed(self) {
        let _ = self.reader_handle.await;
        drop(self.shared);
        let _ = self.writer_handle.await;
    }
}

/// A request id's pending response, returned by [`Connection::invoke`].
///
/// Splitting this out from `Connection` mirrors SPEC_FULL's local
/// cancellation supplement: a caller can `wait` for the terminal response
/// or `abort` to reclaim the registry slot without waiting for one that may
/// never come.
pub struct PendingInvocation {
    id: crate::message::RequestId,
    calls: CallRegistry,
    pending: crate::registry::PendingCall,
    timeout: Duration,
}

impl PendingInvocation {
    /// Awaits the terminal response, bounded by the connection's configured
    /// `call_timeout` (the invoker-layer timeout `spec.md` §5 explicitly
    /// allows; the wire protocol itself has none).
    pub async fn wait(self) -> Result<Vec<InvokeValue>, RpcError> {
        match tokio::time::timeout(self.timeout, self.pending.wait()).await {
            Ok(Ok(CallOutcome::Success(values))) => Ok(values),
            Ok(Ok(CallOutcome::Error(error))) => Err(error),
            Ok(Err(engine_err)) => Err(engine_err.into()),
            Err(_elapsed) => Err(EngineError::Aborted.into()),
        }
    }

    /// Locally abandons the call: reclaims the registry slot immediately
    /// instead of waiting for a response. A response that still arrives
    /// afterward is a stray (`spec.md` §7 category 6), not an error.
    pub async fn abort(self) {
        self.calls.cancel(&self.id).await;
    }
}

/// Bidirectional RPC client: holds a transport factory and default
/// [`Config`], and hands out one [`Connection`] per `connect` call.
pub struct Client<F> {
    factory: F,
    config: Config,
}

impl<F> Client<F>
where
    F: ClientFactory,
{
    /// Builds a client with default [`Config`].
    pub fn new(factory: F) -> Self {
        Self::with_config(factory, Config::default())
    }

    /// Builds a client with an explicit [`Config`].
    pub fn with_config(factory: F, config: Config) -> Self {
        Self { factory, config }
    }

    /// Delegates to the factory's `connect` and wires up the resulting
    /// transport as a framed, dispatched [`Connection`].
    pub async fn connect(&self, addr: &str) -> io::Result<Connection> {
        let transport = self.factory.connect(addr).await?;
        Ok(Connection::spawn(transport, self.config.clone()))
    }
}
