//! Per-connection transport glue and lifecycle (`spec.md` §5, §9 design
//! note (ii): "a per-connection actor that owns mutable state and processes
//! inbound messages serially").
//!
//! Every connection, server or client, is two tasks around one shared
//! state: a writer task that owns the transport's write half and drains an
//! mpsc channel of already-encoded frames (this is what keeps concurrent
//! outbound writers — the dispatcher and every stream forwarder — from
//! interleaving bytes mid-frame, per §5's serialization requirement), and a
//! reader task that owns the read half, feeds bytes through a [`Deframer`],
//! and dispatches each decoded message in arrival order.

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::deframer::Deframer;
use crate::dispatcher::{dispatch_client, dispatch_server, send_request as dispatch_send_request, UnhandledEvent};
use crate::handler::HandlerTable;
use crate::message::{Message, RequestId};
use crate::pointer::StreamPointer;
use crate::registry::{CallRegistry, StreamRegistry};
use crate::stream::StreamSinkHandle;

/// State shared between a connection's reader task, writer task, and every
/// stream-sink forwarder it spawns. Cheap to clone: every field is already
/// a channel handle or an `Arc`-backed registry.
#[derive(Clone)]
pub(crate) struct ConnectionShared {
    pub scheme: String,
    pub writer_tx: mpsc::UnboundedSender<Vec<u8>>,
    pub stream_registry: StreamRegistry,
    pub unhandled_tx: mpsc::UnboundedSender<UnhandledEvent>,
}

/// Drains encoded frames onto the transport's write half, serialized so no
/// two frames' bytes interleave (`spec.md` §5). Exits once every sender
/// clone (the dispatcher's `send_frame` and every forwarder task) has been
/// dropped, or on a write error.
pub(crate) async fn writer_task<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Vec<u8>>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        if writer.write_all(&frame).await.is_err() {
            break;
        }
    }
    let _ = writer.shutdown().await;
}

/// Drains a [`StreamSinkHandle`] (the engine-owned half of a `StreamSink`
/// channel) and forwards each chunk as an outgoing notification addressed
/// to `pointer`, honoring the `null` terminator (`spec.md` §4.3). Runs
/// until the sink is explicitly ended, dropped, or the connection's writer
/// is gone.
pub(crate) fn spawn_sink_forwarder(
    writer_tx: mpsc::UnboundedSender<Vec<u8>>,
    pointer: StreamPointer,
    mut handle: StreamSinkHandle,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let chunk = match handle.next().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) | Err(()) => {
                    send_notification(&writer_tx, pointer.as_str(), vec![Value::Null]);
                    return;
                }
            };
            if !send_notification(&writer_tx, pointer.as_str(), vec![chunk]) {
                return;
            }
        }
    })
}

fn send_notification(writer_tx: &mpsc::UnboundedSender<Vec<u8>>, method: &str, params: Vec<Value>) -> bool {
    let message = Message::notification(method, params);
    match crate::framer::encode_frame(&message) {
        Ok(bytes) => writer_tx.send(bytes).is_ok(),
        Err(err) => {
            tracing::warn!(error = %err, "failed to encode stream notification");
            false
        }
    }
}

/// Reads bytes off `reader`, deframes them, and dispatches each decoded
/// message as a server would, until the transport closes or a fatal decode
/// error occurs. Tears down the connection's registrations by dropping
/// `shared` on return (the stream registry's handles close their channels,
/// which readers/writers observe as end-of-stream).
pub(crate) async fn run_server_reader<R>(
    mut reader: R,
    config: Config,
    shared: ConnectionShared,
    handlers: HandlerTable,
) where
    R: AsyncRead + Unpin,
{
    let mut deframer = Deframer::new(config.decode_mode, config.max_frame_buffer);
    let mut buf = vec![0u8; config.read_buffer_hint];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("connection closed by peer");
                return;
            }
            Ok(n) => n,
            Err(err) => {
                tracing::warn!(error = %err, "transport read failed");
                return;
            }
        };

        let batch = deframer.push(&buf[..n]);
        for message in batch.messages {
            dispatch_server(&shared, &handlers, message).await;
        }
        if let Some(err) = batch.fatal {
            tracing::warn!(error = %err, "closing connection on fatal decode error");
            return;
        }
    }
}

/// Client-side counterpart of [`run_server_reader`]: dispatches decoded
/// messages against the call registry instead of a handler table, and
/// aborts every still-pending call on teardown (`spec.md` §5's "transport
/// close is the only cancellation").
pub(crate) async fn run_client_reader<R>(
    mut reader: R,
    config: Config,
    shared: ConnectionShared,
    calls: CallRegistry,
) where
    R: AsyncRead + Unpin,
{
    let mut deframer = Deframer::new(config.decode_mode, config.max_frame_buffer);
    let mut buf = vec![0u8; config.read_buffer_hint];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("connection closed by peer");
                break;
            }
            Ok(n) => n,
            Err(err) => {
                tracing::warn!(error = %err, "transport read failed");
                break;
            }
        };

        let batch = deframer.push(&buf[..n]);
        for message in batch.messages {
            dispatch_client(&shared, &calls, message).await;
        }
        if let Some(err) = batch.fatal {
            tracing::warn!(error = %err, "closing connection on fatal decode error");
            break;
        }
    }
    calls.abort_all().await;
}

/// Encodes and enqueues a request frame; `spec.md` §4.4 `invoke`'s write
/// half. Exposed here (rather than re-exported from `dispatcher`) since
/// `Client::invoke` only needs the write side, not full dispatch.
pub(crate) fn send_request(shared: &ConnectionShared, id: RequestId, method: &str, params: Vec<Value>) {
    dispatch_send_request(shared, id, method, params);
}
