//! The per-connection state machine (`spec.md` §4.2): routes one decoded
//! [`Message`] at a time to the handler table, the call registry, or the
//! stream registry, and reports anything it can't route on the `unhandled`
//! channel. Server and client roles dispatch differently enough that they
//! get separate entry points rather than one generic one.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::connection::{spawn_sink_forwarder, ConnectionShared};
use crate::error::EngineError;
use crate::framer::encode_frame;
use crate::handler::HandlerTable;
use crate::message::{Message, RequestId};
use crate::pointer::{PointerKind, StreamPointer};
use crate::registry::{CallOutcome, CallRegistry};
use crate::stream::{StreamSink, StreamSource};
use crate::value::{HandlerValue, InvokeValue};

/// A decoded frame that could not be routed locally (`spec.md` §7 category 6,
/// and non-pointer notifications with no application listener attached).
#[derive(Debug, Clone)]
pub struct UnhandledEvent {
    pub message_kind: &'static str,
    pub detail: String,
}

async fn emit_unhandled(
    unhandled_tx: &mpsc::UnboundedSender<UnhandledEvent>,
    message_kind: &'static str,
    detail: impl Into<String>,
) {
    let detail = detail.into();
    tracing::debug!(kind = message_kind, %detail, "unhandled frame");
    let _ = unhandled_tx.send(UnhandledEvent {
        message_kind,
        detail,
    });
}

fn send_frame(shared: &ConnectionShared, message: &Message) {
    match encode_frame(message) {
        Ok(bytes) => {
            let _ = shared.writer_tx.send(bytes);
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to encode outgoing frame");
        }
    }
}

/// Transforms a handler's result slots into the wire `result` array, minting
/// a pointer (and wiring its forwarding task or registry entry) for every
/// stream-valued slot (`spec.md` §4.3 "Minting").
async fn mint_result(shared: &ConnectionShared, values: Vec<HandlerValue>) -> Vec<Value> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        out.push(match value {
            HandlerValue::Json(json) => json,
            HandlerValue::Sink(handle) => {
                // A producer: readable from the receiver's point of view.
                let pointer = StreamPointer::mint(&shared.scheme, PointerKind::Readable);
                spawn_sink_forwarder(shared.writer_tx.clone(), pointer.clone(), handle);
                Value::from(pointer.as_str())
            }
            HandlerValue::Source(handle) => {
                // A consumer: writable from the receiver's point of view.
                let pointer = StreamPointer::mint(&shared.scheme, PointerKind::Writable);
                shared
                    .stream_registry
                    .insert(pointer.as_str().to_string(), handle)
                    .await;
                Value::from(pointer.as_str())
            }
        });
    }
    out
}

/// Delivers a stream notification's payload items to the bound endpoint,
/// honoring the `null` terminator. Returns `true` if the pointer was found
/// in the registry (i.e. the message was fully handled as a stream frame).
async fn deliver_stream_payload(
    shared: &ConnectionShared,
    pointer: &str,
    params: Vec<Value>,
) -> bool {
    let Some(handle) = shared.stream_registry.get(pointer).await else {
        return false;
    };
    for item in params {
        if item.is_null() {
            shared.stream_registry.remove(pointer).await;
            break;
        }
        if handle.push(item).await.is_err() {
            shared.stream_registry.remove(pointer).await;
            break;
        }
    }
    true
}

/// Server-side dispatch for one decoded message.
pub(crate) async fn dispatch_server(
    shared: &ConnectionShared,
    handlers: &HandlerTable,
    message: Message,
) {
    match message {
        Message::Notification { method, params } => {
            if StreamPointer::parse(&method).is_some() {
                if !deliver_stream_payload(shared, &method, params).await {
                    emit_unhandled(
                        &shared.unhandled_tx,
                        "notification",
                        format!("unregistered pointer: {method}"),
                    )
                    .await;
                }
                // Per spec §9: a successful or unsuccessful stream-pointer
                // dispatch is terminal for this message either way; never
                // fall through to method lookup.
                return;
            }
            // §7 category 5: not correlatable (notifications carry no id),
            // so this degrades to `unhandled` rather than a protocol error.
            tracing::debug!(
                error = %EngineError::InvalidStreamReference(method.clone()),
                "notification method is not a stream pointer"
            );
            emit_unhandled(&shared.unhandled_tx, "notification", method).await;
        }
        Message::Request { id, method, params } => {
            let Some(handler) = handlers.get(&method) else {
                let error = EngineError::InvalidMethod(method.clone()).into();
                send_frame(shared, &Message::error(Some(id), error));
                return;
            };
            match handler.call(params).await {
                Ok(values) => {
                    let result = mint_result(shared, values).await;
                    send_frame(shared, &Message::success(id, result));
                }
                Err(err) => {
                    send_frame(shared, &Message::error(Some(id), err));
                }
            }
        }
        Message::Success { id, .. } => {
            emit_unhandled(
                &shared.unhandled_tx,
                "success",
                format!("server received a response for id {id}"),
            )
            .await;
        }
        Message::Error { id, error } => {
            emit_unhandled(
                &shared.unhandled_tx,
                "error",
                format!("server received an error response (id {id:?}): {}", error.message),
            )
            .await;
        }
    }
}

/// Client-side dispatch for one decoded message.
pub(crate) async fn dispatch_client(
    shared: &ConnectionShared,
    calls: &CallRegistry,
    message: Message,
) {
    match message {
        Message::Success { id, result } => {
            let mut values = Vec::with_capacity(result.len());
            for item in result {
                values.push(bind_result_value(shared, item).await);
            }
            if !calls.complete(&id, CallOutcome::Success(values)).await {
                emit_unhandled(&shared.unhandled_tx, "success", format!("stray response id {id}"))
                    .await;
            }
        }
        Message::Error { id, error } => {
            let Some(id) = id else {
                emit_unhandled(
                    &shared.unhandled_tx,
                    "error",
                    format!("error response with no id: {}", error.message),
                )
                .await;
                return;
            };
            if !calls
                .complete(&id, CallOutcome::Error(error.clone()))
                .await
            {
                emit_unhandled(&shared.unhandled_tx, "error", format!("stray response id {id}"))
                    .await;
            }
        }
        Message::Notification { method, params } => {
            if StreamPointer::parse(&method).is_some() {
                if !deliver_stream_payload(shared, &method, params).await {
                    emit_unhandled(
                        &shared.unhandled_tx,
                        "notification",
                        format!("unregistered pointer: {method}"),
                    )
                    .await;
                }
                return;
            }
            // §7 category 5: not correlatable (notifications carry no id),
            // so this degrades to `unhandled` rather than a protocol error.
            tracing::debug!(
                error = %EngineError::InvalidStreamReference(method.clone()),
                "notification method is not a stream pointer"
            );
            emit_unhandled(&shared.unhandled_tx, "notification", method).await;
        }
        Message::Request { id, method, .. } => {
            emit_unhandled(
                &shared.unhandled_tx,
                "request",
                format!("client received a request (id {id}, method {method})"),
            )
            .await;
        }
    }
}

/// Binds a single response value: if it's a string matching the
/// stream-pointer grammar under the connection's configured scheme, mints a
/// local mirror endpoint and registers it; otherwise passes the JSON value
/// through unchanged (`spec.md` §4.3 "Binding").
async fn bind_result_value(shared: &ConnectionShared, item: Value) -> InvokeValue {
    let Value::String(candidate) = &item else {
        return InvokeValue::Json(item);
    };
    let Some(pointer) = StreamPointer::parse_with_scheme(candidate, &shared.scheme) else {
        return InvokeValue::Json(item);
    };

    if pointer.kind().receiver_is_source() {
        let (handle, source) = StreamSource::channel();
        shared
            .stream_registry
            .insert(pointer.as_str().to_string(), handle)
            .await;
        InvokeValue::Source(source)
    } else {
        let (sink, handle) = StreamSink::channel();
        spawn_sink_forwarder(shared.writer_tx.clone(), pointer, handle);
        InvokeValue::Sink(sink)
    }
}

/// `invoke`: allocates an id, writes the request frame, and returns the
/// pending completion.
pub(crate) fn send_request(
    shared: &ConnectionShared,
    id: RequestId,
    method: &str,
    params: Vec<Value>,
) {
    send_frame(shared, &Message::request(id, method, params));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::message::RpcError;

    fn shared_for_test() -> (ConnectionShared, mpsc::UnboundedReceiver<Vec<u8>>, mpsc::UnboundedReceiver<UnhandledEvent>) {
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let (unhandled_tx, unhandled_rx) = mpsc::unbounded_channel();
        let shared = ConnectionShared {
            scheme: Config::default().scheme,
            writer_tx,
            stream_registry: crate::registry::StreamRegistry::new(),
            unhandled_tx,
        };
        (shared, writer_rx, unhandled_rx)
    }

    #[tokio::test]
    async fn server_reports_invalid_method_and_keeps_connection_usable() {
        let (shared, mut writer_rx, _unhandled_rx) = shared_for_test();
        let handlers = HandlerTable::builder().build();

        dispatch_server(
            &shared,
            &handlers,
            Message::request(RequestId::from("1"), "missing", vec![]),
        )
        .await;

        let frame = writer_rx.recv().await.expect("error frame sent");
        let value: Value = serde_json::from_slice(&frame).unwrap();
        let decoded = Message::from_value(value).expect("decodes");
        match decoded {
            Message::Error { id, error } => {
                assert_eq!(id.unwrap().as_str(), "1");
                assert!(error.message.contains("missing"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_propagates_handler_error_as_error_response() {
        let (shared, mut writer_rx, _unhandled_rx) = shared_for_test();
        let handlers = HandlerTable::builder()
            .method("boom", |_params: Vec<Value>| async move {
                Err(RpcError::internal("boom"))
            })
            .build();

        dispatch_server(
            &shared,
            &handlers,
            Message::request(RequestId::from("1"), "boom", vec![]),
        )
        .await;

        let frame = writer_rx.recv().await.expect("error frame sent");
        let value: Value = serde_json::from_slice(&frame).unwrap();
        match Message::from_value(value).unwrap() {
            Message::Error { error, .. } => assert_eq!(error.message, "boom"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn client_reports_stray_notification_to_unregistered_pointer() {
        let (shared, _writer_rx, mut unhandled_rx) = shared_for_test();
        let calls = CallRegistry::new();

        dispatch_client(
            &shared,
            &calls,
            Message::notification("mascara://ghost.readable", vec![Value::from("chunk")]),
        )
        .await;

        let event = unhandled_rx.recv().await.expect("unhandled reported");
        assert_eq!(event.message_kind, "notification");
        assert!(event.detail.contains("ghost"));
    }

    #[tokio::test]
    async fn client_reports_non_pointer_notification_as_unhandled() {
        let (shared, _writer_rx, mut unhandled_rx) = shared_for_test();
        let calls = CallRegistry::new();

        dispatch_client(&shared, &calls, Message::notification("progress", vec![])).await;

        let event = unhandled_rx.recv().await.expect("unhandled reported");
        assert_eq!(event.message_kind, "notification");
        assert_eq!(event.detail, "progress");
    }

    #[tokio::test]
    async fn client_reports_stray_response_for_unknown_id() {
        let (shared, _writer_rx, mut unhandled_rx) = shared_for_test();
        let calls = CallRegistry::new();

        dispatch_client(
            &shared,
            &calls,
            Message::success(RequestId::from("999"), vec![]),
        )
        .await;

        let event = unhandled_rx.recv().await.expect("unhandled reported");
        assert_eq!(event.message_kind, "success");
        assert!(event.detail.contains("999"));
    }
}
