#![forbid(unsafe_code)]
//! Bidirectional JSON-RPC 2.0 engine with stream-pointer rebinding: a
//! positional-params-only profile where any response or notification value
//! can be a URL-shaped pointer that gets rebound to a live byte/object
//! stream on the receiving peer instead of carrying its payload inline.
//!
//! ## Wire shape
//! - [`message::Message`] models the four JSON-RPC message kinds (request,
//!   success, error, notification); [`message::RequestId`] is the string id
//!   that correlates a request with its terminal response.
//! - [`framer::encode_frame`] appends the `\r\n` delimiter on the way out;
//!   [`deframer::Deframer`] is the stateful counterpart on the way in, with
//!   [`config::DecodeMode`] choosing whether a malformed frame holds the
//!   buffer (`Lenient`) or closes the connection (`Strict`).
//! - [`pointer::StreamPointer`] is the `<scheme>://<id>.<readable|writable>`
//!   sentinel a handler mints and a peer rebinds; [`stream::StreamSource`] /
//!   [`stream::StreamSink`] are the two halves of a rebound stream.
//!
//! ## Programmatic surface
//! - [`server::Server`] is built from a [`handler::HandlerTable`] and a
//!   [`transport::ServerFactory`]; `listen` accepts connections forever and
//!   reports anything it couldn't route on [`server::UnhandledEvents`].
//! - [`client::Client`] is built from a [`transport::ClientFactory`];
//!   `connect` returns a [`client::Connection`] whose `invoke` writes a
//!   request and returns a [`client::PendingInvocation`].
//! - [`transport::Transport`] is blanket-implemented for any
//!   `AsyncRead + AsyncWrite` pair; TCP and (on Unix) Unix-domain-socket
//!   factories are provided out of the box, alongside
//!   [`transport::in_memory_pair`] for embedding both peers in one process.
//!
//! ## Configuration and errors
//! - [`config::Config`] carries the deployment-fixed knobs (scheme, decode
//!   mode, frame-buffer limit, read chunk size, invoker-layer call timeout).
//! - [`error::EngineError`] is the error taxonomy; [`error::EngineError::is_fatal`]
//!   tells connection-ending categories apart from locally recoverable ones.
//!   `From<EngineError> for RpcError` is how a caught error becomes a wire
//!   error response.

mod client;
mod config;
mod connection;
mod deframer;
mod dispatcher;
mod error;
mod framer;
mod handler;
mod message;
mod pointer;
mod registry;
mod server;
mod stream;
mod transport;
mod value;

pub use client::{Client, Connection, PendingInvocation};
pub use config::{Config, DecodeMode, DEFAULT_SCHEME};
pub use deframer::{DeframeBatch, Deframer};
pub use dispatcher::UnhandledEvent;
pub use error::EngineError;
pub use framer::encode_frame;
pub use handler::{Handler, HandlerTable, HandlerTableBuilder};
pub use message::{Message, RequestId, RpcError};
pub use pointer::{PointerKind, StreamPointer};
pub use registry::{CallOutcome, PendingCall};
pub use server::{Server, UnhandledEvents};
pub use stream::{StreamSink, StreamSinkHandle, StreamSource, StreamSourceHandle};
pub use transport::{in_memory_pair, ClientFactory, ServerFactory, Transport, TcpClientFactory, TcpServerFactory};
#[cfg(unix)]
pub use transport::{UnixClientFactory, UnixServerFactory};
pub use value::{HandlerValue, InvokeValue};
