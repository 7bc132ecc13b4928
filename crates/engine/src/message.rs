//! Wire types for the positional-params JSON-RPC 2.0 profile.
//!
//! Request/response/notification are told apart by which fields are present
//! on the decoded object, not by an explicit kind discriminant, so decoding
//! goes through [`Message::from_value`] rather than a single derived
//! `Deserialize` impl on [`Message`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC standard "Method not found" error code.
pub const ERROR_CODE_INVALID_METHOD: i64 = -32601;
/// Generic error code used for handler failures and other internal errors.
pub const ERROR_CODE_INTERNAL: i64 = -32000;
/// Error code used when a decoded frame violates the positional-params profile.
pub const ERROR_CODE_PROTOCOL: i64 = -32600;

/// Identifier correlating a request with its terminal response.
///
/// The profile fixes `id` as a string (see `spec.md` §3); this newtype keeps
/// call sites from passing raw `String`s interchangeably with method names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds a fresh id from a monotonic counter; used by the call registry.
    pub(crate) fn from_sequence(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RequestId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// `{code, message}` shape used by error responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_method(method: &str) -> Self {
        Self::new(
            ERROR_CODE_INVALID_METHOD,
            format!("Invalid method: {method}"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ERROR_CODE_INTERNAL, message.into())
    }
}

/// One decoded JSON-RPC message, per the four variants in `spec.md` §3.
#[derive(Debug, Clone)]
pub enum Message {
    Request {
        id: RequestId,
        method: String,
        params: Vec<Value>,
    },
    Success {
        id: RequestId,
        result: Vec<Value>,
    },
    Error {
        id: Option<RequestId>,
        error: RpcError,
    },
    Notification {
        method: String,
        params: Vec<Value>,
    },
}

impl Message {
    pub fn request(id: RequestId, method: impl Into<String>, params: Vec<Value>) -> Self {
        Message::Request {
            id,
            method: method.into(),
            params,
        }
    }

    pub fn success(id: RequestId, result: Vec<Value>) -> Self {
        Message::Success { id, result }
    }

    pub fn error(id: Option<RequestId>, error: RpcError) -> Self {
        Message::Error { id, error }
    }

    pub fn notification(method: impl Into<String>, params: Vec<Value>) -> Self {
        Message::Notification {
            method: method.into(),
            params,
        }
    }

    /// Serializes to the on-wire JSON value (without the `\r\n` terminator).
    pub fn to_value(&self) -> Value {
        match self {
            Message::Request { id, method, params } => serde_json::json!({
                "jsonrpc": "2.0",
                "id": id.as_str(),
                "method": method,
                "params": params,
            }),
            Message::Success { id, result } => serde_json::json!({
                "jsonrpc": "2.0",
                "id": id.as_str(),
                "result": result,
            }),
            Message::Error { id, error } => serde_json::json!({
                "jsonrpc": "2.0",
                "id": id.as_ref().map(RequestId::as_str),
                "error": error,
            }),
            Message::Notification { method, params } => serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
            }),
        }
    }

    /// Classifies a decoded JSON value into a [`Message`].
    ///
    /// Returns `None` when the value doesn't match any of the four shapes in
    /// `spec.md` §3, or when `params`/`result` is present but not an array
    /// (the profile's positional-only invariant, §6).
    pub fn from_value(value: Value) -> Option<Message> {
        let Value::Object(map) = value else {
            return None;
        };

        let id = map.get("id").cloned();
        let method = map
            .get("method")
            .and_then(Value::as_str)
            .map(str::to_string);
        let has_result = map.contains_key("result");
        let has_error = map.contains_key("error");

        if let Some(method) = &method {
            let params = match map.get("params") {
                None => Vec::new(),
                Some(Value::Array(items)) => items.clone(),
                Some(_) => return None,
            };

            return match id {
                None => Some(Message::notification(method.clone(), params)),
                Some(id_value) => {
                    let id = string_id(&id_value)?;
                    Some(Message::request(id, method.clone(), params))
                }
            };
        }

        if has_result || has_error {
            let id = match &id {
                Some(Value::Null) | None => None,
                Some(other) => Some(string_id(other)?),
            };

            if has_error {
                let error: RpcError = serde_json::from_value(map.get("error")?.clone()).ok()?;
                return Some(Message::error(id, error));
            }

            let id = id?;
            return match map.get("result") {
                Some(Value::Array(items)) => Some(Message::success(id, items.clone())),
                _ => None,
            };
        }

        None
    }
}

fn string_id(value: &Value) -> Option<RequestId> {
    value.as_str().map(RequestId::from)
}
