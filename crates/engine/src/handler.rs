//! Server-side method dispatch table (`spec.md` §4.4).
//!
//! A handler receives the request's positional params and returns either a
//! positional result or an [`RpcError`]; it may embed a freshly minted
//! [`crate::pointer::StreamPointer`] string inside that result exactly like
//! any other value; `spec.md` doesn't give handlers a separate "streaming"
//! API; the pointer convention is carried entirely in the result shape.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::message::RpcError;
use crate::value::HandlerValue;

/// A handler's return type: boxed so [`HandlerTable`] can hold
/// heterogeneous handler closures behind one trait object.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Vec<HandlerValue>, RpcError>> + Send>>;

/// A registered method implementation.
pub trait Handler: Send + Sync {
    fn call(&self, params: Vec<Value>) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<HandlerValue>, RpcError>> + Send + 'static,
{
    fn call(&self, params: Vec<Value>) -> HandlerFuture {
        Box::pin((self)(params))
    }
}

/// Method-name-to-handler map, built once at server construction and shared
/// read-only across connections.
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: Arc<HashMap<String, Arc<dyn Handler>>>,
}

impl HandlerTable {
    pub fn builder() -> HandlerTableBuilder {
        HandlerTableBuilder::default()
    }

    /// Looks up the handler registered for `method`, if any (`spec.md` §7
    /// category 3 when absent).
    pub fn get(&self, method: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(method).cloned()
    }
}

#[derive(Default)]
pub struct HandlerTableBuilder {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerTableBuilder {
    pub fn method(mut self, name: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn build(self) -> HandlerTable {
        HandlerTable {
            handlers: Arc::new(self.handlers),
        }
    }
}
