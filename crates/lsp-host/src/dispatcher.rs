//! JSON-RPC 2.0 message dispatch.
//!
//! The dispatcher is fed one message body at a time, parses it, and routes it
//! to pre-registered handlers. Results of request handlers are wrapped in a
//! response object and written out through the provided write function;
//! notifications never produce replies, per the JSON-RPC specification.
//!
//! Receiving ([`dispatch_message`](JsonRpcDispatcher::dispatch_message)) and
//! reply writing are both abstracted over plain functions, keeping the
//! dispatcher agnostic of the transport layer. Handlers take and return
//! [`serde_json::Value`]; typed params are one `serde_json::from_value` away,
//! and `?` on that decode turns into the proper wire error.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Value, json};
use thiserror::Error;

/// JSON-RPC wire code: the message body was not valid JSON.
pub const PARSE_ERROR: i64 = -32700;
/// JSON-RPC wire code: no such method (or no `method` member at all).
pub const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC wire code: a request handler failed while executing.
pub const INTERNAL_ERROR: i64 = -32603;

/// Failure a handler hands back to the dispatch boundary.
///
/// For requests this becomes a [`INTERNAL_ERROR`] reply carrying the message;
/// for notifications it is counted and swallowed.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Handles a request: receives `params`, returns the `result` payload.
pub type RequestHandler = Box<dyn FnMut(&Value) -> Result<Value, HandlerError>>;
/// Handles a notification: receives `params`, returns nothing.
pub type NotificationHandler = Box<dyn FnMut(&Value) -> Result<(), HandlerError>>;
/// Receives each serialized reply as a single string chunk.
pub type WriteFun = Box<dyn FnMut(&str)>;

/// Routes parsed JSON-RPC messages to registered handlers and writes replies.
pub struct JsonRpcDispatcher {
    write_fun: WriteFun,
    request_handlers: HashMap<String, RequestHandler>,
    notification_handlers: HashMap<String, NotificationHandler>,
    statistic_counters: BTreeMap<String, u64>,
}

impl JsonRpcDispatcher {
    /// Create a dispatcher writing replies through `write_fun`.
    ///
    /// Each call to the write function carries one complete serialized
    /// message; wrapping it into `Content-Length:` framing is the transport
    /// adapter's job (see [`crate::transport::write_framed`]).
    pub fn new(write_fun: impl FnMut(&str) + 'static) -> Self {
        Self {
            write_fun: Box::new(write_fun),
            request_handlers: HashMap::new(),
            notification_handlers: HashMap::new(),
            statistic_counters: BTreeMap::new(),
        }
    }

    /// Register a handler for RPC calls that receive params and send a response.
    pub fn add_request_handler(
        &mut self,
        method: impl Into<String>,
        handler: impl FnMut(&Value) -> Result<Value, HandlerError> + 'static,
    ) {
        self.request_handlers
            .insert(method.into(), Box::new(handler));
    }

    /// Register a handler for notifications, the receive-only events.
    pub fn add_notification_handler(
        &mut self,
        method: impl Into<String>,
        handler: impl FnMut(&Value) -> Result<(), HandlerError> + 'static,
    ) {
        self.notification_handlers
            .insert(method.into(), Box::new(handler));
    }

    /// Dispatch one incoming message body.
    ///
    /// Call this with the content of exactly one message. If it is an RPC
    /// call, the response goes out through the write function before this
    /// returns.
    pub fn dispatch_message(&mut self, data: &[u8]) {
        let request: Value = match serde_json::from_slice(data) {
            Ok(value) => value,
            Err(err) => {
                let message = err.to_string();
                *self.statistic_counters.entry(message.clone()).or_default() += 1;
                let reply = error_response(&Value::Null, PARSE_ERROR, &message);
                Self::send_reply(&mut self.write_fun, &reply);
                return;
            }
        };

        let Some(method) = request.get("method").and_then(Value::as_str) else {
            let reply = error_response(&request, METHOD_NOT_FOUND, "Method required in request");
            Self::send_reply(&mut self.write_fun, &reply);
            *self
                .statistic_counters
                .entry("Request without method".to_string())
                .or_default() += 1;
            return;
        };
        let method = method.to_string();

        let is_notification = request.get("id").is_none();
        let handled = if is_notification {
            self.call_notification(&request, &method)
        } else {
            self.call_request_handler(&request, &method)
        };

        let key = format!(
            "{method}{}{}",
            if handled { "" } else { " (unhandled)" },
            if is_notification { "  ev" } else { " RPC" }
        );
        *self.statistic_counters.entry(key).or_default() += 1;
    }

    /// Compose and write an outbound server→client notification.
    pub fn send_notification(&mut self, method: &str, params: Value) {
        let message = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        Self::send_reply(&mut self.write_fun, &message);
    }

    /// Counters of methods called and errors encountered, keyed by
    /// `"<method> RPC"` / `"<method>  ev"` (with ` (unhandled)` when no
    /// handler matched) and `"<method> : <error>"` for handler failures.
    pub fn stat_counters(&self) -> &BTreeMap<String, u64> {
        &self.statistic_counters
    }

    fn call_notification(&mut self, request: &Value, method: &str) -> bool {
        let Self {
            notification_handlers,
            statistic_counters,
            ..
        } = self;
        let Some(handler) = notification_handlers.get_mut(method) else {
            return false;
        };

        let params = request.get("params").cloned().unwrap_or(Value::Null);
        match handler(&params) {
            Ok(()) => true,
            Err(err) => {
                *statistic_counters
                    .entry(format!("{method} : {err}"))
                    .or_default() += 1;
                false
            }
        }
    }

    fn call_request_handler(&mut self, request: &Value, method: &str) -> bool {
        let Self {
            request_handlers,
            write_fun,
            statistic_counters,
            ..
        } = self;
        let Some(handler) = request_handlers.get_mut(method) else {
            let reply = error_response(
                request,
                METHOD_NOT_FOUND,
                &format!("method '{method}' not found."),
            );
            Self::send_reply(write_fun, &reply);
            return false;
        };

        let params = request.get("params").cloned().unwrap_or(Value::Null);
        match handler(&params) {
            Ok(result) => {
                let reply = make_response(request, result);
                Self::send_reply(write_fun, &reply);
                true
            }
            Err(err) => {
                *statistic_counters
                    .entry(format!("{method} : {err}"))
                    .or_default() += 1;
                let reply = error_response(request, INTERNAL_ERROR, &err.to_string());
                Self::send_reply(write_fun, &reply);
                false
            }
        }
    }

    fn send_reply(write_fun: &mut WriteFun, response: &Value) {
        // Trailing newline for robustness when a human reads the raw stream.
        let mut out = response.to_string();
        out.push('\n');
        write_fun(&out);
    }
}

/// Success response: `jsonrpc`, mirrored `id`, `result`.
fn make_response(request: &Value, call_result: Value) -> Value {
    let mut response = json!({ "jsonrpc": "2.0" });
    if let Some(id) = request.get("id") {
        response["id"] = id.clone();
    }
    response["result"] = call_result;
    response
}

/// Error response: `jsonrpc`, `error{code, message?}`, `id` mirrored
/// verbatim (including `null`) when the request carried one.
fn error_response(request: &Value, code: i64, message: &str) -> Value {
    let mut response = json!({ "jsonrpc": "2.0", "error": { "code": code } });
    if !message.is_empty() {
        response["error"]["message"] = json!(message);
    }
    if let Some(id) = request.get("id") {
        response["id"] = id.clone();
    }
    response
}
