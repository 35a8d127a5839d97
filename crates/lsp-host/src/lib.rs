#![warn(missing_docs)]
//! Core of a single-process Language Server Protocol host.
//!
//! # Overview
//!
//! `lsp-host` provides the transport-agnostic machinery an LSP server needs
//! before any language smarts enter the picture:
//!
//! - **Frame splitting**: recover complete `Content-Length`-framed messages
//!   from a byte stream delivered in arbitrary chunks ([`MessageStreamSplitter`])
//! - **JSON-RPC dispatch**: route requests and notifications to typed
//!   handlers, format replies and errors per the JSON-RPC 2.0 rules
//!   ([`JsonRpcDispatcher`])
//! - **Document mirroring**: apply incremental `didChange` edits so handlers
//!   always see what the client sees ([`EditTextBuffer`], [`BufferCollection`])
//! - **Event multiplexing**: wait on fd readability with an idle timeout so
//!   background work (diagnostics) runs only when the client is quiet
//!   ([`FileEventDispatcher`])
//!
//! Everything runs on one thread. The only suspension point is the readiness
//! wait; frame parsing, dispatch, handler execution and buffer mutation all
//! run to completion synchronously, which is what makes the whole stack
//! lock-free.
//!
//! # Data flow
//!
//! ```text
//! fd → FileEventDispatcher → MessageStreamSplitter → JsonRpcDispatcher
//!        → handler → BufferCollection → write function → fd
//! ```
//!
//! The dispatcher writes bare JSON bodies; [`transport::write_framed`] is the
//! thin adapter that adds `Content-Length` framing on the way out.
//!
//! # Quick start
//!
//! ```rust
//! use lsp_host::{JsonRpcDispatcher, MessageStreamSplitter};
//! use serde_json::json;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let replies = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&replies);
//! let dispatcher = Rc::new(RefCell::new(JsonRpcDispatcher::new(move |reply: &str| {
//!     sink.borrow_mut().push(reply.to_string());
//! })));
//! dispatcher
//!     .borrow_mut()
//!     .add_request_handler("ping", |_params| Ok(json!("pong")));
//!
//! let mut splitter = MessageStreamSplitter::new(1 << 20);
//! let inner = Rc::clone(&dispatcher);
//! splitter.set_message_processor(move |_header, body| {
//!     inner.borrow_mut().dispatch_message(body);
//! });
//!
//! let frame = b"Content-Length: 40\r\n\r\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}";
//! let mut offered = false;
//! let mut read_fun = |buf: &mut [u8]| {
//!     if offered {
//!         return Ok(0);
//!     }
//!     offered = true;
//!     buf[..frame.len()].copy_from_slice(frame);
//!     Ok(frame.len())
//! };
//! splitter.pull_from(&mut read_fun).unwrap();
//! assert!(replies.borrow()[0].contains("pong"));
//! ```

pub mod buffer;
pub mod dispatcher;
pub mod error;
#[cfg(unix)]
pub mod event_loop;
pub mod splitter;
pub mod transport;
pub mod types;

pub use buffer::{BufferCollection, EditTextBuffer};
pub use dispatcher::{
    HandlerError, INTERNAL_ERROR, JsonRpcDispatcher, METHOD_NOT_FOUND, PARSE_ERROR,
};
pub use error::SessionError;
#[cfg(unix)]
pub use event_loop::FileEventDispatcher;
pub use splitter::MessageStreamSplitter;
pub use types::{
    Diagnostic, Position, PublishDiagnosticsParams, Range, TextDocumentContentChangeEvent,
};
