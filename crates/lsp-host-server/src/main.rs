//! Stdio language-server shell around the `lsp-host` core.
//!
//! The client starts this binary and speaks framed JSON-RPC over its
//! stdin/stdout. All logging goes to stderr: stdout belongs to the protocol.

mod diagnostics;

use std::cell::{Cell, RefCell};
use std::process::ExitCode;
use std::rc::Rc;

use lsp_host::{
    BufferCollection, FileEventDispatcher, JsonRpcDispatcher, MessageStreamSplitter, SessionError,
    transport,
};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use crate::diagnostics::DiagnosticsPublisher;

/// Must exceed the largest frame a client is expected to send.
const READ_BUFFER_SIZE: usize = 1 << 20;

/// Quiet time on stdin before the diagnostics pass runs.
const IDLE_INTERVAL_MS: u32 = 100;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Editors commonly pass --stdio; anything else is a mistake worth
    // refusing loudly rather than silently eating protocol bytes.
    for arg in std::env::args().skip(1) {
        if arg != "--stdio" {
            tracing::error!(%arg, "unexpected argument (only --stdio is accepted)");
            return ExitCode::FAILURE;
        }
    }

    serve()
}

/// The `initialize` result: what this host can do.
fn server_capabilities() -> Value {
    json!({
        "capabilities": {
            "textDocumentSync": {
                "openClose": true,
                // 2 = incremental: the buffer store applies ranged edits.
                "change": 2,
            },
            "codeActionProvider": true,
        },
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

fn serve() -> ExitCode {
    let dispatcher = Rc::new(RefCell::new(JsonRpcDispatcher::new(|reply: &str| {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        if let Err(err) = transport::write_framed(&mut out, reply) {
            tracing::warn!(%err, "dropped reply: stdout write failed");
        }
    })));

    let splitter = Rc::new(RefCell::new(MessageStreamSplitter::new(READ_BUFFER_SIZE)));
    {
        let dispatcher = Rc::clone(&dispatcher);
        splitter
            .borrow_mut()
            .set_message_processor(move |_header, body| {
                dispatcher.borrow_mut().dispatch_message(body);
            });
    }

    let buffers = BufferCollection::new(&mut dispatcher.borrow_mut());
    let shutdown = Rc::new(Cell::new(false));

    {
        let mut d = dispatcher.borrow_mut();

        d.add_request_handler("initialize", |params| {
            if let Some(client) = params.get("clientInfo").and_then(|c| c.get("name")) {
                tracing::info!(client = %client, "initialize");
            }
            Ok(server_capabilities())
        });
        d.add_notification_handler("initialized", |_params| Ok(()));

        let flag = Rc::clone(&shutdown);
        d.add_request_handler("shutdown", move |_params| {
            flag.set(true);
            Ok(Value::Null)
        });
        let flag = Rc::clone(&shutdown);
        d.add_notification_handler("exit", move |_params| {
            flag.set(true);
            Ok(())
        });

        d.add_request_handler("textDocument/codeAction", |_params| Ok(json!([])));
    }

    let mut mux = FileEventDispatcher::new(IDLE_INTERVAL_MS);
    let session_end: Rc<RefCell<Option<SessionError>>> = Rc::new(RefCell::new(None));

    {
        let splitter = Rc::clone(&splitter);
        let shutdown = Rc::clone(&shutdown);
        let session_end = Rc::clone(&session_end);
        let mut read_fun = transport::fd_reader(libc::STDIN_FILENO);
        mux.run_on_readable(libc::STDIN_FILENO, move || {
            match splitter.borrow_mut().pull_from(&mut read_fun) {
                Ok(()) => !shutdown.get(),
                Err(err) => {
                    *session_end.borrow_mut() = Some(err);
                    false
                }
            }
        });
    }

    {
        let buffers = buffers.clone();
        let dispatcher = Rc::clone(&dispatcher);
        let mut publisher = DiagnosticsPublisher::new();
        mux.run_on_idle(move || {
            publisher.publish_pending(&buffers, &mut dispatcher.borrow_mut());
            true
        });
    }

    mux.run();

    log_statistics(&splitter.borrow(), &dispatcher.borrow(), buffers.open_count());

    match (&*session_end.borrow(), shutdown.get()) {
        (Some(err), false) if !err.is_clean_eof() => {
            tracing::error!(%err, "session failed");
            ExitCode::FAILURE
        }
        _ => ExitCode::SUCCESS,
    }
}

fn log_statistics(
    splitter: &MessageStreamSplitter,
    dispatcher: &JsonRpcDispatcher,
    open_documents: usize,
) {
    tracing::info!(
        total_bytes = splitter.total_bytes_read(),
        largest_body = splitter.largest_body_seen(),
        open_documents,
        "session ended"
    );
    for (method, count) in dispatcher.stat_counters() {
        tracing::info!(%method, count, "dispatch counter");
    }
}
