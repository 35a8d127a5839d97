//! End-to-end pipeline tests: framed bytes in, framed replies and buffer
//! state out, independent of how the input stream is chunked.

use std::cell::RefCell;
use std::rc::Rc;

use lsp_host::{BufferCollection, JsonRpcDispatcher, MessageStreamSplitter, SessionError};
use serde_json::{Value, json};

/// Frame a message body the way a client would.
fn frame(body: &str) -> String {
    format!("Content-Length: {}\r\n\r\n{body}", body.len())
}

/// A pre-filled input stream with a configurable maximum chunk size.
struct ChunkedStream {
    content: Vec<u8>,
    max_chunk: usize,
    pos: usize,
}

impl ChunkedStream {
    fn new(content: String, max_chunk: usize) -> Self {
        Self {
            content: content.into_bytes(),
            max_chunk,
            pos: 0,
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let len = buf
            .len()
            .min(self.max_chunk)
            .min(self.content.len() - self.pos);
        buf[..len].copy_from_slice(&self.content[self.pos..self.pos + len]);
        self.pos += len;
        Ok(len)
    }
}

struct Session {
    splitter: MessageStreamSplitter,
    dispatcher: Rc<RefCell<JsonRpcDispatcher>>,
    buffers: BufferCollection,
    replies: Rc<RefCell<Vec<Value>>>,
}

/// Wire up splitter → dispatcher → buffer collection, with an `echo` request
/// handler and replies collected as parsed JSON.
fn build_session() -> Session {
    let replies = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&replies);
    let dispatcher = Rc::new(RefCell::new(JsonRpcDispatcher::new(move |reply: &str| {
        sink.borrow_mut()
            .push(serde_json::from_str::<Value>(reply).expect("reply must be valid JSON"));
    })));

    let buffers = BufferCollection::new(&mut dispatcher.borrow_mut());
    dispatcher
        .borrow_mut()
        .add_request_handler("echo", |params| Ok(params.clone()));

    let mut splitter = MessageStreamSplitter::new(1 << 20);
    let inner = Rc::clone(&dispatcher);
    splitter.set_message_processor(move |_header, body| {
        inner.borrow_mut().dispatch_message(body);
    });

    Session {
        splitter,
        dispatcher,
        buffers,
        replies,
    }
}

/// Drive the stream to EOF and return the terminal session status.
fn drain(session: &mut Session, stream: &mut ChunkedStream) -> SessionError {
    loop {
        if let Err(err) = session.splitter.pull_from(&mut |buf: &mut [u8]| stream.read(buf)) {
            return err;
        }
    }
}

fn lifecycle_input() -> String {
    let open = json!({
        "jsonrpc": "2.0",
        "method": "textDocument/didOpen",
        "params": { "textDocument": {
            "uri": "file:///demo.txt",
            "languageId": "plaintext",
            "version": 1,
            "text": "Hello\nbrave World\n"
        }}
    });
    let echo = json!({
        "jsonrpc": "2.0", "id": 7, "method": "echo", "params": { "x": 1 }
    });
    let change = json!({
        "jsonrpc": "2.0",
        "method": "textDocument/didChange",
        "params": {
            "textDocument": { "uri": "file:///demo.txt", "version": 2 },
            "contentChanges": [{
                "range": { "start": { "line": 0, "character": 2 },
                           "end": { "line": 1, "character": 5 } },
                "text": "y!\nThis will be a new line\nand more in this"
            }]
        }
    });
    let unknown = json!({
        "jsonrpc": "2.0", "id": 8, "method": "does/notExist"
    });
    [open, echo, change, unknown]
        .iter()
        .map(|m| frame(&m.to_string()))
        .collect()
}

fn assert_lifecycle_outcome(session: &Session, status: SessionError) {
    assert!(status.is_clean_eof(), "unexpected status: {status:?}");

    let replies = session.replies.borrow();
    assert_eq!(replies.len(), 2, "only the two requests get replies");
    assert_eq!(replies[0]["id"], 7);
    assert_eq!(replies[0]["result"], json!({"x": 1}));
    assert!(replies[0].get("error").is_none());
    assert_eq!(replies[1]["id"], 8);
    assert_eq!(replies[1]["error"]["code"], -32601);

    let text = session
        .buffers
        .with_buffer("file:///demo.txt", |b| b.request_content(|s| s.to_string()))
        .expect("document must be open");
    assert_eq!(text, "Hey!\nThis will be a new line\nand more in this World\n");
}

#[test]
fn full_session_with_single_large_read() {
    let mut session = build_session();
    let mut stream = ChunkedStream::new(lifecycle_input(), usize::MAX);
    let status = drain(&mut session, &mut stream);
    assert_lifecycle_outcome(&session, status);
}

#[test]
fn full_session_with_three_byte_trickle() {
    let mut session = build_session();
    let mut stream = ChunkedStream::new(lifecycle_input(), 3);
    let status = drain(&mut session, &mut stream);
    assert_lifecycle_outcome(&session, status);
}

#[test]
fn chunking_never_changes_the_reply_sequence() {
    let reference = {
        let mut session = build_session();
        let mut stream = ChunkedStream::new(lifecycle_input(), usize::MAX);
        drain(&mut session, &mut stream);
        let replies = session.replies.borrow().clone();
        replies
    };

    for chunk in [1, 2, 7, 16, 61, 256] {
        let mut session = build_session();
        let mut stream = ChunkedStream::new(lifecycle_input(), chunk);
        let status = drain(&mut session, &mut stream);
        assert!(status.is_clean_eof());
        assert_eq!(
            *session.replies.borrow(),
            reference,
            "chunk size {chunk} changed the outcome"
        );
    }
}

#[test]
fn idle_scan_sees_documents_changed_since_last_version() {
    let mut session = build_session();
    let mut stream = ChunkedStream::new(lifecycle_input(), usize::MAX);
    drain(&mut session, &mut stream);

    let mut changed = Vec::new();
    session
        .buffers
        .map_changed_since(0, |uri, buffer| changed.push((uri.to_string(), buffer.edit_count())));
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].0, "file:///demo.txt");
    assert_eq!(changed[0].1, 1); // one didChange event applied

    // After remembering the current version, nothing is pending.
    let version = session.buffers.global_version();
    let mut pending = 0;
    session.buffers.map_changed_since(version, |_, _| pending += 1);
    assert_eq!(pending, 0);
}

#[test]
fn outbound_notification_is_framed_by_the_adapter() {
    // The dispatcher emits bare bodies; the transport adapter frames them.
    let framed = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&framed);
    let mut dispatcher = JsonRpcDispatcher::new(move |reply: &str| {
        let mut out = Vec::new();
        lsp_host::transport::write_framed(&mut out, reply.trim_end()).unwrap();
        sink.borrow_mut().push(out);
    });

    dispatcher.send_notification(
        "textDocument/publishDiagnostics",
        json!({ "uri": "file:///demo.txt", "diagnostics": [] }),
    );

    let framed = framed.borrow();
    assert_eq!(framed.len(), 1);
    let text = String::from_utf8(framed[0].clone()).unwrap();
    let header_end = text.find("\r\n\r\n").expect("framed output has a header");
    let announced: usize = text["Content-Length: ".len()..header_end]
        .parse()
        .expect("numeric Content-Length");
    let body = &text[header_end + 4..];
    assert_eq!(body.len(), announced);
    let parsed: Value = serde_json::from_str(body).unwrap();
    assert_eq!(parsed["method"], "textDocument/publishDiagnostics");
}

#[test]
fn corrupted_header_ends_the_session_mid_stream() {
    let mut session = build_session();
    let good = frame(r#"{"jsonrpc":"2.0","id":1,"method":"echo","params":null}"#);
    let bad = "Oops-No-Length: 3\r\n\r\nfoo";
    let mut stream = ChunkedStream::new(format!("{good}{bad}"), usize::MAX);

    let status = drain(&mut session, &mut stream);
    assert!(matches!(status, SessionError::MalformedHeader { .. }));
    // The good frame before the corruption was still dispatched.
    assert_eq!(session.replies.borrow().len(), 1);
    assert_eq!(session.replies.borrow()[0]["id"], 1);
}

#[test]
fn truncated_stream_reports_data_loss() {
    let mut session = build_session();
    let body = r#"{"jsonrpc":"2.0","method":"x"}"#;
    let mut input = frame(body);
    input.truncate(input.len() - 5); // cut mid-body
    let mut stream = ChunkedStream::new(input, usize::MAX);

    let status = drain(&mut session, &mut stream);
    assert!(matches!(status, SessionError::TruncatedFrame { .. }));
    assert!(session.replies.borrow().is_empty());
}

#[test]
fn response_order_follows_request_order() {
    let mut session = build_session();
    let input: String = (0..10)
        .map(|i| {
            frame(&json!({"jsonrpc":"2.0","id":i,"method":"echo","params":i}).to_string())
        })
        .collect();
    let mut stream = ChunkedStream::new(input, 5);
    let status = drain(&mut session, &mut stream);
    assert!(status.is_clean_eof());

    let replies = session.replies.borrow();
    assert_eq!(replies.len(), 10);
    for (i, reply) in replies.iter().enumerate() {
        assert_eq!(reply["id"], i);
        assert_eq!(reply["result"], i);
    }
}

#[test]
fn dispatcher_statistics_reflect_the_session() {
    let mut session = build_session();
    let mut stream = ChunkedStream::new(lifecycle_input(), usize::MAX);
    drain(&mut session, &mut stream);

    let dispatcher = session.dispatcher.borrow();
    let stats = dispatcher.stat_counters();
    assert_eq!(stats["echo RPC"], 1);
    assert_eq!(stats["textDocument/didOpen  ev"], 1);
    assert_eq!(stats["textDocument/didChange  ev"], 1);
    assert_eq!(stats["does/notExist (unhandled) RPC"], 1);
}
