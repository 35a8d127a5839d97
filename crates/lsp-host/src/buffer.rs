//! In-memory mirror of client-side text documents.
//!
//! [`EditTextBuffer`] holds one document as a vector of owned lines and
//! applies the incremental edits a client sends through
//! `textDocument/didChange`. [`BufferCollection`] keys buffers by URI and
//! wires itself to a [`JsonRpcDispatcher`] so the `textDocument/did*`
//! notifications keep the mirror in sync without any further glue.
//!
//! Everything here runs on the dispatch thread; content views are handed out
//! through callbacks and are only valid for the duration of the call.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use crate::dispatcher::JsonRpcDispatcher;
use crate::types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DidSaveTextDocumentParams, TextDocumentContentChangeEvent,
};

/// One open document: an ordered sequence of lines, each owning its bytes.
///
/// Every line except possibly the last ends in `\n`; `\r\n` endings keep the
/// `\r` inside the line. Concatenating all lines in order reproduces exactly
/// the byte sequence the client last synchronized.
pub struct EditTextBuffer {
    lines: Vec<String>,
    /// Cached total byte length; always equals the sum of line lengths.
    document_length: usize,
    /// Bumped once per applied change event, success or not.
    edit_count: u64,
    /// Store-wide version stamp of the last change that touched this buffer.
    last_change_version: u64,
}

impl EditTextBuffer {
    /// Create a buffer holding `initial_text`.
    pub fn new(initial_text: &str) -> Self {
        let mut buffer = Self {
            lines: Vec::new(),
            document_length: 0,
            edit_count: 0,
            last_change_version: 0,
        };
        buffer.replace_document(initial_text);
        buffer
    }

    /// Apply a single LSP change event.
    ///
    /// Returns `false` (leaving the content untouched) when the range is not
    /// addressable in the current document. The edit counter advances either
    /// way.
    pub fn apply_change(&mut self, change: &TextDocumentContentChangeEvent) -> bool {
        self.edit_count += 1;

        let Some(range) = change.range else {
            self.replace_document(&change.text);
            return true;
        };
        if range.end < range.start {
            return false;
        }

        let start_line = range.start.line as usize;
        let end_line = range.end.line as usize;

        // An edit may address the line one past the end: that is how clients
        // append at end-of-file. Materialize it, but roll it back if the edit
        // then fails so failed edits leave no trace.
        let mut appended_eof_line = false;
        if end_line == self.lines.len() {
            self.lines.push(String::new());
            appended_eof_line = true;
        }
        if end_line >= self.lines.len() {
            return false;
        }

        let applied = if start_line == end_line && !change.text.contains('\n') {
            self.edit_line(
                start_line,
                range.start.character as usize,
                range.end.character as usize,
                &change.text,
            )
        } else {
            self.edit_multi_line(
                start_line,
                range.start.character as usize,
                end_line,
                range.end.character as usize,
                &change.text,
            )
        };

        if !applied && appended_eof_line {
            self.lines.pop();
        }
        applied
    }

    /// Apply a sequence of change events in order.
    pub fn apply_changes(&mut self, changes: &[TextDocumentContentChangeEvent]) {
        for change in changes {
            self.apply_change(change);
        }
    }

    /// Build the flat document content and pass it to `processor`.
    /// The view is valid only for the duration of the call.
    pub fn request_content<R>(&self, processor: impl FnOnce(&str) -> R) -> R {
        let mut flat = String::with_capacity(self.document_length);
        for line in &self.lines {
            flat.push_str(line);
        }
        processor(&flat)
    }

    /// Pass line `line` (including its trailing `\n`, if any) to `processor`.
    /// Out-of-range lines yield an empty view.
    pub fn request_line<R>(&self, line: usize, processor: impl FnOnce(&str) -> R) -> R {
        match self.lines.get(line) {
            Some(content) => processor(content),
            None => processor(""),
        }
    }

    /// Number of lines in the document.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Document length in bytes.
    pub fn document_length(&self) -> usize {
        self.document_length
    }

    /// Change events applied since creation; an ever-increasing version of
    /// sorts, advanced by failed edits too.
    pub fn edit_count(&self) -> u64 {
        self.edit_count
    }

    /// Store-wide version of the last change that touched this buffer.
    /// See [`BufferCollection::global_version`].
    pub fn last_change_version(&self) -> u64 {
        self.last_change_version
    }

    /// Split `content` into owned lines, each ending in `\n` except a final
    /// newline-less one. `""` produces no lines; `\r` is an ordinary byte.
    fn generate_lines(content: &str) -> Vec<String> {
        if content.is_empty() {
            return Vec::new();
        }
        let mut lines: Vec<String> = content
            .split('\n')
            .map(|piece| {
                let mut line = String::with_capacity(piece.len() + 1);
                line.push_str(piece);
                line.push('\n');
                line
            })
            .collect();
        if content.ends_with('\n') {
            lines.pop();
        } else if let Some(last) = lines.last_mut() {
            last.pop();
        }
        lines
    }

    fn replace_document(&mut self, content: &str) {
        self.document_length = content.len();
        self.lines = Self::generate_lines(content);
    }

    /// Edit within a single line; the replacement text has no `\n`.
    fn edit_line(&mut self, line_idx: usize, start: usize, end: usize, text: &str) -> bool {
        let Some(line) = self.lines.get_mut(line_idx) else {
            return false;
        };

        // Positions address the line content; the trailing '\n' is not
        // editable through a single-line change.
        let effective_len = line.len() - usize::from(line.ends_with('\n'));
        if start > effective_len {
            return false;
        }
        let end = end.min(effective_len);
        if end < start {
            return false;
        }

        let start = snap_to_char_boundary(line, start);
        let end = snap_to_char_boundary(line, end);
        self.document_length -= line.len();
        line.replace_range(start..end, text);
        self.document_length += line.len();
        true
    }

    /// Edit spanning lines (or inserting new ones): keep the prefix of the
    /// start line and the suffix of the end line, re-segment the middle.
    fn edit_multi_line(
        &mut self,
        start_line: usize,
        start_char: usize,
        end_line: usize,
        end_char: usize,
        text: &str,
    ) -> bool {
        if start_line >= self.lines.len() {
            return false;
        }

        let start_text = &self.lines[start_line];
        let before = &start_text[..snap_to_char_boundary(start_text, start_char)];
        let end_text = &self.lines[end_line];
        let behind = &end_text[snap_to_char_boundary(end_text, end_char)..];

        let mut new_content = String::with_capacity(before.len() + text.len() + behind.len());
        new_content.push_str(before);
        new_content.push_str(text);
        new_content.push_str(behind);

        let removed: usize = self.lines[start_line..=end_line]
            .iter()
            .map(String::len)
            .sum();
        self.document_length = self.document_length - removed + new_content.len();

        let regenerated = Self::generate_lines(&new_content);
        self.lines.splice(start_line..=end_line, regenerated);
        true
    }
}

/// Largest index `<= wanted` that is a valid char boundary of `s`
/// (and `<= s.len()`). Offsets come off the wire as plain integers; snapping
/// keeps a client that miscounts from tearing a UTF-8 sequence.
fn snap_to_char_boundary(s: &str, wanted: usize) -> usize {
    let mut idx = wanted.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

struct CollectionState {
    buffers: HashMap<String, EditTextBuffer>,
    /// Monotonic across all documents; bumped on open and on every applied
    /// change event, and stamped onto the touched buffer.
    global_version: u64,
}

impl CollectionState {
    fn did_open(&mut self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        if self.buffers.contains_key(&doc.uri) {
            // Re-open of an already-open document keeps the existing buffer.
            return;
        }
        tracing::debug!(uri = %doc.uri, language = %doc.language_id, "open");
        self.global_version += 1;
        let mut buffer = EditTextBuffer::new(&doc.text);
        buffer.last_change_version = self.global_version;
        self.buffers.insert(doc.uri, buffer);
    }

    fn did_change(&mut self, params: DidChangeTextDocumentParams) {
        let Some(buffer) = self.buffers.get_mut(&params.text_document.uri) else {
            return;
        };
        for change in &params.content_changes {
            self.global_version += 1;
            buffer.last_change_version = self.global_version;
            if !buffer.apply_change(change) {
                tracing::warn!(
                    uri = %params.text_document.uri,
                    ?change.range,
                    "edit outside document bounds ignored"
                );
            }
        }
    }

    fn did_close(&mut self, params: DidCloseTextDocumentParams) {
        if self.buffers.remove(&params.text_document.uri).is_some() {
            tracing::debug!(uri = %params.text_document.uri, "close");
        }
    }
}

/// All open documents, keyed by URI.
///
/// Constructing a collection registers notification handlers for
/// `textDocument/didOpen`, `didChange`, `didClose` and `didSave` (a no-op) on
/// the dispatcher, so dispatching those messages mutates the collection
/// directly. The handle is cheaply cloneable; all clones see the same store.
#[derive(Clone)]
pub struct BufferCollection {
    state: Rc<RefCell<CollectionState>>,
}

impl BufferCollection {
    /// Create the collection and subscribe to document events on `dispatcher`.
    pub fn new(dispatcher: &mut JsonRpcDispatcher) -> Self {
        let state = Rc::new(RefCell::new(CollectionState {
            buffers: HashMap::new(),
            global_version: 0,
        }));

        let opened = Rc::clone(&state);
        dispatcher.add_notification_handler("textDocument/didOpen", move |params: &Value| {
            let params: DidOpenTextDocumentParams = serde_json::from_value(params.clone())?;
            opened.borrow_mut().did_open(params);
            Ok(())
        });

        let changed = Rc::clone(&state);
        dispatcher.add_notification_handler("textDocument/didChange", move |params: &Value| {
            let params: DidChangeTextDocumentParams = serde_json::from_value(params.clone())?;
            changed.borrow_mut().did_change(params);
            Ok(())
        });

        let closed = Rc::clone(&state);
        dispatcher.add_notification_handler("textDocument/didClose", move |params: &Value| {
            let params: DidCloseTextDocumentParams = serde_json::from_value(params.clone())?;
            closed.borrow_mut().did_close(params);
            Ok(())
        });

        dispatcher.add_notification_handler("textDocument/didSave", move |params: &Value| {
            // Saving changes nothing in the mirror; validate the params shape.
            let _params: DidSaveTextDocumentParams = serde_json::from_value(params.clone())?;
            Ok(())
        });

        Self { state }
    }

    /// Look up the buffer for `uri` and pass it to `f`.
    /// Returns `None` when the document is not open.
    pub fn with_buffer<R>(&self, uri: &str, f: impl FnOnce(&EditTextBuffer) -> R) -> Option<R> {
        let state = self.state.borrow();
        state.buffers.get(uri).map(f)
    }

    /// Visit every buffer whose version stamp exceeds `version`, in no
    /// particular order.
    pub fn map_changed_since(&self, version: u64, mut f: impl FnMut(&str, &EditTextBuffer)) {
        let state = self.state.borrow();
        for (uri, buffer) in &state.buffers {
            if buffer.last_change_version > version {
                f(uri, buffer);
            }
        }
    }

    /// Store-wide monotonic change counter. An idle scan that remembers the
    /// value it last saw can cheaply tell whether any document changed since.
    pub fn global_version(&self) -> u64 {
        self.state.borrow().global_version
    }

    /// Number of currently open documents.
    pub fn open_count(&self) -> usize {
        self.state.borrow().buffers.len()
    }
}
