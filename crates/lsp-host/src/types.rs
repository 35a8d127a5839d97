//! Wire-level LSP structures the host core needs.
//!
//! Only the document-synchronization subset lives here; request/response
//! payloads of individual LSP methods stay `serde_json::Value` and are decoded
//! by whoever registered the handler.

use serde::{Deserialize, Serialize};

/// A position inside a document: zero-based line and in-line offset.
///
/// Offsets are taken as the client sends them (byte-oriented, consistent with
/// the rest of this crate); no UTF-16 transcoding is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Line number (0-based).
    pub line: u32,
    /// Offset within the line (0-based).
    pub character: u32,
}

impl Position {
    /// Create a new position.
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A range between two positions, `start <= end`, end-exclusive.
/// Empty ranges are valid and denote an insertion point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    /// Range start (inclusive).
    pub start: Position,
    /// Range end (exclusive).
    pub end: Position,
}

impl Range {
    /// Create a new range.
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// One entry of `contentChanges` in `textDocument/didChange`.
///
/// Without a range this replaces the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TextDocumentContentChangeEvent {
    /// Changed range; `None` means whole-document replacement.
    #[serde(default)]
    pub range: Option<Range>,
    /// Replacement text (may span any number of lines).
    pub text: String,
}

impl TextDocumentContentChangeEvent {
    /// Whole-document replacement carrying `text`.
    pub fn full(text: impl Into<String>) -> Self {
        Self {
            range: None,
            text: text.into(),
        }
    }

    /// Ranged edit replacing `range` with `text`.
    pub fn ranged(range: Range, text: impl Into<String>) -> Self {
        Self {
            range: Some(range),
            text: text.into(),
        }
    }
}

/// `textDocument` member of `didOpen`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentItem {
    /// Document URI (opaque to the host).
    pub uri: String,
    /// Language identifier, e.g. `"rust"`.
    #[serde(default)]
    pub language_id: String,
    /// Client-side version number.
    #[serde(default)]
    pub version: i32,
    /// Full initial content.
    pub text: String,
}

/// Bare document reference used by `didClose` / `didSave`.
#[derive(Debug, Clone, Deserialize)]
pub struct TextDocumentIdentifier {
    /// Document URI.
    pub uri: String,
}

/// Document reference plus version, used by `didChange`.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionedTextDocumentIdentifier {
    /// Document URI.
    pub uri: String,
    /// Client-side version number after the change.
    #[serde(default)]
    pub version: i32,
}

/// Params of `textDocument/didOpen`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidOpenTextDocumentParams {
    /// The document being opened.
    pub text_document: TextDocumentItem,
}

/// Params of `textDocument/didClose`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidCloseTextDocumentParams {
    /// The document being closed.
    pub text_document: TextDocumentIdentifier,
}

/// Params of `textDocument/didChange`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidChangeTextDocumentParams {
    /// The document being changed.
    pub text_document: VersionedTextDocumentIdentifier,
    /// Edits to apply, in order.
    pub content_changes: Vec<TextDocumentContentChangeEvent>,
}

/// Params of `textDocument/didSave`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidSaveTextDocumentParams {
    /// The document that was saved.
    pub text_document: TextDocumentIdentifier,
    /// Full content, if the client includes it.
    #[serde(default)]
    pub text: Option<String>,
}

/// One diagnostic to publish to the client.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    /// Source range the diagnostic applies to.
    pub range: Range,
    /// LSP severity (1 = error .. 4 = hint).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<i32>,
    /// Human-readable producer name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Message shown to the user.
    pub message: String,
}

/// Params of an outbound `textDocument/publishDiagnostics`.
#[derive(Debug, Clone, Serialize)]
pub struct PublishDiagnosticsParams {
    /// Document the diagnostics belong to.
    pub uri: String,
    /// Current full set; an empty list clears earlier findings.
    pub diagnostics: Vec<Diagnostic>,
}
