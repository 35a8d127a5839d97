//! Idle-time diagnostics: lint changed documents and publish the findings.
//!
//! The event loop calls [`DiagnosticsPublisher::publish_pending`] whenever the
//! input stream goes quiet. The publisher remembers the store version it last
//! scanned, so a quiet period with no edits costs one counter comparison and
//! nothing else.

use lsp_host::{BufferCollection, Diagnostic, EditTextBuffer, JsonRpcDispatcher, Position, Range};
use serde_json::json;

/// Walks the buffer store on idle and publishes diagnostics for every
/// document changed since the previous scan.
pub struct DiagnosticsPublisher {
    last_scanned_version: u64,
}

impl DiagnosticsPublisher {
    pub fn new() -> Self {
        Self {
            last_scanned_version: 0,
        }
    }

    /// Lint every document changed since the last scan and publish one
    /// `textDocument/publishDiagnostics` per document (an empty list when a
    /// previously flagged document came clean). Returns the number of
    /// documents published.
    pub fn publish_pending(
        &mut self,
        buffers: &BufferCollection,
        dispatcher: &mut JsonRpcDispatcher,
    ) -> usize {
        let current = buffers.global_version();
        if current == self.last_scanned_version {
            return 0;
        }

        let mut published = 0;
        buffers.map_changed_since(self.last_scanned_version, |uri, buffer| {
            let diagnostics = lint_buffer(buffer);
            tracing::debug!(uri, findings = diagnostics.len(), "publishing diagnostics");
            dispatcher.send_notification(
                "textDocument/publishDiagnostics",
                json!({ "uri": uri, "diagnostics": diagnostics }),
            );
            published += 1;
        });

        self.last_scanned_version = current;
        published
    }
}

/// Flag trailing whitespace on every line.
pub fn lint_buffer(buffer: &EditTextBuffer) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for line_idx in 0..buffer.line_count() {
        buffer.request_line(line_idx, |line| {
            let content = line.strip_suffix('\n').unwrap_or(line);
            let content = content.strip_suffix('\r').unwrap_or(content);
            let kept = content.trim_end_matches([' ', '\t']).len();
            if kept < content.len() {
                diagnostics.push(Diagnostic {
                    range: Range::new(
                        Position::new(line_idx as u32, kept as u32),
                        Position::new(line_idx as u32, content.len() as u32),
                    ),
                    severity: Some(2), // LSP warning
                    source: Some("lsp-host".to_string()),
                    message: "trailing whitespace".to_string(),
                });
            }
        });
    }
    diagnostics
}
