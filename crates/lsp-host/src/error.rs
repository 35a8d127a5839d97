use thiserror::Error;

/// Terminal conditions of a framed-message session.
///
/// Everything here ends the session: the splitter either ran out of input or
/// the input can no longer be trusted. Recoverable problems (bad JSON, unknown
/// methods) never surface here; the dispatcher answers those on the wire and
/// keeps going.
#[derive(Debug, Error)]
pub enum SessionError {
    /// [`pull_from`](crate::MessageStreamSplitter::pull_from) was called
    /// before a message processor was registered.
    #[error("message processor not set before pulling from the stream")]
    ProcessorMissing,

    /// Clean end of stream: EOF on a frame boundary. The expected way for a
    /// session to end when the client just closes the pipe.
    #[error("end of stream")]
    StreamClosed,

    /// EOF in the middle of a frame; `pending_bytes` of an incomplete message
    /// were still buffered.
    #[error("stream ended with {pending_bytes} bytes of an incomplete frame")]
    TruncatedFrame {
        /// Bytes of partial frame data lost at EOF.
        pending_bytes: usize,
    },

    /// A complete header block arrived without a parsable `Content-Length:`.
    /// Framing can not be re-synchronized after this.
    #[error("no parsable `Content-Length:` header in '{context}...'")]
    MalformedHeader {
        /// Up to 256 bytes of the offending data, lossily decoded.
        context: String,
    },

    /// The read function reported an error.
    #[error("read error: {0}")]
    Read(#[from] std::io::Error),
}

impl SessionError {
    /// `true` for the one non-failure way a session ends.
    pub fn is_clean_eof(&self) -> bool {
        matches!(self, SessionError::StreamClosed)
    }
}
