//! Content-Length frame recovery from an arbitrarily chunked byte stream.
//!
//! Messages arrive as a header block (`\r\n`-separated lines, terminated by an
//! empty line) followed by exactly `Content-Length` bytes of body. The
//! splitter does not read from a source itself; each
//! [`pull_from`](MessageStreamSplitter::pull_from) is handed a read function,
//! which lets the same code run against a file descriptor inside an event
//! loop or against a canned byte sequence in tests.

use crate::error::SessionError;

const END_HEADER_MARKER: &[u8] = b"\r\n\r\n";
const CONTENT_LENGTH_HEADER: &[u8] = b"Content-Length: ";

/// Bytes of context included in a [`SessionError::MalformedHeader`].
const HEADER_ERROR_CONTEXT_BYTES: usize = 256;

/// Receives each complete message as `(header, body)` byte views.
/// The views point into the splitter's read buffer and are only valid for the
/// duration of the call.
pub type MessageProcessor = Box<dyn FnMut(&[u8], &[u8])>;

/// Outcome of scanning buffered data for the next frame header.
enum HeaderScan {
    /// No `\r\n\r\n` yet; more data needed.
    Incomplete,
    /// Header block complete but `Content-Length` missing or unparsable.
    Invalid,
    /// Header parsed: body starts at `body_offset` and is `body_len` bytes.
    Complete { body_offset: usize, body_len: usize },
}

/// Splits `Content-Length`-framed messages out of a byte stream.
///
/// One [`pull_from`](Self::pull_from) performs exactly one read, then emits
/// every complete message the accumulated buffer contains. Partial data is
/// retained for the next pull. The read buffer has fixed capacity and must
/// exceed the largest expected frame.
pub struct MessageStreamSplitter {
    buffer: Box<[u8]>,
    /// Bytes of an incomplete frame carried over at `buffer[..pending_len]`.
    pending_len: usize,
    processor: Option<MessageProcessor>,
    stats_largest_body: usize,
    stats_total_bytes_read: u64,
}

impl MessageStreamSplitter {
    /// Create a splitter with a read buffer of `read_buffer_size` bytes.
    pub fn new(read_buffer_size: usize) -> Self {
        Self {
            buffer: vec![0u8; read_buffer_size].into_boxed_slice(),
            pending_len: 0,
            processor: None,
            stats_largest_body: 0,
            stats_total_bytes_read: 0,
        }
    }

    /// Register the function that receives extracted messages.
    /// Must be called before the first [`pull_from`](Self::pull_from).
    pub fn set_message_processor(&mut self, processor: impl FnMut(&[u8], &[u8]) + 'static) {
        self.processor = Some(Box::new(processor));
    }

    /// Call `read_fun` exactly once, then run the message processor for each
    /// complete message now available. Incomplete tail data is retained for
    /// the next pull.
    ///
    /// The once-per-pull read is what allows hooking this into a readiness
    /// event loop: one readable event, one pull.
    ///
    /// Errors:
    /// - [`SessionError::ProcessorMissing`]: no processor registered.
    /// - [`SessionError::StreamClosed`]: EOF on a frame boundary.
    /// - [`SessionError::TruncatedFrame`]: EOF with partial frame data.
    /// - [`SessionError::MalformedHeader`]: header without parsable length.
    /// - [`SessionError::Read`]: the read function failed.
    pub fn pull_from<R>(&mut self, read_fun: &mut R) -> Result<(), SessionError>
    where
        R: FnMut(&mut [u8]) -> std::io::Result<usize> + ?Sized,
    {
        if self.processor.is_none() {
            return Err(SessionError::ProcessorMissing);
        }

        let bytes_read = read_fun(&mut self.buffer[self.pending_len..])?;
        if bytes_read == 0 {
            return Err(if self.pending_len == 0 {
                SessionError::StreamClosed
            } else {
                SessionError::TruncatedFrame {
                    pending_bytes: self.pending_len,
                }
            });
        }
        self.stats_total_bytes_read += bytes_read as u64;

        let filled = self.pending_len + bytes_read;
        let consumed = self.process_contained_messages(filled)?;

        // Leftover moves to the buffer front; next pull reads behind it.
        self.buffer.copy_within(consumed..filled, 0);
        self.pending_len = filled - consumed;

        Ok(())
    }

    /// Largest message body seen so far, in bytes.
    pub fn largest_body_seen(&self) -> usize {
        self.stats_largest_body
    }

    /// Total bytes the read function has delivered.
    pub fn total_bytes_read(&self) -> u64 {
        self.stats_total_bytes_read
    }

    /// Emit every complete message in `buffer[..filled]`.
    /// Returns the number of bytes consumed.
    fn process_contained_messages(&mut self, filled: usize) -> Result<usize, SessionError> {
        let Self {
            buffer,
            processor,
            stats_largest_body,
            ..
        } = self;
        let Some(processor) = processor.as_mut() else {
            return Ok(0);
        };

        let mut consumed = 0;
        while consumed < filled {
            let data = &buffer[consumed..filled];
            match scan_header(data) {
                HeaderScan::Incomplete => break,
                HeaderScan::Invalid => {
                    let context_len = data.len().min(HEADER_ERROR_CONTEXT_BYTES);
                    return Err(SessionError::MalformedHeader {
                        context: String::from_utf8_lossy(&data[..context_len]).into_owned(),
                    });
                }
                HeaderScan::Complete {
                    body_offset,
                    body_len,
                } => {
                    let message_len = body_offset + body_len;
                    if message_len > data.len() {
                        break; // body not fully buffered yet
                    }
                    processor(&data[..body_offset], &data[body_offset..message_len]);
                    *stats_largest_body = (*stats_largest_body).max(body_len);
                    consumed += message_len;
                }
            }
        }
        Ok(consumed)
    }
}

/// Locate the end of the header block and extract the body length.
///
/// `Content-Length: ` is matched as a plain substring anywhere in the header
/// block, not anchored to a line start. That matches what clients actually
/// send and keeps the scan a single pass.
fn scan_header(data: &[u8]) -> HeaderScan {
    let Some(end_of_header) = find(data, END_HEADER_MARKER) else {
        return HeaderScan::Incomplete;
    };

    let header = &data[..end_of_header];
    let Some(key_pos) = find(header, CONTENT_LENGTH_HEADER) else {
        return HeaderScan::Invalid;
    };

    let value = &header[key_pos + CONTENT_LENGTH_HEADER.len()..];
    let digits = value.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return HeaderScan::Invalid;
    }
    let mut body_len = 0usize;
    for &b in &value[..digits] {
        let Some(next) = body_len
            .checked_mul(10)
            .and_then(|n| n.checked_add((b - b'0') as usize))
        else {
            return HeaderScan::Invalid;
        };
        body_len = next;
    }

    HeaderScan::Complete {
        body_offset: end_of_header + END_HEADER_MARKER.len(),
        body_len,
    }
}

/// First occurrence of `needle` in `haystack`.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
