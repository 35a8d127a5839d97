//! Boundary adapters between the dispatcher and a raw byte transport.
//!
//! The dispatcher emits bare message bodies; [`write_framed`] wraps each one
//! into the `Content-Length` framing the wire requires. [`fd_reader`] is the
//! matching input adapter: an unbuffered `read(2)` over a raw descriptor, so
//! the event loop's readiness report and the splitter's reads never drift
//! apart the way a userspace-buffered reader would let them.

use std::io::{self, Write};

/// Write one message as a `Content-Length`-framed chunk and flush.
pub fn write_framed(writer: &mut impl Write, body: &str) -> io::Result<()> {
    write!(writer, "Content-Length: {}\r\n\r\n", body.len())?;
    writer.write_all(body.as_bytes())?;
    writer.flush()
}

/// A read function over a raw fd with `read(2)` semantics, suitable for
/// [`MessageStreamSplitter::pull_from`](crate::MessageStreamSplitter::pull_from).
#[cfg(unix)]
pub fn fd_reader(fd: std::os::fd::RawFd) -> impl FnMut(&mut [u8]) -> io::Result<usize> {
    move |buf: &mut [u8]| {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }
}
