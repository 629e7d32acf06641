//! Newline-delimited codec for the text transport
//!
//! Every frame is a single UTF-8 line terminated by `\n`:
//! ```text
//! relay:3:on id:wolhub-01\n
//! {"type":"heartbeat",...}\n
//! ```
//!
//! This ensures frame boundaries are preserved over TCP streams.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// Maximum line length (64 KB) to prevent memory exhaustion
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Errors that can occur during framing
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Line too long: {0} bytes (max: {MAX_LINE_LEN})")]
    LineTooLong(usize),

    #[error("Frame is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Encode a single frame, appending the line terminator
pub fn encode(line: &str) -> Result<Bytes, CodecError> {
    if line.len() > MAX_LINE_LEN {
        return Err(CodecError::LineTooLong(line.len()));
    }

    let mut buf = BytesMut::with_capacity(line.len() + 1);
    buf.extend_from_slice(line.as_bytes());
    buf.extend_from_slice(b"\n");
    Ok(buf.freeze())
}

/// Decoder state machine for streaming line extraction
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Partial frame data being accumulated
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Create a new frame decoder
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next line from the buffer
    ///
    /// Returns:
    /// - `Ok(Some(line))` if a complete line was decoded (terminator stripped)
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` if the buffered data is invalid
    ///
    /// Call repeatedly until it returns `Ok(None)` to drain all complete frames.
    pub fn decode_next(&mut self) -> Result<Option<String>, CodecError> {
        let pos = match self.buffer.iter().position(|&b| b == b'\n') {
            Some(pos) => pos,
            None => {
                if self.buffer.len() > MAX_LINE_LEN {
                    return Err(CodecError::LineTooLong(self.buffer.len()));
                }
                return Ok(None);
            }
        };

        let mut line = self.buffer.split_to(pos + 1);
        line.truncate(pos); // drop the '\n'
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }

        let text = std::str::from_utf8(&line)?.to_owned();
        Ok(Some(text))
    }
}
