//! Newline framing for JSON-RPC over pipes.

use std::cmp;

use bytes::{Buf, BufMut, BytesMut};
use mcplink_protocol::MAX_MESSAGE_SIZE;
use mcplink_transport_traits::TransportError;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// Splits a byte stream into lines and writes lines with a trailing `\n`.
///
/// Unlike `LinesCodec`, decoding never fails on content: invalid UTF-8 is
/// replaced, blank lines are skipped, a trailing `\r` is dropped, and a
/// line longer than the limit is discarded up to its newline. Only I/O
/// errors end the stream. A final line without a newline is still yielded
/// at EOF.
#[derive(Debug, Clone)]
pub struct JsonLineCodec {
    max_length: usize,
    next_index: usize,
    discarding: bool,
}

impl JsonLineCodec {
    /// Codec with the default message limit
    pub fn new() -> Self {
        Self::with_max_length(MAX_MESSAGE_SIZE)
    }

    /// Codec dropping lines longer than `max_length` bytes
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }

    /// Configured line limit
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for JsonLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn to_frame(line: &[u8]) -> Option<String> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl Decoder for JsonLineCodec {
    type Item = String;
    type Error = TransportError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, TransportError> {
        loop {
            let read_to = cmp::min(self.max_length.saturating_add(1), buf.len());
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    buf.advance(self.next_index + offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = buf.split_to(end + 1);
                    if let Some(frame) = to_frame(&line[..end]) {
                        return Ok(Some(frame));
                    }
                }
                (false, None) if buf.len() > self.max_length => {
                    warn!(
                        max_length = self.max_length,
                        "Discarding inbound line longer than the message limit"
                    );
                    self.discarding = true;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, TransportError> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        self.next_index = 0;
        if self.discarding {
            self.discarding = false;
            buf.clear();
            return Ok(None);
        }
        let rest = buf.split_to(buf.len());
        Ok(to_frame(&rest))
    }
}

impl Encoder<String> for JsonLineCodec {
    type Error = TransportError;

    fn encode(&mut self, line: String, buf: &mut BytesMut) -> Result<(), TransportError> {
        if line.contains('\n') || line.contains('\r') {
            return Err(TransportError::SendFailed(
                "message contains an embedded newline".to_string(),
            ));
        }
        if line.len() > self.max_length {
            return Err(TransportError::SendFailed(format!(
                "message of {} bytes exceeds the {} byte limit",
                line.len(),
                self.max_length
            )));
        }
        buf.reserve(line.len() + 1);
        buf.put(line.as_bytes());
        buf.put_u8(b'\n');
        Ok(())
    }
}
