//! Server-Sent Events decoding.
//!
//! Events are blocks of `field: value` lines ended by a blank line:
//!
//! ```text
//! event: endpoint
//! data: /messages?session_id=42
//!
//! ```
//!
//! [`SseDecoder`] is a `tokio_util` decoder, so it runs under `FramedRead`
//! over any byte stream and copes with events split across reads.

use bytes::{Buf, BytesMut};
use mcplink_protocol::MAX_MESSAGE_SIZE;
use mcplink_transport_traits::TransportError;
use tokio_util::codec::Decoder;

/// One dispatched event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// `id` field, if any
    pub id: Option<String>,
    /// `event` field; `None` means the default `message` type
    pub event: Option<String>,
    /// `data` lines joined with `\n`
    pub data: String,
    /// `retry` field in milliseconds
    pub retry: Option<u64>,
}

impl SseEvent {
    /// Event type with the `message` default applied
    pub fn kind(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// Incremental SSE decoder.
#[derive(Debug)]
pub struct SseDecoder {
    max_line: usize,
    scanned: usize,
    id: Option<String>,
    event: Option<String>,
    data: Vec<String>,
    retry: Option<u64>,
}

impl SseDecoder {
    /// Decoder with the default line limit
    pub fn new() -> Self {
        Self {
            max_line: MAX_MESSAGE_SIZE,
            scanned: 0,
            id: None,
            event: None,
            data: Vec::new(),
            retry: None,
        }
    }

    fn field(&mut self, line: &str) {
        // Lines starting with ':' are comments (keepalives).
        if line.starts_with(':') {
            return;
        }
        let (name, value) = match line.split_once(':') {
            Some((name, value)) => (name, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match name {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse() {
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let retry = self.retry.take();
        let id = self.id.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            id,
            event,
            data: std::mem::take(&mut self.data).join("\n"),
            retry,
        })
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for SseDecoder {
    type Item = SseEvent;
    type Error = TransportError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<SseEvent>, TransportError> {
        loop {
            let Some(offset) = buf[self.scanned..].iter().position(|b| *b == b'\n') else {
                self.scanned = buf.len();
                if buf.len() > self.max_line {
                    return Err(TransportError::MalformedMessage(format!(
                        "SSE line exceeds {} bytes",
                        self.max_line
                    )));
                }
                return Ok(None);
            };
            let end = self.scanned + offset;
            self.scanned = 0;
            let raw = buf.split_to(end + 1);
            let line = raw[..end].strip_suffix(b"\r").unwrap_or(&raw[..end]);
            let line = String::from_utf8_lossy(line);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    return Ok(Some(event));
                }
            } else {
                self.field(&line);
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<SseEvent>, TransportError> {
        if let Some(event) = self.decode(buf)? {
            return Ok(Some(event));
        }
        // An event without its terminating blank line is dropped.
        buf.advance(buf.len());
        self.scanned = 0;
        self.data.clear();
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use tokio_util::codec::FramedRead;

    async fn decode_chunks(chunks: &[&[u8]]) -> Vec<SseEvent> {
        let mut mock = tokio_test::io::Builder::new();
        for chunk in chunks {
            mock.read(chunk);
        }
        FramedRead::new(mock.build(), SseDecoder::new())
            .map(|event| event.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_endpoint_then_message() {
        let events = decode_chunks(&[
            b"event: endpoint\ndata: /messages?session_id=1\n\n",
            b"event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n",
        ])
        .await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind(), "endpoint");
        assert_eq!(events[0].data, "/messages?session_id=1");
        assert_eq!(events[1].kind(), "message");
    }

    #[tokio::test]
    async fn test_event_split_mid_line_and_crlf() {
        let events = decode_chunks(&[b"id: 7\r\nda", b"ta: {\"a\":", b"1}\r\n\r\n"]).await;

        assert_eq!(
            events,
            vec![SseEvent {
                id: Some("7".into()),
                event: None,
                data: "{\"a\":1}".into(),
                retry: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_comments_multiline_data_and_retry() {
        let events =
            decode_chunks(&[b": keepalive\n\nretry: 1500\ndata: one\ndata:two\n\nevent: ping\n\n"])
                .await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "one\ntwo");
        assert_eq!(events[0].retry, Some(1500));
    }

    #[tokio::test]
    async fn test_unterminated_event_is_dropped() {
        let events = decode_chunks(&[b"data: complete\n\ndata: partial"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "complete");
    }

    #[test]
    fn test_overlong_line_is_an_error() {
        let mut decoder = SseDecoder {
            max_line: 8,
            ..SseDecoder::new()
        };
        let mut buf = BytesMut::from(&b"data: 0123456789"[..]);
        assert!(decoder.decode(&mut buf).is_err());
    }
}
