use crate::{ChatCompletionChunk, CompletionError};
use bytes::Bytes;
use futures_util::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// End-of-stream marker sent as the payload of the last `data:` event
pub const DONE_SENTINEL: &str = "[DONE]";

/// Represents a single SSE event with both the raw payload and parsed content
#[derive(Debug, Clone)]
pub struct SSEEvent {
    /// The JSON payload exactly as it followed `data: ` on the wire
    pub data: String,
    /// The parsed chunk
    pub chunk: ChatCompletionChunk,
}

/// Splits a byte stream into text lines.
///
/// Bytes are buffered until a `\n` arrives so that multi-byte UTF-8
/// sequences split across network reads are decoded whole. A trailing `\r`
/// is removed from every line.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete line, if one is buffered
    pub fn next_line(&mut self) -> Option<String> {
        let newline_pos = self.buffer.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
        Some(Self::decode(&line[..newline_pos]))
    }

    /// Whatever is left once the source is exhausted, as a final line
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(Self::decode(&rest))
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn decode(line: &[u8]) -> String {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        String::from_utf8_lossy(line).into_owned()
    }
}

/// SSE (Server-Sent Events) stream parser that properly handles buffering
/// of incomplete events across HTTP chunks
pub struct SSEParser<S> {
    inner: S,
    lines: LineBuffer,
    pending: VecDeque<Result<SSEEvent, CompletionError>>,
    finished: bool,
}

impl<S, E> SSEParser<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<CompletionError>,
{
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            lines: LineBuffer::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn parse_sse_event(data: &str) -> Result<SSEEvent, CompletionError> {
        let json = serde_json::from_str::<serde_json::Value>(data).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse SSE JSON from provider");
            CompletionError::InvalidResponse(format!("Invalid JSON in SSE event: {e}"))
        })?;

        // Shape mismatches degrade to an empty chunk; the payload is still forwarded.
        let chunk = serde_json::from_value::<ChatCompletionChunk>(json).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "SSE event does not look like a chat chunk");
            ChatCompletionChunk::default()
        });

        Ok(SSEEvent {
            data: data.to_string(),
            chunk,
        })
    }

    fn process_line(&mut self, line: &str) {
        // Skip empty lines, comments and non-data fields
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.strip_prefix(' ').unwrap_or(data);

        if data == DONE_SENTINEL {
            self.finished = true;
            self.lines.clear();
            return;
        }

        self.pending.push_back(Self::parse_sse_event(data));
    }

    fn process_buffer(&mut self, at_end: bool) {
        while !self.finished {
            match self.lines.next_line() {
                Some(line) => self.process_line(&line),
                None => break,
            }
        }

        if at_end && !self.finished {
            if let Some(line) = self.lines.finish() {
                if !line.trim().is_empty() {
                    tracing::warn!("Incomplete SSE line in buffer at stream end");
                }
                self.process_line(&line);
            }
        }
    }
}

impl<S, E> Stream for SSEParser<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<CompletionError>,
{
    type Item = Result<SSEEvent, CompletionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(result) = self.pending.pop_front() {
                return Poll::Ready(Some(result));
            }
            if self.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.lines.push(&bytes);
                    self.process_buffer(false);
                }
                Poll::Ready(Some(Err(e))) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(e.into())));
                }
                Poll::Ready(None) => {
                    self.process_buffer(true);
                    self.finished = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{stream, StreamExt};

    fn byte_stream(
        parts: Vec<&'static str>,
    ) -> impl Stream<Item = Result<Bytes, CompletionError>> + Unpin {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from(p))))
    }

    async fn collect(parts: Vec<&'static str>) -> Vec<Result<SSEEvent, CompletionError>> {
        SSEParser::new(byte_stream(parts)).collect().await
    }

    #[test]
    fn test_line_buffer_handles_split_utf8() {
        let mut lines = LineBuffer::new();
        let glyph = "█".as_bytes();
        lines.push(&glyph[..1]);
        assert_eq!(lines.next_line(), None);
        lines.push(&glyph[1..]);
        lines.push(b"\r\nrest");

        assert_eq!(lines.next_line().as_deref(), Some("█"));
        assert_eq!(lines.next_line(), None);
        assert_eq!(lines.finish().as_deref(), Some("rest"));
        assert_eq!(lines.finish(), None);
    }

    #[tokio::test]
    async fn test_events_split_across_reads() {
        let events = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"He",
            "l\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;

        let contents: Vec<_> = events
            .iter()
            .map(|e| e.as_ref().unwrap().chunk.delta_content().unwrap().to_string())
            .collect();
        assert_eq!(contents, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_multiple_events_in_one_read_are_all_returned() {
        let events = collect(vec![
            "data: {\"id\":\"a\"}\n\ndata: {\"id\":\"b\"}\n\ndata: {\"id\":\"c\"}\n\n",
        ])
        .await;

        assert_eq!(events.len(), 3);
        assert_eq!(events[2].as_ref().unwrap().data, "{\"id\":\"c\"}");
    }

    #[tokio::test]
    async fn test_nothing_after_done_is_emitted() {
        let events = collect(vec!["data: {\"id\":\"a\"}\n\ndata: [DONE]\n\ndata: {\"id\":\"b\"}\n\n"]).await;

        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_json_yields_error_and_continues() {
        let events = collect(vec!["data: {bad\n\ndata: {\"id\":\"ok\"}\n\n"]).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Err(CompletionError::InvalidResponse(_))));
        assert_eq!(events[1].as_ref().unwrap().chunk.id.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_comments_and_other_fields_are_skipped() {
        let events = collect(vec![": keep-alive\n\nevent: message\ndata: {\"id\":\"x\"}\n\n"]).await;

        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline_is_parsed() {
        let events = collect(vec!["data: {\"id\":\"tail\"}"]).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap().data, "{\"id\":\"tail\"}");
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let source = stream::iter(vec![
            Ok(Bytes::from("data: {\"id\":\"a\"}\n\n")),
            Err(CompletionError::CompletionError("connection reset".to_string())),
            Ok(Bytes::from("data: {\"id\":\"b\"}\n\n")),
        ]);
        let events: Vec<_> = SSEParser::new(source).collect().await;

        assert_eq!(events.len(), 2);
        assert!(events[1].is_err());
    }
}
