use docqa_error::{DocqaError, Result};
use futures::StreamExt;

use crate::TextStream;

/// Incremental parser for `text/event-stream` bodies. Network reads can cut
/// an event anywhere, so bytes are buffered until a blank line terminates the
/// event, then the `data:` lines are handed back joined with `\n`.
#[derive(Debug, Default)]
pub struct SseParser {
    buf: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning the data payload of every event completed by
    /// this read. Invalid UTF-8 at a chunk boundary is not expected from the
    /// providers we talk to; lossy decoding keeps the stream alive regardless.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.push_str(&String::from_utf8_lossy(bytes));

        let mut events = Vec::new();
        loop {
            let Some((boundary, sep_len)) = find_event_boundary(&self.buf) else {
                break;
            };
            let raw_event: String = self.buf.drain(..boundary + sep_len).collect();
            if let Some(data) = parse_event_data(&raw_event[..boundary]) {
                events.push(data);
            }
        }
        events
    }
}

fn find_event_boundary(buf: &str) -> Option<(usize, usize)> {
    let lf = buf.find("\n\n").map(|i| (i, 2));
    let crlf = buf.find("\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 < b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn parse_event_data(event: &str) -> Option<String> {
    let mut data_lines = Vec::new();
    for line in event.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

/// Turn a streamed SSE response body into a stream of text deltas. `decode`
/// maps one event payload to a delta; `Ok(None)` skips bookkeeping frames
/// such as `[DONE]` or empty candidates.
pub fn text_delta_stream<F>(
    resp: reqwest::Response,
    provider: &'static str,
    mut decode: F,
) -> TextStream
where
    F: FnMut(&str) -> Result<Option<String>> + Send + 'static,
{
    let mut parser = SseParser::new();
    resp.bytes_stream()
        .flat_map(move |chunk| {
            let items: Vec<Result<String>> = match chunk {
                Ok(bytes) => parser
                    .push(&bytes)
                    .into_iter()
                    .filter_map(|data| match decode(&data) {
                        Ok(Some(text)) => Some(Ok(text)),
                        Ok(None) => None,
                        Err(e) => Some(Err(e)),
                    })
                    .collect(),
                Err(e) => vec![Err(DocqaError::Network {
                    operation: format!("{}_stream_read", provider),
                    message: e.to_string(),
                })],
            };
            futures::stream::iter(items)
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: {\"text\":\"hi\"}\n\n");
        assert_eq!(events, vec![r#"{"text":"hi"}"#]);
    }

    #[test]
    fn test_event_split_across_reads() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: {\"te").is_empty());
        assert!(parser.push(b"xt\":\"hi\"}").is_empty());
        let events = parser.push(b"\n\n");
        assert_eq!(events, vec![r#"{"text":"hi"}"#]);
    }

    #[test]
    fn test_multiple_events_in_one_read() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: one\n\ndata: two\n\ndata: thr");
        assert_eq!(events, vec!["one", "two"]);
        assert_eq!(parser.push(b"ee\n\n"), vec!["three"]);
    }

    #[test]
    fn test_crlf_framing() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: one\r\n\r\ndata: two\r\n\r\n");
        assert_eq!(events, vec!["one", "two"]);
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: line1\ndata: line2\n\n");
        assert_eq!(events, vec!["line1\nline2"]);
    }

    #[test]
    fn test_comment_and_event_fields_ignored() {
        let mut parser = SseParser::new();
        let events = parser.push(b": keep-alive\n\nevent: message\ndata: payload\n\n");
        assert_eq!(events, vec!["payload"]);
    }
}
