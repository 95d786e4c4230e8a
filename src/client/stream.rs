//! Decoder for the JSON Lines event stream returned by the execution endpoint.
//!
//! Each line is an object with a `type` discriminator:
//!
//! | type     | payload                       |
//! |----------|-------------------------------|
//! | `stdout` | `text`                        |
//! | `stderr` | `text`                        |
//! | `result` | the whole object              |
//! | `error`  | `name`, `value`, `traceback`  |
//!
//! Unknown types and malformed lines are skipped; they never stop decoding.

use std::fmt::Display;
use std::io::BufRead;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::client::types::{ExecuteResult, ExecutionError, StreamCallbacks};
use crate::error::{AgsError, Result};

/// One decoded event from the execution stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    Stdout(String),
    Stderr(String),
    Result(Map<String, Value>),
    Error(ExecutionError),
}

/// Decode a single line. Returns `None` for blank, malformed or unrecognised
/// lines.
pub fn decode_line(line: &[u8]) -> Option<ExecutionEvent> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let event = match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(event)) => event,
        Ok(_) => {
            debug!("Skipping non-object stream line");
            return None;
        }
        Err(e) => {
            debug!(error = %e, "Skipping malformed stream line");
            return None;
        }
    };

    match event.get("type").and_then(Value::as_str) {
        Some("stdout") => text_of(&event).map(ExecutionEvent::Stdout),
        Some("stderr") => text_of(&event).map(ExecutionEvent::Stderr),
        Some("result") => Some(ExecutionEvent::Result(event)),
        Some("error") => Some(ExecutionEvent::Error(ExecutionError {
            name: string_field(&event, "name"),
            value: string_field(&event, "value"),
            traceback: string_field(&event, "traceback"),
        })),
        other => {
            debug!(event_type = ?other, "Skipping unrecognised stream event");
            None
        }
    }
}

fn text_of(event: &Map<String, Value>) -> Option<String> {
    event.get("text").and_then(Value::as_str).map(String::from)
}

fn string_field(event: &Map<String, Value>, key: &str) -> String {
    event
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl ExecuteResult {
    /// Fold one event into the aggregate, firing the matching callback.
    pub fn record(&mut self, event: ExecutionEvent, callbacks: &mut StreamCallbacks) {
        match event {
            ExecutionEvent::Stdout(text) => {
                callbacks.stdout(&text);
                self.stdout.push(text);
            }
            ExecutionEvent::Stderr(text) => {
                callbacks.stderr(&text);
                self.stderr.push(text);
            }
            ExecutionEvent::Result(payload) => self.results.push(payload),
            // Last error event wins
            ExecutionEvent::Error(error) => self.error = Some(error),
        }
    }
}

/// Lazy, non-restartable iterator of events over a blocking reader.
///
/// Iteration ends at EOF or at the first read error.
pub struct JsonLines<R> {
    reader: R,
    line: Vec<u8>,
}

impl<R: BufRead> JsonLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for JsonLines<R> {
    type Item = ExecutionEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => return None,
                Ok(_) => {
                    if let Some(event) = decode_line(&self.line) {
                        return Some(event);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Execution stream closed with read error");
                    return None;
                }
            }
        }
    }
}

/// Decode a complete blocking reader into an aggregated result.
pub fn decode_reader<R: BufRead>(reader: R, callbacks: &mut StreamCallbacks) -> ExecuteResult {
    JsonLines::new(reader).fold(ExecuteResult::default(), |mut result, event| {
        result.record(event, callbacks);
        result
    })
}

/// Splits arbitrarily chunked bytes into newline-terminated lines.
#[derive(Debug, Default)]
struct LineBuffer {
    buf: Vec<u8>,
    /// Bytes already searched for a newline
    scanned: usize,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    fn next_line(&mut self) -> Option<Vec<u8>> {
        let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') else {
            self.scanned = self.buf.len();
            return None;
        };

        let mut line: Vec<u8> = self.buf.drain(..=self.scanned + offset).collect();
        line.pop();
        self.scanned = 0;
        Some(line)
    }

    /// Trailing bytes of a final line that had no newline.
    fn finish(self) -> Option<Vec<u8>> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.buf)
        }
    }
}

/// Decode a streaming response body into an aggregated result.
///
/// A transport error before the stream ends fails the call with
/// [`AgsError::StreamInterrupted`], which carries the output decoded so far.
/// Cancellation is handled by dropping this future.
pub async fn decode_stream<S, E>(body: S, callbacks: &mut StreamCallbacks) -> Result<ExecuteResult>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Display,
{
    futures::pin_mut!(body);

    let mut result = ExecuteResult::default();
    let mut lines = LineBuffer::default();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(
                    error = %e,
                    stdout_lines = result.stdout.len(),
                    "Execution stream interrupted by transport error"
                );
                return Err(AgsError::StreamInterrupted {
                    reason: e.to_string(),
                    partial: Box::new(result),
                });
            }
        };

        lines.push(&chunk);
        while let Some(line) = lines.next_line() {
            if let Some(event) = decode_line(&line) {
                result.record(event, callbacks);
            }
        }
    }

    if let Some(event) = lines.finish().and_then(|line| decode_line(&line)) {
        result.record(event, callbacks);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures::stream;

    use super::*;

    const SCENARIO: &str = concat!(
        "{\"type\":\"stdout\",\"text\":\"a\"}\n",
        "{\"type\":\"garbage\"\n",
        "{\"type\":\"stderr\",\"text\":\"b\"}\n",
        "{\"type\":\"error\",\"name\":\"E\",\"value\":\"boom\",\"traceback\":\"tb\"}\n",
    );

    fn expected_error() -> ExecutionError {
        ExecutionError {
            name: "E".to_string(),
            value: "boom".to_string(),
            traceback: "tb".to_string(),
        }
    }

    #[test]
    fn test_decode_line_variants() {
        assert_eq!(
            decode_line(br#"{"type":"stdout","text":"hi"}"#),
            Some(ExecutionEvent::Stdout("hi".to_string()))
        );
        assert_eq!(decode_line(b"   \r"), None);
        assert_eq!(decode_line(b"not json"), None);
        assert_eq!(decode_line(b"[1,2]"), None);
        assert_eq!(decode_line(br#"{"type":"stdout","text":42}"#), None);
        assert_eq!(decode_line(br#"{"type":"end_of_execution"}"#), None);

        match decode_line(br#"{"type":"result","text":"3","is_main_result":true}"#) {
            Some(ExecutionEvent::Result(payload)) => {
                assert_eq!(payload.get("type"), Some(&Value::from("result")));
                assert_eq!(payload.get("is_main_result"), Some(&Value::from(true)));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_error_event_missing_fields_are_empty() {
        assert_eq!(
            decode_line(br#"{"type":"error","name":"KeyError"}"#),
            Some(ExecutionEvent::Error(ExecutionError {
                name: "KeyError".to_string(),
                ..ExecutionError::default()
            }))
        );
    }

    #[test]
    fn test_malformed_line_does_not_abort_decoding() {
        let mut callbacks = StreamCallbacks::new();
        let result = decode_reader(SCENARIO.as_bytes(), &mut callbacks);

        assert_eq!(result.stdout, vec!["a"]);
        assert_eq!(result.stderr, vec!["b"]);
        assert!(result.results.is_empty());
        assert_eq!(result.error, Some(expected_error()));
    }

    #[test]
    fn test_output_after_error_is_still_collected() {
        let input = concat!(
            "{\"type\":\"error\",\"name\":\"First\",\"value\":\"1\"}\n",
            "{\"type\":\"stdout\",\"text\":\"after\"}\n",
            "{\"type\":\"result\",\"data\":1}\n",
            "{\"type\":\"result\",\"data\":2}\n",
            "{\"type\":\"error\",\"name\":\"Second\",\"value\":\"2\"}",
        );
        let result = decode_reader(input.as_bytes(), &mut StreamCallbacks::new());

        assert_eq!(result.stdout, vec!["after"]);
        assert_eq!(result.results.len(), 2);
        assert_eq!(result.results[0].get("data"), Some(&Value::from(1)));
        assert_eq!(result.results[1].get("data"), Some(&Value::from(2)));
        assert_eq!(result.error.map(|e| e.name), Some("Second".to_string()));
    }

    #[test]
    fn test_callbacks_fire_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let out = Arc::clone(&seen);
        let err = Arc::clone(&seen);
        let mut callbacks = StreamCallbacks::new()
            .on_stdout(move |text| out.lock().unwrap().push(format!("out:{}", text)))
            .on_stderr(move |text| err.lock().unwrap().push(format!("err:{}", text)));

        decode_reader(SCENARIO.as_bytes(), &mut callbacks);

        assert_eq!(*seen.lock().unwrap(), vec!["out:a", "err:b"]);
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let mut input = b"{\"type\":\"stdout\",\"text\":\"x\"}\n".to_vec();
        input.extend_from_slice(&[0xff, 0xfe, b'\n']);
        input.extend_from_slice(b"{\"type\":\"stdout\",\"text\":\"y\"}\n");

        let result = decode_reader(input.as_slice(), &mut StreamCallbacks::new());
        assert_eq!(result.stdout, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_decode_stream_reassembles_split_chunks() {
        let chunks: Vec<std::result::Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"{\"type\":\"stdout\",\"te")),
            Ok(Bytes::from_static(b"xt\":\"a\"}\n{\"type\":\"garbage\"\n{\"type\":\"std")),
            Ok(Bytes::from_static(b"err\",\"text\":\"b\"}\n")),
            Ok(Bytes::from_static(
                b"{\"type\":\"error\",\"name\":\"E\",\"value\":\"boom\",\"traceback\":\"tb\"}",
            )),
        ];

        let result = decode_stream(stream::iter(chunks), &mut StreamCallbacks::new())
            .await
            .unwrap();

        assert_eq!(result.stdout, vec!["a"]);
        assert_eq!(result.stderr, vec!["b"]);
        assert_eq!(result.error, Some(expected_error()));
    }

    #[tokio::test]
    async fn test_transport_error_fails_with_partial_output() {
        let chunks: Vec<std::result::Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"{\"type\":\"stdout\",\"text\":\"partial\"}\n")),
            Err("connection reset".to_string()),
            Ok(Bytes::from_static(b"{\"type\":\"stdout\",\"text\":\"never\"}\n")),
        ];

        let err = decode_stream(stream::iter(chunks), &mut StreamCallbacks::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AgsError::StreamInterrupted { ref reason, .. } if reason == "connection reset"));
        assert_eq!(err.partial_output().unwrap().stdout, vec!["partial"]);
    }

    #[test]
    fn test_line_buffer_resumes_scan_across_chunks() {
        let mut lines = LineBuffer::default();
        lines.push(b"{\"type\":");
        assert_eq!(lines.next_line(), None);
        assert_eq!(lines.scanned, 8);

        lines.push(b"\"stdout\"}\nrest");
        assert_eq!(lines.next_line().as_deref(), Some(&b"{\"type\":\"stdout\"}"[..]));
        assert_eq!(lines.scanned, 0);
        assert_eq!(lines.next_line(), None);
        assert_eq!(lines.scanned, 4);

        lines.push(b"\n");
        assert_eq!(lines.next_line().as_deref(), Some(&b"rest"[..]));
        assert_eq!(lines.finish(), None);
    }
}
