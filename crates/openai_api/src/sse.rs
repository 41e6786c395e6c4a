use serde_json::Value;

use crate::error::{stream_error_from_value, OpenAiApiError};
use crate::events::{ChatCompletionChunk, StreamEvent};

const DONE_SENTINEL: &str = "[DONE]";

/// Incremental parser for SSE byte streams.
///
/// Bytes are buffered until a blank line closes a frame, so multi-byte UTF-8
/// sequences split across network chunks are decoded intact.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: Vec<u8>,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    ///
    /// Malformed frames surface as errors in position; the events around them
    /// are still returned.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<StreamEvent, OpenAiApiError>> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some((split, separator_len)) = find_frame_boundary(&self.buffer) {
            let frame = String::from_utf8_lossy(&self.buffer[..split]).into_owned();
            self.buffer.drain(0..split + separator_len);

            if let Some(event) = parse_frame(&frame) {
                events.push(event);
            }
        }

        events
    }

    /// Parse whatever remains once the byte stream has ended.
    ///
    /// Servers normally close every frame with a blank line; a trailing frame
    /// without one is still honored.
    pub fn finish(&mut self) -> Vec<Result<StreamEvent, OpenAiApiError>> {
        if self.is_empty_buffer() {
            self.buffer.clear();
            return Vec::new();
        }

        let frame = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        parse_frame(&frame).into_iter().collect()
    }

    /// Parse a complete SSE payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<Result<StreamEvent, OpenAiApiError>> {
        let mut parser = Self::default();
        let mut events = parser.feed(input.as_bytes());
        events.extend(parser.finish());
        events
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn find_frame_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer
        .windows(2)
        .position(|window| window == b"\n\n")
        .map(|index| (index, 2));
    let crlf = buffer
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|index| (index, 4));

    match (lf, crlf) {
        (Some(lf), Some(crlf)) => Some(if crlf.0 < lf.0 { crlf } else { lf }),
        (lf, crlf) => lf.or(crlf),
    }
}

fn parse_frame(frame: &str) -> Option<Result<StreamEvent, OpenAiApiError>> {
    let payload = extract_data_payload(frame)?;
    if payload == DONE_SENTINEL {
        return Some(Ok(StreamEvent::Done));
    }

    let value = match serde_json::from_str::<Value>(&payload) {
        Ok(value) => value,
        Err(error) => {
            return Some(Err(OpenAiApiError::MalformedSse(format!(
                "{error}: {payload}"
            ))))
        }
    };

    if let Some(error) = stream_error_from_value(&value) {
        return Some(Err(error));
    }

    Some(
        serde_json::from_value::<ChatCompletionChunk>(value)
            .map(StreamEvent::Chunk)
            .map_err(|error| OpenAiApiError::MalformedSse(format!("{error}: {payload}"))),
    )
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}
