//! Incremental decoder for the SSE wire format.
//!
//! Frames are separated by blank lines. Each frame carries an `event:` name
//! (defaulting to `"message"`), one or more `data:` lines, and optionally an
//! `id:` and a server-suggested `retry:` interval. Comment lines (leading
//! `:`) are skipped; servers commonly send them as keepalives.

use std::time::Duration;

/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name, `"message"` when the server sent none.
    pub event: String,
    /// Raw payload text; multiple `data:` lines are newline-joined.
    pub data: String,
    /// Last-event-id, when the server supplied one.
    pub id: Option<String>,
    /// Server-suggested reconnection delay.
    pub retry: Option<Duration>,
}

/// Stateful decoder that accepts byte chunks and yields completed frames.
///
/// Chunk boundaries need not align with frame boundaries; partial frames are
/// buffered until their terminating blank line arrives.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every frame completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let text = String::from_utf8_lossy(chunk);
        self.buffer.push_str(&text.replace("\r\n", "\n"));

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();
            if let Some(frame) = parse_block(&block) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Drain a trailing frame that was never terminated by a blank line.
    ///
    /// Called when the stream ends so a final partial frame is not lost.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            None
        } else {
            parse_block(&rest)
        }
    }
}

fn parse_block(block: &str) -> Option<SseFrame> {
    let mut event: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();
    let mut id: Option<String> = None;
    let mut retry: Option<Duration> = None;

    for line in block.lines() {
        if line.starts_with(':') || line.is_empty() {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => event = Some(value.to_string()),
            "data" => data_lines.push(value),
            "id" => id = Some(value.to_string()),
            "retry" => retry = value.parse::<u64>().ok().map(Duration::from_millis),
            _ => {}
        }
    }

    if event.is_none() && data_lines.is_empty() && id.is_none() && retry.is_none() {
        return None;
    }

    Some(SseFrame {
        event: event.unwrap_or_else(|| "message".to_string()),
        data: data_lines.join("\n"),
        id,
        retry,
    })
}
