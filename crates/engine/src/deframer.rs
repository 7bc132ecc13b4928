//! Byte-to-message decoder (`spec.md` §4.1).
//!
//! Stateful: bytes accumulate in an append-only buffer and are split on
//! `\r\n`. Frames are parsed front-to-back; the first frame that fails to
//! parse halts advancement for that call, and the unconsumed bytes
//! (including the frame that failed) are kept for the next push — the
//! reference behavior is to hold position, not discard, since a split
//! could legitimately have crossed a partial frame.

use serde_json::Value;

use crate::config::DecodeMode;
use crate::error::EngineError;
use crate::message::Message;

/// Result of feeding bytes into the [`Deframer`].
#[derive(Debug, Default)]
pub struct DeframeBatch {
    /// Messages decoded from this push, in wire order.
    pub messages: Vec<Message>,
    /// Set when the connection should be torn down: either a complete frame
    /// failed to parse under [`DecodeMode::Strict`], or the buffer grew past
    /// `max_frame_buffer` without a frame boundary in sight.
    pub fatal: Option<EngineError>,
}

/// Stateful JSON-RPC frame decoder for one connection direction.
#[derive(Debug)]
pub struct Deframer {
    buffer: Vec<u8>,
    decode_mode: DecodeMode,
    max_frame_buffer: usize,
}

impl Deframer {
    pub fn new(decode_mode: DecodeMode, max_frame_buffer: usize) -> Self {
        Self {
            buffer: Vec::new(),
            decode_mode,
            max_frame_buffer,
        }
    }

    /// Feeds a chunk of bytes read off the transport, returning any messages
    /// decoded as a result.
    pub fn push(&mut self, bytes: &[u8]) -> DeframeBatch {
        self.buffer.extend_from_slice(bytes);

        let mut messages = Vec::new();
        loop {
            let Some(delim_at) = find_crlf(&self.buffer) else {
                break;
            };

            let frame = self.buffer[..delim_at].to_vec();
            match parse_frame(&frame) {
                Some(message) => {
                    messages.push(message);
                    self.buffer.drain(..delim_at + 2);
                }
                None => {
                    tracing::warn!(frame_len = frame.len(), "failed to parse JSON-RPC frame");
                    if self.decode_mode == DecodeMode::Strict {
                        return DeframeBatch {
                            messages,
                            fatal: Some(EngineError::FrameDecode(format!(
                                "complete frame of {} bytes failed to parse",
                                frame.len()
                            ))),
                        };
                    }
                    // Lenient: hold position. The buffer is left exactly as
                    // it is (including the bad frame) so the caller can
                    // observe/log it; we never make progress past it since
                    // its content is fixed once `\r\n`-terminated.
                    return DeframeBatch {
                        messages,
                        fatal: None,
                    };
                }
            }
        }

        if self.buffer.len() > self.max_frame_buffer {
            return DeframeBatch {
                messages,
                fatal: Some(EngineError::FrameDecode(format!(
                    "buffered {} bytes with no frame boundary (limit {})",
                    self.buffer.len(),
                    self.max_frame_buffer
                ))),
            };
        }

        DeframeBatch {
            messages,
            fatal: None,
        }
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn parse_frame(frame: &[u8]) -> Option<Message> {
    let value: Value = serde_json::from_slice(frame).ok()?;
    Message::from_value(value)
}
