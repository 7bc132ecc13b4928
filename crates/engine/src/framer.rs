//! Message-to-bytes encoder (`spec.md` §4.1): each message becomes its JSON
//! encoding followed by `\r\n`. The reverse direction lives in
//! [`crate::deframer`].

use crate::error::EngineError;
use crate::message::Message;

/// Encodes one message as a complete wire frame.
pub fn encode_frame(message: &Message) -> Result<Vec<u8>, EngineError> {
    let mut bytes = serde_json::to_vec(&message.to_value()).map_err(EngineError::Encode)?;
    bytes.extend_from_slice(b"\r\n");
    Ok(bytes)
}
