//! Length-prefixed framing for stream transports.
//!
//! A frame is a 4-byte big-endian length followed by exactly that many
//! payload bytes. Both directions use the same layout.

use crate::error::ChatError;

/// Size of the length header in bytes.
pub const HEADER_LEN: usize = 4;

/// Prefixes `message` with its length.
pub fn encode(message: &[u8]) -> Result<Vec<u8>, ChatError> {
    let len = u32::try_from(message.len()).map_err(|_| {
        ChatError::Framing(format!("{} bytes do not fit a 32-bit length", message.len()))
    })?;

    let mut frame = Vec::with_capacity(HEADER_LEN + message.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(message);
    Ok(frame)
}

/// Reads the payload length out of a frame header.
pub fn decode_header(header: [u8; HEADER_LEN]) -> u32 {
    u32::from_be_bytes(header)
}

/// Decodes one complete frame held in memory and returns its payload.
///
/// The slice must contain exactly one frame: a short header, a short
/// payload or trailing bytes are all rejected.
pub fn decode(frame: &[u8]) -> Result<&[u8], ChatError> {
    if frame.len() < HEADER_LEN {
        return Err(ChatError::Framing(format!(
            "header truncated to {} bytes",
            frame.len()
        )));
    }
    let (header, payload) = frame.split_at(HEADER_LEN);
    let mut len_bytes = [0u8; HEADER_LEN];
    len_bytes.copy_from_slice(header);
    let len = decode_header(len_bytes) as usize;

    if payload.len() != len {
        return Err(ChatError::Framing(format!(
            "header declares {} bytes, frame carries {}",
            len,
            payload.len()
        )));
    }
    Ok(payload)
}
