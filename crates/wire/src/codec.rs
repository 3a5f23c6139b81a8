// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-prefixed JSON frame codec.
//!
//! Each frame is a 4-byte big-endian payload length followed by the JSON
//! payload. Frames above [`MAX_FRAME_SIZE`] are rejected on both sides so
//! a corrupt prefix cannot trigger an unbounded allocation.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame.
///
/// Sized for an artifact chunk (256 KiB raw, ~340 KiB base64) plus
/// generous headroom for manifests.
pub const MAX_FRAME_SIZE: u32 = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {size} bytes exceeds maximum {max}")]
    TooLarge { size: u32, max: u32 },

    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Encode a message into a length-prefixed frame.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    let payload = serde_json::to_vec(message)?;
    let size = payload.len() as u32;
    if size > MAX_FRAME_SIZE {
        return Err(ProtocolError::TooLarge { size, max: MAX_FRAME_SIZE });
    }
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&size.to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode a message from a frame payload (without the length prefix).
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Write one length-prefixed frame.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame.
///
/// An EOF before the prefix surfaces as `Io(UnexpectedEof)`, which the
/// transport treats like any other dropped connection.
pub async fn read_message<R, T>(reader: &mut R) -> Result<T, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix).await?;
    let size = u32::from_be_bytes(prefix);
    if size > MAX_FRAME_SIZE {
        return Err(ProtocolError::TooLarge { size, max: MAX_FRAME_SIZE });
    }
    let mut payload = vec![0u8; size as usize];
    reader.read_exact(&mut payload).await?;
    decode(&payload)
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
