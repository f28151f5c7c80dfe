//! Length-prefixed message framing shared by all three channels.
//!
//! Every message on the wire is a 4-byte big-endian length `L` followed by
//! exactly `L` payload bytes, used uniformly across all three channels for
//! wire consistency.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

/// Maximum accepted frame length for auth requests/responses and handshake
/// responses.
pub const MAX_AUTH_FRAME: u32 = 100_000;
/// Maximum accepted frame length for input commands and handshake tokens.
pub const MAX_SMALL_FRAME: u32 = 1_024;

/// Reads exactly `buf.len()` bytes, looping over partial reads. A zero-length
/// read is treated as a clean EOF ([`ProtocolError::Eof`]) rather than an
/// error. `cancel`, when set, aborts the read promptly between chunks so a
/// shutdown signal can interrupt a stalled peer.
pub async fn read_exact_cancellable<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
    cancel: Option<&AtomicBool>,
) -> Result<(), ProtocolError> {
    let mut filled = 0;
    while filled < buf.len() {
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(ProtocolError::Cancelled);
            }
        }
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(ProtocolError::Eof);
        }
        filled += n;
    }
    Ok(())
}

/// Reads one length-prefixed frame, rejecting lengths outside `(0, max]`.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max: u32,
    cancel: Option<&AtomicBool>,
) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    read_exact_cancellable(reader, &mut len_buf, cancel).await?;
    let len = u32::from_be_bytes(len_buf);
    if len == 0 {
        return Err(ProtocolError::EmptyFrame);
    }
    if len > max {
        return Err(ProtocolError::FrameTooLarge(len, max));
    }
    let mut payload = vec![0u8; len as usize];
    read_exact_cancellable(reader, &mut payload, cancel).await?;
    Ok(payload)
}

/// Writes one length-prefixed frame in a single `write_all` call.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    let len = u32::try_from(payload.len())
        .map_err(|_| ProtocolError::FrameTooLarge(u32::MAX, u32::MAX))?;
    let mut message = Vec::with_capacity(4 + payload.len());
    message.extend_from_slice(&len.to_be_bytes());
    message.extend_from_slice(payload);
    writer.write_all(&message).await?;
    Ok(())
}

/// Reads a frame and parses it as UTF-8 JSON-bearing text.
pub async fn read_text_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max: u32,
    cancel: Option<&AtomicBool>,
) -> Result<String, ProtocolError> {
    let bytes = read_frame(reader, max, cancel).await?;
    Ok(String::from_utf8(bytes)?)
}

/// Writes a UTF-8 string as one length-prefixed frame.
pub async fn write_text_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    text: &str,
) -> Result<(), ProtocolError> {
    write_frame(writer, text.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn round_trips_arbitrary_payload() {
        let payload = b"hello, remote desktop".to_vec();
        let mut buf = Vec::new();
        write_frame(&mut buf, &payload).await.unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded = read_frame(&mut cursor, MAX_AUTH_FRAME, None).await.unwrap();
        assert_eq!(decoded, payload);
    }

    #[tokio::test]
    async fn rejects_oversized_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &vec![0u8; 2000]).await.unwrap();
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor, MAX_SMALL_FRAME, None).await.unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge(2000, MAX_SMALL_FRAME)));
    }

    #[tokio::test]
    async fn rejects_empty_frame() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u32.to_be_bytes());
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor, MAX_AUTH_FRAME, None).await.unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyFrame));
    }

    #[tokio::test]
    async fn zero_byte_read_is_clean_eof() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let err = read_frame(&mut cursor, MAX_AUTH_FRAME, None).await.unwrap_err();
        assert!(err.is_clean_disconnect());
    }
}
