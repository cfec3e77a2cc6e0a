//! Length-prefixed framing for [`Packet`]s over a byte stream.

use crate::{Packet, ProtocolError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const FRAME_HEADER_LEN: usize = 4;
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Serializes a packet into a complete frame (header + body).
pub fn encode_frame(packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    let body = bincode::serialize(packet)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len: body.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decodes the first complete frame in `buf`.
///
/// Returns the packet and the number of bytes consumed, or `None` when the
/// buffer does not yet hold a whole frame.
pub fn decode_frame(buf: &[u8]) -> Result<Option<(Packet, usize)>, ProtocolError> {
    if buf.len() < FRAME_HEADER_LEN {
        return Ok(None);
    }

    let len = frame_len(&buf[..FRAME_HEADER_LEN])?;
    let total = FRAME_HEADER_LEN + len;
    if buf.len() < total {
        return Ok(None);
    }

    let packet = bincode::deserialize(&buf[FRAME_HEADER_LEN..total])?;
    Ok(Some((packet, total)))
}

/// Reads one packet. `Ok(None)` means the peer closed the stream cleanly
/// between frames.
pub async fn read_packet<R>(reader: &mut R) -> Result<Option<Packet>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = frame_len(&header)?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(bincode::deserialize(&body)?))
}

pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(packet)?;
    writer.write_all(&frame).await?;
    Ok(())
}

fn frame_len(header: &[u8]) -> Result<usize, ProtocolError> {
    let mut bytes = [0u8; FRAME_HEADER_LEN];
    bytes.copy_from_slice(header);
    let len = u32::from_le_bytes(bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    Ok(len)
}
