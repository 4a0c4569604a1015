// ABOUTME: Length-prefixed PDU framing over a byte stream, one owned half per direction
// ABOUTME: Reads accumulate until a whole frame is buffered; writes emit one whole frame then flush

use bytes::{Buf, BytesMut};
use std::io::Cursor;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

use crate::codec::{Pdu, PduHeader, MAX_PDU_SIZE};
use crate::error::{SmppError, SmppResult};

/// Framing failures. These are fatal to the connection: once the length
/// prefix cannot be trusted, no later frame boundary can be either.
#[derive(Debug, Clone, Error)]
pub enum FrameError {
    /// command_length outside 16..=65_536. `sequence_number` is carried
    /// when the full header had already arrived, so the peer can be
    /// nacked with InvalidCommandLength before the socket closes.
    #[error("command_length {length} outside 16..={MAX_PDU_SIZE}")]
    InvalidLength {
        length: u32,
        sequence_number: Option<u32>,
    },

    /// Peer closed the stream in the middle of a frame.
    #[error("stream truncated mid-frame")]
    Truncated,
}

/// Read side: buffers stream bytes and yields whole decoded PDUs.
///
/// Parsing is two-step: peek the 4-octet length prefix, wait until that
/// many octets are buffered, then hand the exact frame to the codec.
/// Bytes past the frame stay buffered for the next call.
#[derive(Debug)]
pub struct FrameReader<R> {
    stream: R,
    buffer: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(stream: R) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Read one PDU. Returns `None` on a clean end-of-stream (no
    /// partial frame left in the buffer).
    pub async fn read_pdu(&mut self) -> SmppResult<Option<Pdu>> {
        loop {
            if let Some(pdu) = self.parse_pdu()? {
                return Ok(Some(pdu));
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(FrameError::Truncated.into());
            }
        }
    }

    /// Try to parse a frame out of the buffer; `Ok(None)` means more
    /// bytes are needed.
    fn parse_pdu(&mut self) -> SmppResult<Option<Pdu>> {
        if self.buffer.len() < 4 {
            return Ok(None);
        }

        let length =
            u32::from_be_bytes([self.buffer[0], self.buffer[1], self.buffer[2], self.buffer[3]]);

        if length < PduHeader::SIZE as u32 || length > MAX_PDU_SIZE {
            // If the whole header made it here, recover the sequence
            // number so the caller can nack before closing.
            let sequence_number = (self.buffer.len() >= PduHeader::SIZE).then(|| {
                u32::from_be_bytes([
                    self.buffer[12],
                    self.buffer[13],
                    self.buffer[14],
                    self.buffer[15],
                ])
            });
            return Err(FrameError::InvalidLength {
                length,
                sequence_number,
            }
            .into());
        }

        let length = length as usize;
        if self.buffer.len() < length {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&self.buffer[..length]);
        let pdu = Pdu::decode(&mut cursor).map_err(SmppError::Protocol)?;
        self.buffer.advance(length);
        Ok(Some(pdu))
    }
}

/// Write side: encodes and emits one complete frame per call. The
/// session funnels all writers through a single queue, so frames from
/// concurrent producers never interleave on the wire.
#[derive(Debug)]
pub struct FrameWriter<W> {
    stream: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(stream: W) -> Self {
        Self {
            stream: BufWriter::new(stream),
        }
    }

    pub async fn write_pdu(&mut self, pdu: &Pdu) -> SmppResult<()> {
        let bytes = pdu.to_bytes().map_err(SmppError::Protocol)?;
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Flush and shut the write half down, signalling EOF to the peer.
    pub async fn shutdown(&mut self) -> SmppResult<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Encodable;
    use crate::datatypes::{EnquireLink, Unbind};

    #[tokio::test]
    async fn reads_single_frame() {
        let (mut tx, rx) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(rx);

        let bytes = EnquireLink::new(9).to_bytes().unwrap();
        tx.write_all(&bytes).await.unwrap();
        drop(tx);

        let pdu = reader.read_pdu().await.unwrap().unwrap();
        assert!(matches!(pdu, Pdu::EnquireLink(p) if p.sequence_number == 9));
        assert!(reader.read_pdu().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reads_back_to_back_frames_from_one_chunk() {
        let (mut tx, rx) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(rx);

        let mut chunk = Vec::new();
        chunk.extend_from_slice(&EnquireLink::new(1).to_bytes().unwrap());
        chunk.extend_from_slice(&Unbind::new(2).to_bytes().unwrap());
        tx.write_all(&chunk).await.unwrap();
        drop(tx);

        assert!(matches!(
            reader.read_pdu().await.unwrap().unwrap(),
            Pdu::EnquireLink(_)
        ));
        assert!(matches!(
            reader.read_pdu().await.unwrap().unwrap(),
            Pdu::Unbind(_)
        ));
        assert!(reader.read_pdu().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reassembles_split_frame() {
        let (mut tx, rx) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(rx);

        let bytes = EnquireLink::new(3).to_bytes().unwrap();
        let (head, tail) = bytes.split_at(7);

        let head = head.to_vec();
        let tail = tail.to_vec();
        let writer = tokio::spawn(async move {
            tx.write_all(&head).await.unwrap();
            tokio::task::yield_now().await;
            tx.write_all(&tail).await.unwrap();
        });

        let pdu = reader.read_pdu().await.unwrap().unwrap();
        assert!(matches!(pdu, Pdu::EnquireLink(p) if p.sequence_number == 3));
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn rejects_oversized_length() {
        let (mut tx, rx) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(rx);

        // 65_537 is one past the ceiling; sequence 5 is in the header
        let mut frame = Vec::new();
        frame.extend_from_slice(&65_537u32.to_be_bytes());
        frame.extend_from_slice(&0x0000_0015u32.to_be_bytes());
        frame.extend_from_slice(&0u32.to_be_bytes());
        frame.extend_from_slice(&5u32.to_be_bytes());
        tx.write_all(&frame).await.unwrap();

        let err = reader.read_pdu().await.unwrap_err();
        assert!(matches!(
            err,
            SmppError::Frame(FrameError::InvalidLength {
                length: 65_537,
                sequence_number: Some(5),
            })
        ));
    }

    #[tokio::test]
    async fn rejects_undersized_length() {
        let (mut tx, rx) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(rx);

        tx.write_all(&8u32.to_be_bytes()).await.unwrap();
        let err = reader.read_pdu().await.unwrap_err();
        assert!(matches!(
            err,
            SmppError::Frame(FrameError::InvalidLength {
                length: 8,
                sequence_number: None,
            })
        ));
    }

    #[tokio::test]
    async fn eof_mid_frame_is_truncation() {
        let (mut tx, rx) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(rx);

        let bytes = EnquireLink::new(4).to_bytes().unwrap();
        tx.write_all(&bytes[..10]).await.unwrap();
        drop(tx);

        let err = reader.read_pdu().await.unwrap_err();
        assert!(matches!(err, SmppError::Frame(FrameError::Truncated)));
    }

    #[tokio::test]
    async fn writer_reader_pair() {
        let (client, server) = tokio::io::duplex(1024);
        let (rx, _tx_unused) = tokio::io::split(server);
        let (_rx_unused, tx) = tokio::io::split(client);

        let mut writer = FrameWriter::new(tx);
        let mut reader = FrameReader::new(rx);

        writer
            .write_pdu(&Pdu::EnquireLink(EnquireLink::new(77)))
            .await
            .unwrap();

        let pdu = reader.read_pdu().await.unwrap().unwrap();
        assert_eq!(pdu.sequence_number(), 77);
    }
}
