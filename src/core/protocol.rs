//! Wire protocol between `TcpQueue` clients and the broker.
//!
//! Every frame is `[u32 len][u8 type][body]`, big-endian, where `len` counts
//! the type byte plus the body. Bodies:
//!
//! - PUSH:  `[u8 front][u16 channel_len][channel][payload...]`
//! - POP:   `[u16 channel_len][channel][u64 timeout_ms]`
//! - LEN:   `[u16 channel_len][channel]`
//! - OK, EMPTY: empty
//! - ITEM:  `[payload...]`
//! - COUNT: `[u64 count]`
//! - ERROR: `[message...]`

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::core::error::QueueError;

pub const LENGTH_FIELD_LEN: usize = 4;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;
const INBUF_INIT: usize = 4 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Push = 0x01,
    Pop = 0x02,
    Len = 0x03,
    Ok = 0x10,
    Item = 0x11,
    Empty = 0x12,
    Count = 0x13,
    Error = 0x1F,
}

impl TryFrom<u8> for FrameType {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, FrameError> {
        match value {
            0x01 => Ok(FrameType::Push),
            0x02 => Ok(FrameType::Pop),
            0x03 => Ok(FrameType::Len),
            0x10 => Ok(FrameType::Ok),
            0x11 => Ok(FrameType::Item),
            0x12 => Ok(FrameType::Empty),
            0x13 => Ok(FrameType::Count),
            0x1F => Ok(FrameType::Error),
            other => Err(FrameError::UnknownFrameType(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Push {
        channel: String,
        payload: String,
        front: bool,
    },
    Pop {
        channel: String,
        timeout_ms: u64,
    },
    Len {
        channel: String,
    },
    Ok,
    Item(String),
    Empty,
    Count(u64),
    Error(String),
}

impl Frame {
    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::Push { .. } => FrameType::Push,
            Frame::Pop { .. } => FrameType::Pop,
            Frame::Len { .. } => FrameType::Len,
            Frame::Ok => FrameType::Ok,
            Frame::Item(_) => FrameType::Item,
            Frame::Empty => FrameType::Empty,
            Frame::Count(_) => FrameType::Count,
            Frame::Error(_) => FrameType::Error,
        }
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid frame length: {0}")]
    InvalidLength(usize),

    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("unknown frame type: {0:#04x}")]
    UnknownFrameType(u8),

    #[error("channel name too long: {0} bytes")]
    ChannelTooLong(usize),

    #[error("frame body is not valid UTF-8")]
    InvalidUtf8,
}

fn put_channel(dst: &mut BytesMut, channel: &str) -> Result<(), FrameError> {
    let len = u16::try_from(channel.len()).map_err(|_| FrameError::ChannelTooLong(channel.len()))?;
    dst.put_u16(len);
    dst.put_slice(channel.as_bytes());
    Ok(())
}

fn get_channel(body: &mut Bytes) -> Result<String, FrameError> {
    if body.remaining() < 2 {
        return Err(FrameError::InvalidLength(body.len()));
    }
    let len = body.get_u16() as usize;
    if body.remaining() < len {
        return Err(FrameError::InvalidLength(body.len()));
    }
    utf8(body.split_to(len))
}

fn utf8(bytes: Bytes) -> Result<String, FrameError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| FrameError::InvalidUtf8)
}

/// Encode a frame into the provided buffer.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut, max_frame_bytes: usize) -> Result<(), FrameError> {
    let mut body = BytesMut::new();
    match frame {
        Frame::Push {
            channel,
            payload,
            front,
        } => {
            body.put_u8(u8::from(*front));
            put_channel(&mut body, channel)?;
            body.put_slice(payload.as_bytes());
        }
        Frame::Pop {
            channel,
            timeout_ms,
        } => {
            put_channel(&mut body, channel)?;
            body.put_u64(*timeout_ms);
        }
        Frame::Len { channel } => put_channel(&mut body, channel)?,
        Frame::Ok | Frame::Empty => {}
        Frame::Item(payload) => body.put_slice(payload.as_bytes()),
        Frame::Count(count) => body.put_u64(*count),
        Frame::Error(message) => body.put_slice(message.as_bytes()),
    }

    let total_len = 1 + body.len();
    if total_len > max_frame_bytes || total_len > u32::MAX as usize {
        return Err(FrameError::FrameTooLarge(total_len));
    }

    dst.reserve(LENGTH_FIELD_LEN + total_len);
    dst.put_u32(total_len as u32);
    dst.put_u8(frame.frame_type() as u8);
    dst.put_slice(&body);
    Ok(())
}

/// Try to decode a single frame from the buffer.
///
/// Returns `Ok(None)` if there is not yet enough data to decode a full frame.
pub fn try_decode_frame(src: &mut BytesMut, max_frame_bytes: usize) -> Result<Option<Frame>, FrameError> {
    if src.len() < LENGTH_FIELD_LEN {
        return Ok(None);
    }

    let frame_len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
    if frame_len == 0 {
        return Err(FrameError::InvalidLength(frame_len));
    }
    if frame_len > max_frame_bytes {
        return Err(FrameError::FrameTooLarge(frame_len));
    }
    if src.len() < LENGTH_FIELD_LEN + frame_len {
        return Ok(None);
    }

    let mut frame_bytes = src.split_to(LENGTH_FIELD_LEN + frame_len);
    frame_bytes.advance(LENGTH_FIELD_LEN);
    let frame_type = FrameType::try_from(frame_bytes.get_u8())?;
    let mut body = frame_bytes.freeze();

    let frame = match frame_type {
        FrameType::Push => {
            if body.remaining() < 1 {
                return Err(FrameError::InvalidLength(frame_len));
            }
            let front = body.get_u8() != 0;
            let channel = get_channel(&mut body)?;
            Frame::Push {
                channel,
                payload: utf8(body)?,
                front,
            }
        }
        FrameType::Pop => {
            let channel = get_channel(&mut body)?;
            if body.remaining() != 8 {
                return Err(FrameError::InvalidLength(frame_len));
            }
            Frame::Pop {
                channel,
                timeout_ms: body.get_u64(),
            }
        }
        FrameType::Len => Frame::Len {
            channel: get_channel(&mut body)?,
        },
        FrameType::Ok => Frame::Ok,
        FrameType::Empty => Frame::Empty,
        FrameType::Item => Frame::Item(utf8(body)?),
        FrameType::Count => {
            if body.remaining() != 8 {
                return Err(FrameError::InvalidLength(frame_len));
            }
            Frame::Count(body.get_u64())
        }
        FrameType::Error => Frame::Error(utf8(body)?),
    };
    Ok(Some(frame))
}

/// Length-prefixed frame stream over any async byte stream.
#[derive(Debug)]
pub struct FramedStream<S> {
    stream: S,
    inbuf: BytesMut,
    outbuf: BytesMut,
    max_frame_bytes: usize,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, max_frame_bytes: usize) -> Self {
        Self {
            stream,
            inbuf: BytesMut::with_capacity(INBUF_INIT),
            outbuf: BytesMut::with_capacity(INBUF_INIT),
            max_frame_bytes,
        }
    }

    /// Bytes received but not yet decoded into a frame.
    pub fn buffered(&self) -> usize {
        self.inbuf.len()
    }

    /// Reads whatever the peer sends next into the input buffer without
    /// decoding it. `Ok(0)` means the peer closed its side. Cancel safe.
    pub async fn fill(&mut self) -> Result<usize, QueueError> {
        Ok(self.stream.read_buf(&mut self.inbuf).await?)
    }

    /// Reads the next frame; `Ok(None)` on a clean EOF between frames.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, QueueError> {
        loop {
            if let Some(frame) = try_decode_frame(&mut self.inbuf, self.max_frame_bytes)? {
                return Ok(Some(frame));
            }
            if self.fill().await? == 0 {
                if self.inbuf.is_empty() {
                    return Ok(None);
                }
                return Err(QueueError::Transport(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid-frame",
                )));
            }
        }
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> Result<(), QueueError> {
        self.outbuf.clear();
        encode_frame(frame, &mut self.outbuf, self.max_frame_bytes)?;
        self.stream.write_all(&self.outbuf).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(frame: Frame) {
        let mut buf = BytesMut::new();
        encode_frame(&frame, &mut buf, DEFAULT_MAX_FRAME_BYTES).unwrap();
        let decoded = try_decode_frame(&mut buf, DEFAULT_MAX_FRAME_BYTES)
            .unwrap()
            .expect("expected one complete frame");
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn request_frames_survive_encoding() {
        roundtrip(Frame::Push {
            channel: "vector_store_queue".into(),
            payload: r#"{"action":"search"}"#.into(),
            front: false,
        });
        roundtrip(Frame::Pop {
            channel: "responses".into(),
            timeout_ms: 1_000,
        });
        roundtrip(Frame::Item("héllo".into()));
        roundtrip(Frame::Empty);
    }

    #[test]
    fn pipelined_frames_decode_in_order() {
        let mut buf = BytesMut::new();
        encode_frame(&Frame::Ok, &mut buf, DEFAULT_MAX_FRAME_BYTES).unwrap();
        encode_frame(&Frame::Count(7), &mut buf, DEFAULT_MAX_FRAME_BYTES).unwrap();

        assert_eq!(
            try_decode_frame(&mut buf, DEFAULT_MAX_FRAME_BYTES).unwrap(),
            Some(Frame::Ok)
        );
        assert_eq!(
            try_decode_frame(&mut buf, DEFAULT_MAX_FRAME_BYTES).unwrap(),
            Some(Frame::Count(7))
        );
        assert!(try_decode_frame(&mut buf, DEFAULT_MAX_FRAME_BYTES).unwrap().is_none());
    }

    #[test]
    fn incomplete_buffer_returns_none() {
        let mut full = BytesMut::new();
        encode_frame(&Frame::Item("short".into()), &mut full, DEFAULT_MAX_FRAME_BYTES).unwrap();
        let mut partial = full.split_to(6);
        assert!(try_decode_frame(&mut partial, DEFAULT_MAX_FRAME_BYTES).unwrap().is_none());
    }

    #[test]
    fn oversized_frames_are_rejected_both_ways() {
        let frame = Frame::Item("x".repeat(64));
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_frame(&frame, &mut buf, 16),
            Err(FrameError::FrameTooLarge(_))
        ));

        encode_frame(&frame, &mut buf, DEFAULT_MAX_FRAME_BYTES).unwrap();
        assert!(matches!(
            try_decode_frame(&mut buf, 16),
            Err(FrameError::FrameTooLarge(65))
        ));
    }

    #[test]
    fn unknown_type_byte_is_an_error() {
        let mut buf = BytesMut::from(&[0u8, 0, 0, 1, 0x7E][..]);
        assert!(matches!(
            try_decode_frame(&mut buf, DEFAULT_MAX_FRAME_BYTES),
            Err(FrameError::UnknownFrameType(0x7E))
        ));
    }
}
