use bytes::{BufMut, Bytes};
use lossprobe_core::buffer::SegmentedBuffer;
use thiserror::Error;

/// ZMTP frame flags
pub const FLAG_MORE: u8 = 0x01;
pub const FLAG_LONG: u8 = 0x02;
pub const FLAG_COMMAND: u8 = 0x04;

const RESERVED_BITS: u8 = 0xF8;
const SHORT_HEADER: usize = 2;
const LONG_HEADER: usize = 9;

/// ZMTP protocol errors
#[derive(Debug, Error)]
pub enum ZmtpError {
    #[error("Protocol violation: reserved flag bits set ({0:#04x})")]
    ReservedBits(u8),

    #[error("Protocol violation: frame size {size} exceeds limit {max}")]
    SizeTooLarge { size: u64, max: u64 },

    #[error("Invalid greeting: {0}")]
    Greeting(&'static str),

    #[error("Unsupported security mechanism: {0}")]
    Mechanism(String),

    #[error("Invalid command: {0}")]
    Command(&'static str),

    #[error("Incompatible peer socket type: {0}")]
    IncompatiblePeer(String),

    #[error("Protocol violation: {0}")]
    Protocol(&'static str),
}

/// Result type alias for ZMTP operations
pub type Result<T> = std::result::Result<T, ZmtpError>;

impl From<ZmtpError> for std::io::Error {
    fn from(err: ZmtpError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}

/// A decoded ZMTP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZmtpFrame {
    pub flags: u8,
    pub payload: Bytes,
}

impl ZmtpFrame {
    #[inline]
    pub const fn more(&self) -> bool {
        (self.flags & FLAG_MORE) != 0
    }

    #[inline]
    pub const fn is_command(&self) -> bool {
        (self.flags & FLAG_COMMAND) != 0
    }
}

/// ZMTP frame decoder over a segmented receive buffer.
///
/// The decoder only peeks until a whole frame is buffered, so it keeps no
/// reassembly state of its own: a frame split over several reads simply
/// stays in the buffer until the last piece arrives.
#[derive(Debug, Clone, Default)]
pub struct ZmtpDecoder {
    max_frame_size: Option<usize>,
}

impl ZmtpDecoder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_frame_size: None,
        }
    }

    /// Reject frames whose body is larger than `max` bytes.
    #[must_use]
    pub const fn with_max_frame_size(max: Option<usize>) -> Self {
        Self {
            max_frame_size: max,
        }
    }

    /// Decode a single frame from `src`
    ///
    /// Returns:
    /// - Ok(Some(frame)) → frame decoded and consumed
    /// - Ok(None) → need more data, nothing consumed
    /// - Err → protocol violation
    pub fn decode(&self, src: &mut SegmentedBuffer) -> Result<Option<ZmtpFrame>> {
        let mut header = [0u8; LONG_HEADER];
        if !src.copy_prefix(&mut header[..SHORT_HEADER]) {
            return Ok(None);
        }

        let flags = header[0];
        if flags & RESERVED_BITS != 0 {
            return Err(ZmtpError::ReservedBits(flags));
        }

        let (header_len, body_len) = if flags & FLAG_LONG != 0 {
            if !src.copy_prefix(&mut header) {
                return Ok(None);
            }
            let mut size = [0u8; 8];
            size.copy_from_slice(&header[1..LONG_HEADER]);
            (LONG_HEADER, u64::from_be_bytes(size))
        } else {
            (SHORT_HEADER, u64::from(header[1]))
        };

        let limit = self
            .max_frame_size
            .map_or(i64::MAX as u64, |max| max as u64);
        if body_len > limit {
            return Err(ZmtpError::SizeTooLarge {
                size: body_len,
                max: limit,
            });
        }
        let body_len = usize::try_from(body_len).map_err(|_| ZmtpError::SizeTooLarge {
            size: body_len,
            max: usize::MAX as u64,
        })?;

        if src.len() < header_len + body_len {
            return Ok(None);
        }

        src.advance(header_len);
        let payload = src
            .take_bytes(body_len)
            .ok_or(ZmtpError::Protocol("frame body vanished from buffer"))?;

        Ok(Some(ZmtpFrame { flags, payload }))
    }
}

/// Append one frame (header + body) to `dst`.
///
/// The LONG flag is derived from the body length; callers pass only MORE
/// and/or COMMAND.
pub fn encode_frame<B: BufMut>(flags: u8, body: &[u8], dst: &mut B) {
    let len = body.len();
    if len <= 255 {
        dst.put_u8(flags & !FLAG_LONG);
        dst.put_u8(len as u8);
    } else {
        dst.put_u8(flags | FLAG_LONG);
        dst.put_u64(len as u64);
    }
    dst.put_slice(body);
}

/// Append a multipart message to `dst`, setting MORE on all frames but the last.
///
/// An empty message is sent as a single empty frame.
pub fn encode_multipart<B: BufMut>(msg: &[Bytes], dst: &mut B) {
    if msg.is_empty() {
        encode_frame(0, &[], dst);
        return;
    }
    let last = msg.len() - 1;
    for (i, part) in msg.iter().enumerate() {
        let flags = if i < last { FLAG_MORE } else { 0 };
        encode_frame(flags, part, dst);
    }
}

/// Size `msg` will take on the wire.
pub fn encoded_len(msg: &[Bytes]) -> usize {
    if msg.is_empty() {
        return SHORT_HEADER;
    }
    msg.iter()
        .map(|part| {
            let header = if part.len() <= 255 {
                SHORT_HEADER
            } else {
                LONG_HEADER
            };
            header + part.len()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_of(chunks: &[&[u8]]) -> SegmentedBuffer {
        let mut buf = SegmentedBuffer::new();
        for chunk in chunks {
            buf.push(Bytes::copy_from_slice(chunk));
        }
        buf
    }

    #[test]
    fn test_short_frame_layout() {
        let mut out: Vec<u8> = Vec::new();
        encode_frame(0, b"msg", &mut out);
        assert_eq!(out, b"\x00\x03msg");
    }

    #[test]
    fn test_long_frame_layout() {
        let body = vec![7u8; 300];
        let mut out: Vec<u8> = Vec::new();
        encode_frame(FLAG_MORE, &body, &mut out);

        assert_eq!(out[0], FLAG_MORE | FLAG_LONG);
        assert_eq!(&out[1..9], &300u64.to_be_bytes());
        assert_eq!(out.len(), 9 + 300);
    }

    #[test]
    fn test_multipart_sets_more_on_all_but_last() {
        let msg = vec![Bytes::from_static(b"a"), Bytes::from_static(b"bc")];
        let mut out: Vec<u8> = Vec::new();
        encode_multipart(&msg, &mut out);

        assert_eq!(out, b"\x01\x01a\x00\x02bc");
        assert_eq!(encoded_len(&msg), out.len());
    }

    #[test]
    fn test_decode_multiple_frames() {
        let mut out: Vec<u8> = Vec::new();
        encode_multipart(&[Bytes::from_static(b"hi")], &mut out);
        encode_multipart(&[Bytes::from_static(b"msg")], &mut out);
        let mut buf = buffer_of(&[&out]);
        let decoder = ZmtpDecoder::new();

        let first = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&first.payload[..], b"hi");
        assert!(!first.more());
        let second = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&second.payload[..], b"msg");
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_waits_for_fragmented_long_frame() {
        let body = vec![1u8; 1000];
        let mut out: Vec<u8> = Vec::new();
        encode_frame(0, &body, &mut out);

        let decoder = ZmtpDecoder::new();
        let mut buf = buffer_of(&[&out[..5]]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 5);

        buf.push(Bytes::copy_from_slice(&out[5..500]));
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.push(Bytes::copy_from_slice(&out[500..]));
        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.payload.len(), 1000);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_reserved_bits_rejected() {
        let mut buf = buffer_of(&[b"\x80\x00"]);
        let err = ZmtpDecoder::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, ZmtpError::ReservedBits(0x80)));
    }

    #[test]
    fn test_size_limit() {
        let mut out: Vec<u8> = Vec::new();
        encode_frame(0, &[0u8; 64], &mut out);
        let mut buf = buffer_of(&[&out]);

        let decoder = ZmtpDecoder::with_max_frame_size(Some(32));
        let err = decoder.decode(&mut buf).unwrap_err();
        assert!(matches!(err, ZmtpError::SizeTooLarge { size: 64, max: 32 }));
    }

    #[test]
    fn test_msb_of_long_size_rejected() {
        let mut raw = vec![FLAG_LONG];
        raw.extend_from_slice(&u64::MAX.to_be_bytes());
        let mut buf = buffer_of(&[&raw]);
        assert!(ZmtpDecoder::new().decode(&mut buf).is_err());
    }

    #[test]
    fn test_empty_message_is_one_empty_frame() {
        let mut out: Vec<u8> = Vec::new();
        encode_multipart(&[], &mut out);
        assert_eq!(out, b"\x00\x00");
    }
}
