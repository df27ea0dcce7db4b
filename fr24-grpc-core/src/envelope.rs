//! grpc-web frame encoding and decoding.
//!
//! Every message on the wire is wrapped in a frame:
//!
//! ```text
//! [flag:1][length:4 big-endian][payload:length]
//! ```
//!
//! Flags:
//! - `0x00`: Uncompressed data frame
//! - `0x01`: Compressed data frame (rejected)
//! - anything else: Trailer frame
//!
//! Decoding only answers "is this byte range a valid frame, and what is its
//! payload". Turning the payload into a message is the caller's job, so the
//! same codec serves every method regardless of message shape.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, ProtocolError};
use crate::trailer::{Status, TrailerSet};

/// Frame flag values.
pub mod frame_flags {
    /// Uncompressed data frame.
    pub const DATA: u8 = 0x00;
    /// Compressed data frame.
    pub const COMPRESSED: u8 = 0x01;
    /// Trailer frame as emitted by grpc-web servers. Any other value
    /// besides `DATA` and `COMPRESSED` is also read as a trailer.
    pub const TRAILER: u8 = 0x80;
}

/// Frame header size (flag + length).
pub const FRAME_HEADER_SIZE: usize = 5;

/// The fixed 5-byte prefix of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub flag: u8,
    pub length: u32,
}

impl FrameHeader {
    /// Size of the whole frame, header included.
    pub fn frame_len(&self) -> usize {
        FRAME_HEADER_SIZE + self.length as usize
    }

    pub fn is_data(&self) -> bool {
        self.flag == frame_flags::DATA
    }

    /// Reject frames whose declared payload exceeds `limit` bytes.
    pub fn check_limit(&self, limit: usize) -> Result<(), FrameError> {
        let len = self.length as usize;
        if len > limit {
            return Err(FrameError::FrameTooLarge { len, limit });
        }
        Ok(())
    }
}

/// Wrap a serialized message in an uncompressed data frame.
///
/// Produces `0x00 || be_u32(len) || payload`. Compression is never emitted.
///
/// # Panics
///
/// Panics if `payload` is longer than `u32::MAX` bytes; the length prefix
/// cannot represent it.
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let length = u32::try_from(payload.len()).unwrap_or_else(|_| {
        panic!("payload of {} bytes does not fit a frame", payload.len())
    });

    let mut frame = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.put_u8(frame_flags::DATA);
    frame.put_u32(length);
    frame.put_slice(payload);
    frame.freeze()
}

/// Parse the 5-byte frame header at the start of `data`.
pub fn parse_frame_header(data: &[u8]) -> Result<FrameHeader, FrameError> {
    if data.len() < FRAME_HEADER_SIZE {
        return Err(FrameError::ShortFrame { len: data.len() });
    }

    Ok(FrameHeader {
        flag: data[0],
        length: u32::from_be_bytes([data[1], data[2], data[3], data[4]]),
    })
}

/// Decode one frame from the start of `raw` and return its payload.
///
/// Only the first frame is examined; bytes after it are left alone and the
/// caller is responsible for frame alignment.
///
/// # Errors
///
/// - [`FrameError::EmptyFrame`] if `raw` is empty
/// - [`FrameError::CompressedUnsupported`] if the flag is `0x01`
/// - [`FrameError::ShortFrame`] if fewer than 5 bytes are present
/// - [`ProtocolError::Status`] if the flag marks a trailer frame
/// - [`FrameError::EmptyMessagePayload`] if a data frame declares length 0
/// - [`FrameError::TruncatedPayload`] if fewer payload bytes are present
///   than declared
pub fn decode_frame(raw: &[u8]) -> Result<&[u8], ProtocolError> {
    let Some(&flag) = raw.first() else {
        return Err(ProtocolError::frame(FrameError::EmptyFrame, raw));
    };

    if flag == frame_flags::COMPRESSED {
        return Err(ProtocolError::frame(FrameError::CompressedUnsupported, raw));
    }

    let header = parse_frame_header(raw).map_err(|e| ProtocolError::frame(e, raw))?;

    if !header.is_data() {
        let trailers = TrailerSet::parse(&raw[FRAME_HEADER_SIZE..]);
        return Err(ProtocolError::Status {
            status: Status::from(trailers),
            raw: Bytes::copy_from_slice(raw),
        });
    }

    if header.length == 0 {
        return Err(ProtocolError::frame(FrameError::EmptyMessagePayload, raw));
    }

    let end = header.frame_len();
    if raw.len() < end {
        return Err(ProtocolError::frame(
            FrameError::TruncatedPayload {
                declared: header.length as usize,
                available: raw.len() - FRAME_HEADER_SIZE,
            },
            raw,
        ));
    }

    Ok(&raw[FRAME_HEADER_SIZE..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;

    fn trailer_frame(flag: u8, text: &[u8]) -> Vec<u8> {
        let mut frame = vec![flag];
        frame.extend_from_slice(&(text.len() as u32).to_be_bytes());
        frame.extend_from_slice(text);
        frame
    }

    #[test]
    fn test_encode_frame_layout() {
        let frame = encode_frame(b"hello");

        assert_eq!(frame[0], frame_flags::DATA);
        assert_eq!(u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]), 5);
        assert_eq!(&frame[5..], b"hello");
    }

    #[test]
    fn test_encode_empty_payload() {
        assert_eq!(encode_frame(b"").as_ref(), &[0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_decode_returns_encoded_payload() {
        for payload in [&b"x"[..], b"hello world", &[0u8; 300][..], &[0xffu8, 0x00, 0x80][..]] {
            let frame = encode_frame(payload);
            assert_eq!(decode_frame(&frame).unwrap(), payload);
        }
    }

    #[test]
    fn test_decode_empty_payload_frame_is_error() {
        // An encoded empty payload comes back as the dedicated error kind,
        // which the projection layer decides how to treat.
        let frame = encode_frame(b"");
        let err = decode_frame(&frame).unwrap_err();
        assert_eq!(err.frame_error(), Some(&FrameError::EmptyMessagePayload));
        assert_eq!(err.raw().as_ref(), frame.as_ref());
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut raw = encode_frame(b"abc").to_vec();
        raw.extend_from_slice(&trailer_frame(0x80, b"grpc-status: 0\r\n"));
        assert_eq!(decode_frame(&raw).unwrap(), b"abc");
    }

    #[test]
    fn test_decode_empty_input() {
        let err = decode_frame(&[]).unwrap_err();
        assert_eq!(err.frame_error(), Some(&FrameError::EmptyFrame));
    }

    #[test]
    fn test_decode_short_frames() {
        for raw in [&[0x00][..], &[0x00, 0x00], &[0x00, 0x00, 0x00], &[0x00, 0x00, 0x00, 0x01]] {
            let err = decode_frame(raw).unwrap_err();
            assert_eq!(err.frame_error(), Some(&FrameError::ShortFrame { len: raw.len() }));
        }
        // Trailer flags need the header too.
        let err = decode_frame(&[0x80, 0x00]).unwrap_err();
        assert_eq!(err.frame_error(), Some(&FrameError::ShortFrame { len: 2 }));
    }

    #[test]
    fn test_decode_compressed_rejected() {
        for raw in [&[0x01][..], &[0x01, 0x00, 0x00], &[0x01, 0x00, 0x00, 0x00, 0x03, 1, 2, 3]] {
            let err = decode_frame(raw).unwrap_err();
            assert_eq!(err.frame_error(), Some(&FrameError::CompressedUnsupported));
        }
    }

    #[test]
    fn test_decode_trailer_frame() {
        let raw = trailer_frame(0x80, b"grpc-status: 5\ngrpc-message: not found\n");
        let err = decode_frame(&raw).unwrap_err();

        let status = err.status().expect("trailer frame should yield a status");
        assert_eq!(status.status(), "5");
        assert_eq!(status.message(), "not found");
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(err.raw().as_ref(), raw.as_slice());
    }

    #[test]
    fn test_any_other_flag_is_trailer() {
        for flag in [0x02, 0x7f, 0x80, 0xff] {
            let raw = trailer_frame(flag, b"grpc-status: 5\ngrpc-message: not found\n");
            let err = decode_frame(&raw).unwrap_err();
            assert_eq!(err.status().map(|s| s.status()), Some("5"));
        }
    }

    #[test]
    fn test_decode_truncated_payload() {
        let raw = [0x00, 0x00, 0x00, 0x00, 0x0a, 1, 2, 3];
        let err = decode_frame(&raw).unwrap_err();
        assert_eq!(
            err.frame_error(),
            Some(&FrameError::TruncatedPayload {
                declared: 10,
                available: 3,
            })
        );
    }

    #[test]
    fn test_header_limit() {
        let header = parse_frame_header(&[0x00, 0x00, 0x01, 0x00, 0x00]).unwrap();
        assert_eq!(header.length, 65536);
        assert_eq!(header.frame_len(), 65541);
        assert!(header.check_limit(65536).is_ok());
        assert_eq!(
            header.check_limit(1024),
            Err(FrameError::FrameTooLarge {
                len: 65536,
                limit: 1024,
            })
        );
    }
}
