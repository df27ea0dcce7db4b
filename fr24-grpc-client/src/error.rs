//! Client-side error types.
//!
//! This module provides [`ClientError`], the error type for every feed call.

use bytes::Bytes;
use fr24_grpc_core::{Code, FrameError, ProtocolError, Status};

/// Errors produced by feed calls and subscriptions.
///
/// The variants keep "the protocol broke" ([`Frame`](ClientError::Frame)),
/// "the server said no" ([`Status`](ClientError::Status)) and "the schema
/// does not match" ([`Decode`](ClientError::Decode)) apart. None of them
/// are retried internally.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ClientError {
    /// Structural defect in the response frame.
    #[error("frame error: {error}")]
    Frame { error: FrameError, raw: Bytes },

    /// A status sent by the remote side in a trailer frame or in the
    /// response headers.
    #[error("gRPC errored: {status}")]
    Status { status: Status, raw: Bytes },

    /// The payload was framed correctly but is not a valid message.
    #[error("decode error: {message}")]
    Decode { message: String, raw: Bytes },

    /// The request message could not be framed.
    #[error("encode error: {0}")]
    Encode(String),

    /// Transport-level error (connection failed, timeout, etc.).
    #[error("transport error: {0}")]
    Transport(String),

    /// The client or request could not be built from the given settings.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Get the status code this error corresponds to.
    ///
    /// For non-Status variants, returns an appropriate code:
    /// - Transport: `Unavailable`
    /// - Frame/Encode/Decode: `Internal`
    /// - Config: `InvalidArgument`
    pub fn code(&self) -> Code {
        match self {
            ClientError::Status { status, .. } => status.code(),
            ClientError::Transport(_) => Code::Unavailable,
            ClientError::Config(_) => Code::InvalidArgument,
            ClientError::Frame { .. } | ClientError::Decode { .. } | ClientError::Encode(_) => {
                Code::Internal
            }
        }
    }

    /// The remote status, for [`ClientError::Status`].
    pub fn status(&self) -> Option<&Status> {
        match self {
            ClientError::Status { status, .. } => Some(status),
            _ => None,
        }
    }

    /// The framing defect, for [`ClientError::Frame`].
    pub fn frame_error(&self) -> Option<&FrameError> {
        match self {
            ClientError::Frame { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The bytes that triggered the error, when there were any.
    pub fn raw(&self) -> Option<&Bytes> {
        match self {
            ClientError::Frame { raw, .. }
            | ClientError::Status { raw, .. }
            | ClientError::Decode { raw, .. } => Some(raw),
            ClientError::Encode(_) | ClientError::Transport(_) | ClientError::Config(_) => None,
        }
    }

    pub(crate) fn decode(err: prost::DecodeError, raw: &[u8]) -> Self {
        ClientError::Decode {
            message: format!("failed to parse message: {}", err),
            raw: Bytes::copy_from_slice(raw),
        }
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Frame { error, raw } => ClientError::Frame { error, raw },
            ProtocolError::Status { status, raw } => ClientError::Status { status, raw },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fr24_grpc_core::decode_frame;

    #[test]
    fn test_client_error_variants_code() {
        let status = ClientError::Status {
            status: Status::new("5", "not found"),
            raw: Bytes::new(),
        };
        assert_eq!(status.code(), Code::NotFound);

        let transport = ClientError::Transport("connection refused".into());
        assert_eq!(transport.code(), Code::Unavailable);

        let frame = ClientError::Frame {
            error: FrameError::ShortFrame { len: 2 },
            raw: Bytes::from_static(&[0, 0]),
        };
        assert_eq!(frame.code(), Code::Internal);

        let decode = ClientError::Decode {
            message: "bad varint".into(),
            raw: Bytes::new(),
        };
        assert_eq!(decode.code(), Code::Internal);
    }

    #[test]
    fn test_from_protocol_error_keeps_kind_and_raw() {
        let err: ClientError = decode_frame(&[0x01, 0x00]).unwrap_err().into();
        assert_eq!(err.frame_error(), Some(&FrameError::CompressedUnsupported));
        assert_eq!(err.raw().map(|b| b.as_ref()), Some(&[0x01, 0x00][..]));

        let trailer = b"\x80\x00\x00\x00\x0egrpc-status: 7";
        let err: ClientError = decode_frame(trailer).unwrap_err().into();
        assert_eq!(err.code(), Code::PermissionDenied);
        assert_eq!(err.status().map(|s| s.status()), Some("7"));
    }

    #[test]
    fn test_transport_has_no_raw() {
        assert!(ClientError::Transport("reset".into()).raw().is_none());
    }
}
