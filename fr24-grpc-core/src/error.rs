//! Status codes and framing error types.
//!
//! This module provides the core error types used by the feed protocol:
//! - [`Code`]: gRPC status codes
//! - [`FrameError`]: Structural defects in a response byte stream
//! - [`ProtocolError`]: A framing defect or a remote-signalled status,
//!   together with the raw bytes that produced it

use std::str::FromStr;

use bytes::Bytes;

use crate::trailer::Status;

/// gRPC status codes, as carried in the `grpc-status` trailer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Code {
    Ok = 0,
    Canceled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Code {
    /// Get the string representation of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::Ok => "ok",
            Code::Canceled => "canceled",
            Code::Unknown => "unknown",
            Code::InvalidArgument => "invalid_argument",
            Code::DeadlineExceeded => "deadline_exceeded",
            Code::NotFound => "not_found",
            Code::AlreadyExists => "already_exists",
            Code::PermissionDenied => "permission_denied",
            Code::ResourceExhausted => "resource_exhausted",
            Code::FailedPrecondition => "failed_precondition",
            Code::Aborted => "aborted",
            Code::OutOfRange => "out_of_range",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal",
            Code::Unavailable => "unavailable",
            Code::DataLoss => "data_loss",
            Code::Unauthenticated => "unauthenticated",
        }
    }

    /// Map a numeric status onto a code. Values outside 0..=16 become
    /// [`Code::Unknown`].
    pub fn from_i32(value: i32) -> Code {
        match value {
            0 => Code::Ok,
            1 => Code::Canceled,
            2 => Code::Unknown,
            3 => Code::InvalidArgument,
            4 => Code::DeadlineExceeded,
            5 => Code::NotFound,
            6 => Code::AlreadyExists,
            7 => Code::PermissionDenied,
            8 => Code::ResourceExhausted,
            9 => Code::FailedPrecondition,
            10 => Code::Aborted,
            11 => Code::OutOfRange,
            12 => Code::Unimplemented,
            13 => Code::Internal,
            14 => Code::Unavailable,
            15 => Code::DataLoss,
            16 => Code::Unauthenticated,
            _ => Code::Unknown,
        }
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a [`Code`] from a string fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseCodeError(());

impl std::fmt::Display for ParseCodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown status code")
    }
}

impl std::error::Error for ParseCodeError {}

impl FromStr for Code {
    type Err = ParseCodeError;

    /// Accepts the decimal form used on the wire (`"5"`) as well as the
    /// snake_case name (`"not_found"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(n) = s.parse::<i32>() {
            return Ok(Code::from_i32(n));
        }
        match s {
            "ok" => Ok(Code::Ok),
            "canceled" | "cancelled" => Ok(Code::Canceled),
            "unknown" => Ok(Code::Unknown),
            "invalid_argument" => Ok(Code::InvalidArgument),
            "deadline_exceeded" => Ok(Code::DeadlineExceeded),
            "not_found" => Ok(Code::NotFound),
            "already_exists" => Ok(Code::AlreadyExists),
            "permission_denied" => Ok(Code::PermissionDenied),
            "resource_exhausted" => Ok(Code::ResourceExhausted),
            "failed_precondition" => Ok(Code::FailedPrecondition),
            "aborted" => Ok(Code::Aborted),
            "out_of_range" => Ok(Code::OutOfRange),
            "unimplemented" => Ok(Code::Unimplemented),
            "internal" => Ok(Code::Internal),
            "unavailable" => Ok(Code::Unavailable),
            "data_loss" => Ok(Code::DataLoss),
            "unauthenticated" => Ok(Code::Unauthenticated),
            _ => Err(ParseCodeError(())),
        }
    }
}

/// Structural defects in a frame.
///
/// These are local problems with the byte stream, as opposed to a status
/// the remote side chose to send.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// No bytes at all.
    #[error("empty DATA frame")]
    EmptyFrame,

    /// Fewer than the 5 header bytes.
    #[error("short frame: {len} bytes, need at least 5")]
    ShortFrame { len: usize },

    /// Flag byte `0x01`. Recognised but not implemented.
    #[error("message is compressed, not implemented")]
    CompressedUnsupported,

    /// A data frame whose length prefix is zero.
    #[error("empty message payload")]
    EmptyMessagePayload,

    /// The length prefix claims more bytes than are present.
    #[error("truncated payload: frame declares {declared} bytes, {available} available")]
    TruncatedPayload { declared: usize, available: usize },

    /// The length prefix exceeds the configured limit.
    #[error("frame of {len} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { len: usize, limit: usize },
}

impl FrameError {
    /// Whether this is one of the two shapes a legitimately empty result
    /// may take on the wire.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, FrameError::EmptyFrame | FrameError::EmptyMessagePayload)
    }
}

/// Failure to turn response bytes into a message payload.
///
/// Either the bytes were not a well-formed data frame, or they were a
/// trailer frame carrying a status. Both keep the raw bytes for diagnostics.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Malformed or unsupported frame.
    #[error("{error}")]
    Frame { error: FrameError, raw: Bytes },

    /// Trailer frame from the remote side.
    #[error("gRPC errored: {status}")]
    Status { status: Status, raw: Bytes },
}

impl ProtocolError {
    /// The bytes that failed to decode.
    pub fn raw(&self) -> &Bytes {
        match self {
            ProtocolError::Frame { raw, .. } | ProtocolError::Status { raw, .. } => raw,
        }
    }

    /// The framing defect, if this is one.
    pub fn frame_error(&self) -> Option<&FrameError> {
        match self {
            ProtocolError::Frame { error, .. } => Some(error),
            ProtocolError::Status { .. } => None,
        }
    }

    /// The trailer status, if this is one.
    pub fn status(&self) -> Option<&Status> {
        match self {
            ProtocolError::Status { status, .. } => Some(status),
            ProtocolError::Frame { .. } => None,
        }
    }

    pub(crate) fn frame(error: FrameError, raw: &[u8]) -> Self {
        ProtocolError::Frame {
            error,
            raw: Bytes::copy_from_slice(raw),
        }
    }
}
