//! Trailer frame parsing.
//!
//! grpc-web has no HTTP trailers to lean on, so the server appends a frame
//! whose flag byte is non-zero and whose payload is plain text:
//!
//! ```text
//! grpc-status: 5\r\n
//! grpc-message: not found\r\n
//! ```
//!
//! [`TrailerSet::parse`] extracts the recognised keys and [`Status`] is the
//! value handed to callers.

use bytes::Bytes;

use crate::error::Code;

/// Trailer key carrying the numeric status.
pub const GRPC_STATUS: &str = "grpc-status";
/// Trailer key carrying the human-readable message.
pub const GRPC_MESSAGE: &str = "grpc-message";
/// Trailer key carrying an opaque detail blob.
pub const GRPC_STATUS_DETAILS_BIN: &str = "grpc-status-details-bin";

/// The recognised `key: value` lines of one trailer frame.
///
/// Unrecognised keys are dropped during parsing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrailerSet {
    pub status: Option<String>,
    pub message: Option<String>,
    pub details: Option<Bytes>,
}

impl TrailerSet {
    /// Parse newline-separated `key: value` lines.
    ///
    /// Keys match case-insensitively. Lines without a colon, or with a key
    /// that is not one of the three recognised ones, are skipped.
    pub fn parse(payload: &[u8]) -> Self {
        let mut trailers = TrailerSet::default();

        for line in payload.split(|b| *b == b'\n') {
            let line = line.trim_ascii();
            let Some(colon) = line.iter().position(|b| *b == b':') else {
                continue;
            };
            let (key, value) = (&line[..colon], line[colon + 1..].trim_ascii());

            if key.eq_ignore_ascii_case(GRPC_STATUS.as_bytes()) {
                trailers.status = Some(String::from_utf8_lossy(value).into_owned());
            } else if key.eq_ignore_ascii_case(GRPC_MESSAGE.as_bytes()) {
                trailers.message = Some(String::from_utf8_lossy(value).into_owned());
            } else if key.eq_ignore_ascii_case(GRPC_STATUS_DETAILS_BIN.as_bytes()) {
                trailers.details = Some(Bytes::copy_from_slice(value));
            }
        }

        trailers
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.message.is_none() && self.details.is_none()
    }
}

/// A status reported by the remote side.
///
/// The status text is passed through verbatim; [`Status::code`] is a
/// convenience view over it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Status {
    status: String,
    message: String,
    details: Bytes,
}

impl Status {
    pub fn new(status: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            message: message.into(),
            details: Bytes::new(),
        }
    }

    pub fn with_details(mut self, details: Bytes) -> Self {
        self.details = details;
        self
    }

    /// The raw `grpc-status` text, e.g. `"5"`. Empty if the trailer had none.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// The `grpc-message` text. Empty if the trailer had none.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The undecoded `grpc-status-details-bin` value.
    pub fn details(&self) -> &Bytes {
        &self.details
    }

    /// The status text as a [`Code`]. A missing or unparseable status is
    /// [`Code::Unknown`].
    pub fn code(&self) -> Code {
        self.status.parse().unwrap_or(Code::Unknown)
    }

    /// Whether the remote side reported success.
    pub fn is_ok(&self) -> bool {
        self.code() == Code::Ok && !self.status.is_empty()
    }
}

impl From<TrailerSet> for Status {
    fn from(trailers: TrailerSet) -> Self {
        Self {
            status: trailers.status.unwrap_or_default(),
            message: trailers.message.unwrap_or_default(),
            details: trailers.details.unwrap_or_default(),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "status={} message={}", self.status, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_and_message() {
        let trailers = TrailerSet::parse(b"grpc-status: 5\ngrpc-message: not found\n");
        assert_eq!(trailers.status.as_deref(), Some("5"));
        assert_eq!(trailers.message.as_deref(), Some("not found"));
        assert!(trailers.details.is_none());
    }

    #[test]
    fn test_parse_crlf_and_mixed_case() {
        let trailers = TrailerSet::parse(b"Grpc-Status: 14\r\nGRPC-MESSAGE: upstream down\r\n");
        assert_eq!(trailers.status.as_deref(), Some("14"));
        assert_eq!(trailers.message.as_deref(), Some("upstream down"));
    }

    #[test]
    fn test_parse_skips_unknown_and_garbage_lines() {
        let trailers = TrailerSet::parse(b"x-envoy-upstream: 3\nno colon here\n\ngrpc-status:7");
        assert_eq!(trailers.status.as_deref(), Some("7"));
        assert!(trailers.message.is_none());
    }

    #[test]
    fn test_parse_details_kept_opaque() {
        let trailers = TrailerSet::parse(b"grpc-status: 3\ngrpc-status-details-bin: CAMSBGJhZA\n");
        assert_eq!(trailers.details.as_deref(), Some(&b"CAMSBGJhZA"[..]));
    }

    #[test]
    fn test_message_value_may_contain_colons() {
        let trailers = TrailerSet::parse(b"grpc-message: bad request: missing id");
        assert_eq!(trailers.message.as_deref(), Some("bad request: missing id"));
    }

    #[test]
    fn test_status_from_trailers() {
        let status = Status::from(TrailerSet::parse(b"grpc-status: 5\ngrpc-message: not found"));
        assert_eq!(status.status(), "5");
        assert_eq!(status.message(), "not found");
        assert_eq!(status.code(), Code::NotFound);
        assert!(!status.is_ok());
        assert_eq!(status.to_string(), "status=5 message=not found");
    }

    #[test]
    fn test_missing_status_is_not_ok() {
        let status = Status::from(TrailerSet::default());
        assert_eq!(status.code(), Code::Unknown);
        assert!(!status.is_ok());
        assert!(Status::new("0", "").is_ok());
    }
}
