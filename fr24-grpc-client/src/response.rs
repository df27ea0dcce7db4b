//! Response projection.
//!
//! Turns a response body into a typed message: one pass through the frame
//! codec, then a protobuf decode of the payload. Also home to
//! [`FeedResponse`], the wrapper that keeps the response headers next to
//! the message.

use std::ops::Deref;

use bytes::Bytes;
use fr24_grpc_core::{GRPC_MESSAGE, GRPC_STATUS, GRPC_STATUS_DETAILS_BIN, Status, decode_frame};
use http::{HeaderMap, StatusCode};
use prost::Message;

use crate::ClientError;

/// A decoded response plus the HTTP headers it arrived with.
///
/// # Example
///
/// ```ignore
/// let response = client
///     .call_unary::<LiveFeedRequest, LiveFeedResponse>(Method::LiveFeed, &req)
///     .await?;
///
/// // Access fields directly via Deref
/// println!("{} flights", response.flights_list.len());
///
/// if let Some(server) = response.metadata().get("server") {
///     println!("served by {:?}", server);
/// }
/// let inner = response.into_inner();
/// ```
#[derive(Debug, Clone)]
pub struct FeedResponse<T> {
    inner: T,
    metadata: HeaderMap,
}

impl<T> FeedResponse<T> {
    pub fn new(inner: T, metadata: HeaderMap) -> Self {
        Self { inner, metadata }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Response headers.
    pub fn metadata(&self) -> &HeaderMap {
        &self.metadata
    }

    /// Transform the inner value, keeping the metadata.
    pub fn map<U, F>(self, f: F) -> FeedResponse<U>
    where
        F: FnOnce(T) -> U,
    {
        FeedResponse {
            inner: f(self.inner),
            metadata: self.metadata,
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_parts(self) -> (T, HeaderMap) {
        (self.inner, self.metadata)
    }
}

impl<T> Deref for FeedResponse<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl FeedResponse<Bytes> {
    /// Project the raw body into a message.
    ///
    /// See [`decode_unary`] for the meaning of `tolerate_empty`.
    pub fn decode<T>(self, tolerate_empty: bool) -> Result<FeedResponse<T>, ClientError>
    where
        T: Message + Default,
    {
        let message = decode_unary(&self.inner, tolerate_empty)?;
        Ok(FeedResponse::new(message, self.metadata))
    }
}

/// Decode a payload that has already been taken out of its frame.
///
/// `raw` is the complete frame, kept on the error for diagnostics.
pub fn decode_message<T>(payload: &[u8], raw: &[u8]) -> Result<T, ClientError>
where
    T: Message + Default,
{
    T::decode(payload).map_err(|e| ClientError::decode(e, raw))
}

/// Decode the body of a request/response call.
///
/// Only the first frame of `body` is examined. When `tolerate_empty` is
/// set, an empty body or a zero-length data frame decodes to `T::default()`
/// instead of failing; every other error is returned unchanged.
pub fn decode_unary<T>(body: &[u8], tolerate_empty: bool) -> Result<T, ClientError>
where
    T: Message + Default,
{
    match decode_frame(body) {
        Ok(payload) => decode_message(payload, body),
        Err(err)
            if tolerate_empty && err.frame_error().is_some_and(|e| e.is_empty_result()) =>
        {
            Ok(T::default())
        }
        Err(err) => Err(err.into()),
    }
}

/// Read a non-OK status carried in response headers.
///
/// Servers answer some failures with a headers-only response: the status
/// sits in the HTTP headers and the body is empty.
pub fn status_from_headers(headers: &HeaderMap) -> Option<Status> {
    let status = headers.get(GRPC_STATUS)?.to_str().ok()?.trim();
    if status.is_empty() || status == "0" {
        return None;
    }

    let message = headers
        .get(GRPC_MESSAGE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    // kept undecoded, as in a trailer frame
    let details = headers
        .get(GRPC_STATUS_DETAILS_BIN)
        .map(|v| Bytes::copy_from_slice(v.as_bytes()))
        .unwrap_or_default();

    Some(Status::new(status, message).with_details(details))
}

/// Check the response head before reading the body.
///
/// A header-carried status wins over the HTTP status code. A non-success
/// HTTP status without one is a transport failure.
pub fn check_response_head(status: StatusCode, headers: &HeaderMap) -> Result<(), ClientError> {
    if let Some(status) = status_from_headers(headers) {
        return Err(ClientError::Status {
            status,
            raw: Bytes::new(),
        });
    }
    if !status.is_success() {
        return Err(ClientError::Transport(format!(
            "unexpected HTTP status {}",
            status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fr24_grpc_core::{Code, FrameError, encode_frame};
    use http::HeaderValue;

    #[derive(Clone, PartialEq, prost::Message)]
    struct Flight {
        #[prost(uint32, tag = "1")]
        flight_id: u32,
        #[prost(string, tag = "2")]
        callsign: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    struct NearestFlightsResponse {
        #[prost(message, repeated, tag = "1")]
        flights_list: Vec<Flight>,
    }

    #[test]
    fn test_decode_unary_message() {
        let flight = Flight {
            flight_id: 42,
            callsign: "DLH4AB".into(),
        };
        let body = encode_frame(&flight.encode_to_vec());

        let decoded: Flight = decode_unary(&body, false).unwrap();
        assert_eq!(decoded, flight);
    }

    #[test]
    fn test_nearest_flights_empty_frame_is_empty_result() {
        let body = [0x00, 0x00, 0x00, 0x00, 0x00];
        let decoded: NearestFlightsResponse = decode_unary(&body, true).unwrap();
        assert!(decoded.flights_list.is_empty());

        let decoded: NearestFlightsResponse = decode_unary(&[], true).unwrap();
        assert!(decoded.flights_list.is_empty());
    }

    #[test]
    fn test_empty_frame_fails_for_other_methods() {
        let err = decode_unary::<NearestFlightsResponse>(&[0, 0, 0, 0, 0], false).unwrap_err();
        assert_eq!(err.frame_error(), Some(&FrameError::EmptyMessagePayload));

        let err = decode_unary::<NearestFlightsResponse>(&[], false).unwrap_err();
        assert_eq!(err.frame_error(), Some(&FrameError::EmptyFrame));
    }

    #[test]
    fn test_tolerance_does_not_hide_other_errors() {
        let err = decode_unary::<NearestFlightsResponse>(&[0x00, 0x00], true).unwrap_err();
        assert_eq!(err.frame_error(), Some(&FrameError::ShortFrame { len: 2 }));

        let trailer = b"\x80\x00\x00\x00\x10grpc-status: 16\n";
        let err = decode_unary::<NearestFlightsResponse>(trailer, true).unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);
    }

    #[test]
    fn test_bad_payload_is_decode_error() {
        // field 1, wire type 2, length 10, but only one byte follows
        let body = encode_frame(&[0x0a, 0x0a, 0x01]);
        let err = decode_unary::<NearestFlightsResponse>(&body, false).unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
        assert_eq!(err.raw(), Some(&body));
    }

    #[test]
    fn test_status_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(status_from_headers(&headers).is_none());

        headers.insert(GRPC_STATUS, HeaderValue::from_static("0"));
        assert!(status_from_headers(&headers).is_none());

        headers.insert(GRPC_STATUS, HeaderValue::from_static("7"));
        headers.insert(GRPC_MESSAGE, HeaderValue::from_static("no access"));
        headers.insert(GRPC_STATUS_DETAILS_BIN, HeaderValue::from_static("AQID"));
        let status = status_from_headers(&headers).unwrap();
        assert_eq!(status.code(), Code::PermissionDenied);
        assert_eq!(status.message(), "no access");
        assert_eq!(status.details().as_ref(), b"AQID");
    }

    #[test]
    fn test_details_match_between_headers_and_trailer() {
        let mut headers = HeaderMap::new();
        headers.insert(GRPC_STATUS, HeaderValue::from_static("3"));
        headers.insert(GRPC_STATUS_DETAILS_BIN, HeaderValue::from_static("AQID"));
        let from_headers = status_from_headers(&headers).unwrap();

        let text = b"grpc-status: 3\ngrpc-status-details-bin: AQID\n";
        let mut frame = vec![0x80];
        frame.extend_from_slice(&(text.len() as u32).to_be_bytes());
        frame.extend_from_slice(text);
        let err = decode_frame(&frame).unwrap_err();
        let from_trailer = err.status().unwrap();

        assert_eq!(from_headers.details(), from_trailer.details());
        assert_eq!(from_headers.code(), from_trailer.code());
    }

    #[test]
    fn test_check_response_head() {
        assert!(check_response_head(StatusCode::OK, &HeaderMap::new()).is_ok());

        let err = check_response_head(StatusCode::BAD_GATEWAY, &HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));

        let mut headers = HeaderMap::new();
        headers.insert(GRPC_STATUS, HeaderValue::from_static("14"));
        let err = check_response_head(StatusCode::OK, &headers).unwrap_err();
        assert_eq!(err.code(), Code::Unavailable);
    }

    #[test]
    fn test_feed_response_accessors() {
        let mut headers = HeaderMap::new();
        headers.insert("x-served-by", HeaderValue::from_static("edge-1"));
        let response = FeedResponse::new(7u32, headers);

        assert_eq!(*response, 7);
        assert_eq!(response.metadata()["x-served-by"], "edge-1");
        let doubled = response.map(|n| n * 2);
        assert_eq!(doubled.into_inner(), 14);
    }
}
