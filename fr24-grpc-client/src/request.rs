//! Transport request building.
//!
//! Every feed call is a `POST` of exactly one data frame to
//! `<base_url>/<method>` with the grpc-web headers attached. Request and
//! subscription calls share this path; only what happens to the response
//! differs.

use bytes::Bytes;
use fr24_grpc_core::encode_frame;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Request};
use prost::Message;

use crate::ClientError;
use crate::config::ClientConfig;
use crate::transport::TransportBody;

/// Content type of every request.
pub const GRPC_WEB_CONTENT_TYPE: &str = "application/grpc-web+proto";

/// Value of `x-user-agent` identifying the grpc-web client library.
pub const GRPC_WEB_USER_AGENT: &str = "grpc-web-javascript/0.1";

pub const X_USER_AGENT: HeaderName = HeaderName::from_static("x-user-agent");
pub const X_GRPC_WEB: HeaderName = HeaderName::from_static("x-grpc-web");

/// Serialize `request` and wrap it in a data frame.
pub fn encode_request<Req: Message>(request: &Req) -> Result<Bytes, ClientError> {
    let payload = request.encode_to_vec();
    if u32::try_from(payload.len()).is_err() {
        return Err(ClientError::Encode(format!(
            "message of {} bytes exceeds the frame length limit",
            payload.len()
        )));
    }
    Ok(encode_frame(&payload))
}

/// Build the HTTP request carrying `frame` to `method`.
///
/// Header precedence, highest first: `call_headers`, the configured headers,
/// then the grpc-web and bearer headers, which are only filled in when no
/// one else set them.
pub fn build_request(
    config: &ClientConfig,
    method: &str,
    frame: Bytes,
    call_headers: &HeaderMap,
) -> Result<Request<TransportBody>, ClientError> {
    let url = config.method_url(method);
    let uri: http::Uri = url
        .parse()
        .map_err(|e| ClientError::Config(format!("invalid URL {:?}: {}", url, e)))?;

    let mut headers = config.headers().clone();
    merge_headers(&mut headers, call_headers);

    fill_absent(&mut headers, CONTENT_TYPE, HeaderValue::from_static(GRPC_WEB_CONTENT_TYPE));
    fill_absent(&mut headers, X_USER_AGENT, HeaderValue::from_static(GRPC_WEB_USER_AGENT));
    fill_absent(&mut headers, X_GRPC_WEB, HeaderValue::from_static("1"));
    if let Some(auth) = &config.authorization {
        fill_absent(&mut headers, AUTHORIZATION, auth.clone());
    }

    let mut request = Request::builder()
        .method(http::Method::POST)
        .uri(uri)
        .body(TransportBody::full(frame))
        .map_err(|e| ClientError::Config(format!("failed to build request: {}", e)))?;
    *request.headers_mut() = headers;
    Ok(request)
}

/// Overlay `overrides` onto `base`: a name present in `overrides` replaces
/// every value `base` had for it.
pub(crate) fn merge_headers(base: &mut HeaderMap, overrides: &HeaderMap) {
    for name in overrides.keys() {
        base.remove(name);
    }
    for (name, value) in overrides.iter() {
        base.append(name.clone(), value.clone());
    }
}

fn fill_absent(headers: &mut HeaderMap, name: HeaderName, value: HeaderValue) {
    headers.entry(name).or_insert(value);
}
