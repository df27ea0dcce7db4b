//! Immutable client configuration.
//!
//! [`ClientConfig`] is assembled once by [`ClientBuilder`](crate::ClientBuilder)
//! and shared read-only by every call made through the client. Device
//! identity, credentials and the browser-style default headers all live
//! here instead of in process-wide state.

use std::time::Duration;

use base64::Engine;
use http::header::{ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, ORIGIN, REFERER, TE, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::ClientError;
use crate::request::merge_headers;

/// Endpoint of the feed service; method names are appended to it.
pub const DEFAULT_BASE_URL: &str = "https://data-feed.flightradar24.com/fr24.feed.api.v1.Feed";

/// Timeout for request/response calls. Subscriptions never use it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Web client version reported in `fr24-platform`.
pub const DEFAULT_PLATFORM_VERSION: &str = "25.197.0927";

/// Largest payload a single frame may declare.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Frames buffered between a subscription's reader and its consumer.
pub const DEFAULT_STREAM_BUFFER: usize = 8;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:136.0) Gecko/20100101 Firefox/136.0";

/// Header carrying the device identity.
pub const FR24_DEVICE_ID: HeaderName = HeaderName::from_static("fr24-device-id");
/// Header carrying the web client version.
pub const FR24_PLATFORM: HeaderName = HeaderName::from_static("fr24-platform");

/// How the client identifies itself to the feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMode {
    /// A bearer token is attached to every request.
    Bearer,
    /// Only the device identity is sent.
    Anonymous,
}

/// Settings shared by all calls of one client.
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) base_url: String,
    pub(crate) timeout: Duration,
    pub(crate) device_id: String,
    pub(crate) platform_version: String,
    /// Prebuilt `authorization` value, present when a token was supplied.
    pub(crate) authorization: Option<HeaderValue>,
    /// Defaults plus builder-supplied headers, validated once.
    pub(crate) headers: HeaderMap,
    pub(crate) max_frame_size: usize,
    pub(crate) stream_buffer: usize,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("device_id", &self.device_id)
            .field("platform_version", &self.platform_version)
            .field("auth_mode", &self.auth_mode())
            .field("max_frame_size", &self.max_frame_size)
            .field("stream_buffer", &self.stream_buffer)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    /// Assemble a configuration, validating every string that ends up in a
    /// header.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        base_url: String,
        timeout: Duration,
        device_id: String,
        platform_version: String,
        access_token: Option<&str>,
        extra_headers: HeaderMap,
        max_frame_size: usize,
        stream_buffer: usize,
    ) -> Result<Self, ClientError> {
        if stream_buffer == 0 {
            return Err(ClientError::Config("stream buffer must hold at least one frame".into()));
        }

        let authorization = access_token
            .filter(|token| !token.is_empty())
            .map(|token| {
                let mut value =
                    HeaderValue::try_from(format!("Bearer {}", token)).map_err(|_| {
                        ClientError::Config("access token is not a valid header value".into())
                    })?;
                value.set_sensitive(true);
                Ok::<_, ClientError>(value)
            })
            .transpose()?;

        let mut headers = default_headers(&device_id, &platform_version)?;
        merge_headers(&mut headers, &extra_headers);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            device_id,
            platform_version,
            authorization,
            headers,
            max_frame_size,
            stream_buffer,
        })
    }

    /// Base URL that method names are appended to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Timeout applied to request/response calls.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn platform_version(&self) -> &str {
        &self.platform_version
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Capacity of the delivery channel of each subscription.
    pub fn stream_buffer(&self) -> usize {
        self.stream_buffer
    }

    /// Headers sent with every request before per-call overrides.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn auth_mode(&self) -> AuthMode {
        if self.authorization.is_some() {
            AuthMode::Bearer
        } else {
            AuthMode::Anonymous
        }
    }

    /// Full URL of `method`.
    pub fn method_url(&self, method: &str) -> String {
        let method = method.strip_prefix('/').unwrap_or(method);
        format!("{}/{}", self.base_url, method)
    }
}

/// Generate a random web device identity: `web-` followed by 32 random
/// bytes in unpadded URL-safe base64.
pub fn new_device_id() -> String {
    let bytes: [u8; 32] = rand::random();
    format!(
        "web-{}",
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    )
}

/// The header set a browser on the FR24 site sends to the feed.
fn default_headers(device_id: &str, platform_version: &str) -> Result<HeaderMap, ClientError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(ORIGIN, HeaderValue::from_static("https://www.flightradar24.com"));
    headers.insert(REFERER, HeaderValue::from_static("https://www.flightradar24.com/"));
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("empty"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("cors"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("same-site"),
    );
    headers.insert(TE, HeaderValue::from_static("trailers"));
    headers.insert(HeaderName::from_static("dnt"), HeaderValue::from_static("1"));
    headers.insert(
        HeaderName::from_static("x-envoy-retry-grpc-on"),
        HeaderValue::from_static("unavailable"),
    );

    let platform = HeaderValue::try_from(format!("web-{}", platform_version)).map_err(|_| {
        ClientError::Config(format!("invalid platform version {:?}", platform_version))
    })?;
    headers.insert(FR24_PLATFORM, platform);

    if !device_id.is_empty() {
        let device = HeaderValue::from_str(device_id)
            .map_err(|_| ClientError::Config(format!("invalid device id {:?}", device_id)))?;
        headers.insert(FR24_DEVICE_ID, device);
    }

    debug_assert!(!headers.contains_key(AUTHORIZATION));
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>, extra: HeaderMap) -> Result<ClientConfig, ClientError> {
        ClientConfig::new(
            DEFAULT_BASE_URL.to_string(),
            DEFAULT_TIMEOUT,
            "web-test".to_string(),
            DEFAULT_PLATFORM_VERSION.to_string(),
            token,
            extra,
            DEFAULT_MAX_FRAME_SIZE,
            DEFAULT_STREAM_BUFFER,
        )
    }

    #[test]
    fn test_device_id_shape() {
        let id = new_device_id();
        let encoded = id.strip_prefix("web-").unwrap();
        // 32 bytes -> 43 base64 characters without padding
        assert_eq!(encoded.len(), 43);
        assert!(encoded.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(new_device_id(), id);
    }

    #[test]
    fn test_default_headers() {
        let config = config(None, HeaderMap::new()).unwrap();
        let headers = config.headers();
        assert_eq!(headers[FR24_DEVICE_ID], "web-test");
        assert_eq!(headers[FR24_PLATFORM], "web-25.197.0927");
        assert_eq!(headers[ACCEPT], "*/*");
        assert_eq!(headers["x-envoy-retry-grpc-on"], "unavailable");
        assert!(!headers.contains_key(AUTHORIZATION));
        assert_eq!(config.auth_mode(), AuthMode::Anonymous);
    }

    #[test]
    fn test_extra_headers_replace_defaults() {
        let mut extra = HeaderMap::new();
        extra.insert(USER_AGENT, HeaderValue::from_static("feed-tests/1.0"));
        extra.insert("x-trace", HeaderValue::from_static("abc"));

        let config = config(None, extra).unwrap();
        assert_eq!(config.headers().get_all(USER_AGENT).iter().count(), 1);
        assert_eq!(config.headers()[USER_AGENT], "feed-tests/1.0");
        assert_eq!(config.headers()["x-trace"], "abc");
    }

    #[test]
    fn test_token_sets_bearer_mode() {
        let config = config(Some("tok123"), HeaderMap::new()).unwrap();
        assert_eq!(config.auth_mode(), AuthMode::Bearer);
        assert_eq!(config.authorization.as_ref().unwrap(), "Bearer tok123");
        assert!(config.authorization.as_ref().unwrap().is_sensitive());
    }

    #[test]
    fn test_empty_token_is_anonymous() {
        let config = config(Some(""), HeaderMap::new()).unwrap();
        assert_eq!(config.auth_mode(), AuthMode::Anonymous);
    }

    #[test]
    fn test_invalid_token_rejected() {
        let err = config(Some("bad\ntoken"), HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn test_method_url() {
        let config = config(None, HeaderMap::new()).unwrap();
        assert_eq!(
            config.method_url("LiveFeed"),
            "https://data-feed.flightradar24.com/fr24.feed.api.v1.Feed/LiveFeed"
        );
        assert_eq!(config.method_url("/LiveFeed"), config.method_url("LiveFeed"));
    }
}
