//! Client builder.
//!
//! Provides a fluent API for configuring and building a [`FeedClient`].

use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::ClientError;
use crate::client::FeedClient;
use crate::config::{
    ClientConfig, DEFAULT_BASE_URL, DEFAULT_MAX_FRAME_SIZE, DEFAULT_PLATFORM_VERSION,
    DEFAULT_STREAM_BUFFER, DEFAULT_TIMEOUT, new_device_id,
};
use crate::transport::{HyperTransport, HyperTransportBuilder, TlsClientConfig};

/// Builder for creating a [`FeedClient`].
///
/// Every setting has a default, so `ClientBuilder::new().build()` gives an
/// anonymous client with a fresh device identity.
///
/// # Example
///
/// ```ignore
/// use fr24_grpc_client::ClientBuilder;
/// use std::time::Duration;
///
/// let client = ClientBuilder::new()
///     .access_token(token)
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// ```
pub struct ClientBuilder {
    base_url: String,
    timeout: Duration,
    device_id: Option<String>,
    access_token: Option<String>,
    platform_version: String,
    headers: HeaderMap,
    invalid_header: Option<String>,
    max_frame_size: usize,
    stream_buffer: usize,
    transport: Option<HyperTransport>,
    transport_builder: HyperTransportBuilder,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("device_id", &self.device_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("platform_version", &self.platform_version)
            .field("header_count", &self.headers.len())
            .field("max_frame_size", &self.max_frame_size)
            .field("stream_buffer", &self.stream_buffer)
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            device_id: None,
            access_token: None,
            platform_version: DEFAULT_PLATFORM_VERSION.to_string(),
            headers: HeaderMap::new(),
            invalid_header: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            stream_buffer: DEFAULT_STREAM_BUFFER,
            transport: None,
            transport_builder: HyperTransportBuilder::new(),
        }
    }

    /// Point the client at another service root, e.g. a local test server.
    ///
    /// Method names are appended after a `/`; a trailing slash is ignored.
    pub fn base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.base_url = url.into();
        self
    }

    /// Timeout for request/response calls.
    ///
    /// Subscriptions ignore it; give them a deadline through
    /// [`CallOptions::timeout`](crate::CallOptions::timeout) instead.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a fixed device identity instead of a generated one.
    ///
    /// An empty string omits the `fr24-device-id` header.
    pub fn device_id<S: Into<String>>(mut self, device_id: S) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Authenticate with a bearer token.
    pub fn access_token<S: Into<String>>(mut self, token: S) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Web client version sent as `fr24-platform: web-<version>`.
    pub fn platform_version<S: Into<String>>(mut self, version: S) -> Self {
        self.platform_version = version.into();
        self
    }

    /// Add a header to every request, replacing a built-in default of the
    /// same name.
    ///
    /// An invalid name or value is reported by [`build`](Self::build).
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: std::fmt::Display,
        V: TryInto<HeaderValue>,
        V::Error: std::fmt::Display,
    {
        if self.invalid_header.is_some() {
            return self;
        }
        match (name.try_into(), value.try_into()) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            (Err(e), _) => self.invalid_header = Some(format!("invalid header name: {}", e)),
            (_, Err(e)) => self.invalid_header = Some(format!("invalid header value: {}", e)),
        }
        self
    }

    /// Reject frames declaring a payload larger than `limit` bytes.
    ///
    /// Request/response bodies are capped at one such frame plus its
    /// trailer.
    ///
    /// Default: 16 MiB.
    pub fn max_frame_size(mut self, limit: usize) -> Self {
        self.max_frame_size = limit;
        self
    }

    /// Frames buffered per subscription before the reader waits for the
    /// consumer.
    ///
    /// Default: 8.
    pub fn stream_buffer(mut self, capacity: usize) -> Self {
        self.stream_buffer = capacity;
        self
    }

    /// Use a custom TLS configuration.
    pub fn tls_config(mut self, config: TlsClientConfig) -> Self {
        self.transport_builder = self.transport_builder.tls_config(config);
        self
    }

    /// Speak HTTP/2 without negotiation.
    pub fn http2_only(mut self, enabled: bool) -> Self {
        self.transport_builder = self.transport_builder.http2_only(enabled);
        self
    }

    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.transport_builder = self.transport_builder.pool_idle_timeout(timeout);
        self
    }

    /// Send HTTP/2 keep-alive pings at `interval`, failing the connection
    /// when one is not acknowledged within `timeout`.
    pub fn h2_keep_alive(mut self, interval: Duration, timeout: Duration) -> Self {
        self.transport_builder = self
            .transport_builder
            .h2_keep_alive_interval(interval)
            .h2_keep_alive_timeout(timeout);
        self
    }

    /// Share an existing transport (and its connection pool).
    ///
    /// Transport settings on this builder are ignored when one is given.
    pub fn transport(mut self, transport: HyperTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub(crate) fn build_config(&mut self) -> Result<ClientConfig, ClientError> {
        if let Some(err) = self.invalid_header.take() {
            return Err(ClientError::Config(err));
        }
        let device_id = self.device_id.take().unwrap_or_else(new_device_id);

        ClientConfig::new(
            std::mem::take(&mut self.base_url),
            self.timeout,
            device_id,
            std::mem::take(&mut self.platform_version),
            self.access_token.as_deref(),
            std::mem::take(&mut self.headers),
            self.max_frame_size,
            self.stream_buffer,
        )
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if a header, the token or the URL is
    /// invalid, or if no TLS configuration can be assembled.
    pub fn build(mut self) -> Result<FeedClient, ClientError> {
        let config = self.build_config()?;
        config
            .method_url("")
            .parse::<http::Uri>()
            .map_err(|e| {
                ClientError::Config(format!("invalid base URL {:?}: {}", config.base_url(), e))
            })?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => self.transport_builder.build()?,
        };

        Ok(FeedClient::new(transport, config))
    }
}
