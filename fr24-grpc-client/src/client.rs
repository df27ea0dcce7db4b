//! Feed client implementation.
//!
//! This module provides [`FeedClient`], the entry point for request/response
//! calls and subscriptions.

use std::sync::Arc;

use bytes::Bytes;
use fr24_grpc_core::FRAME_HEADER_SIZE;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use prost::Message;
use tokio::time::Instant;

#[cfg(feature = "tracing")]
use tracing::{Instrument, info_span};

use crate::ClientError;
use crate::builder::ClientBuilder;
use crate::config::ClientConfig;
use crate::method::Method;
use crate::options::CallOptions;
use crate::request::{build_request, encode_request};
use crate::response::{FeedResponse, check_response_head};
use crate::streaming::{self, StreamHandle, Streaming, body_stream};
use crate::transport::HyperTransport;

/// Client for the feed service.
///
/// Cheap to clone; clones share the connection pool and the configuration,
/// which is immutable once built. Calls may run concurrently.
///
/// Methods are named either by [`Method`] or by their wire name.
///
/// # Example
///
/// ```ignore
/// use fr24_grpc_client::{FeedClient, Method};
///
/// let client = FeedClient::builder().build()?;
///
/// let nearby = client
///     .call_unary::<_, NearestFlightsResponse>(Method::NearestFlights, &request)
///     .await?;
/// println!("{} flights nearby", nearby.flights_list.len());
/// ```
#[derive(Debug, Clone)]
pub struct FeedClient {
    transport: HyperTransport,
    config: Arc<ClientConfig>,
}

impl FeedClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn new(transport: HyperTransport, config: ClientConfig) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &HyperTransport {
        &self.transport
    }

    /// Make a request/response call.
    ///
    /// The call is bounded by the client timeout. For `NearestFlights` an
    /// empty answer decodes to `Res::default()`.
    pub async fn call_unary<Req, Res>(
        &self,
        method: impl AsRef<str>,
        request: &Req,
    ) -> Result<FeedResponse<Res>, ClientError>
    where
        Req: Message,
        Res: Message + Default,
    {
        self.call_unary_with_options(method, request, CallOptions::new())
            .await
    }

    /// Make a request/response call with per-call options.
    pub async fn call_unary_with_options<Req, Res>(
        &self,
        method: impl AsRef<str>,
        request: &Req,
        options: CallOptions,
    ) -> Result<FeedResponse<Res>, ClientError>
    where
        Req: Message,
        Res: Message + Default,
    {
        let method = method.as_ref();
        let frame = encode_request(request)?;
        let response = self.call_raw(method, frame, &options).await?;
        response.decode(tolerates_empty_result(method))
    }

    /// Send an already framed request and return the raw response body.
    ///
    /// The body is returned as received; decode it with
    /// [`FeedResponse::decode`] or [`decode_unary`](crate::decode_unary).
    pub async fn call_raw(
        &self,
        method: &str,
        frame: Bytes,
        options: &CallOptions,
    ) -> Result<FeedResponse<Bytes>, ClientError> {
        let call = self.exchange(method, frame, options);

        #[cfg(feature = "tracing")]
        let call = call.instrument(info_span!(
            "rpc.call",
            rpc.method = %method,
            rpc.type = "unary",
            otel.kind = "client",
        ));

        call.await
    }

    async fn exchange(
        &self,
        method: &str,
        frame: Bytes,
        options: &CallOptions,
    ) -> Result<FeedResponse<Bytes>, ClientError> {
        let request = build_request(&self.config, method, frame, &options.headers)?;
        let timeout = options.timeout.unwrap_or(self.config.timeout);

        let roundtrip = async {
            let response = self.transport.request(request).await?;
            let (parts, body) = response.into_parts();
            check_response_head(parts.status, &parts.headers)?;

            let limit = unary_body_limit(self.config.max_frame_size);
            let body = Limited::new(body, limit)
                .collect()
                .await
                .map_err(|e| {
                    if e.is::<LengthLimitError>() {
                        ClientError::Transport(format!("response body exceeds {} bytes", limit))
                    } else {
                        ClientError::Transport(format!("failed to read response body: {}", e))
                    }
                })?
                .to_bytes();
            Ok::<_, ClientError>(FeedResponse::new(body, parts.headers))
        };

        let bounded = async {
            match tokio::time::timeout(timeout, roundtrip).await {
                Ok(result) => result,
                Err(_) => Err(ClientError::Transport(format!(
                    "request timed out after {:?}",
                    timeout
                ))),
            }
        };

        match &options.cancel {
            Some(signal) => tokio::select! {
                biased;
                _ = signal.cancelled() => Err(ClientError::Transport("call cancelled".into())),
                result = bounded => result,
            },
            None => bounded.await,
        }
    }

    /// Open a subscription and return a handle yielding raw payloads.
    ///
    /// No timeout applies; the subscription lasts until the server ends it,
    /// the handle is cancelled or dropped, the [`CancelSignal`] in `options`
    /// fires, or the deadline set with [`CallOptions::timeout`] passes.
    ///
    /// [`CancelSignal`]: crate::CancelSignal
    pub async fn open_stream<Req>(
        &self,
        method: impl AsRef<str>,
        request: &Req,
        options: CallOptions,
    ) -> Result<StreamHandle, ClientError>
    where
        Req: Message,
    {
        let frame = encode_request(request)?;
        self.open_raw_stream(method.as_ref(), frame, options).await
    }

    /// Open a subscription from an already framed request.
    pub async fn open_raw_stream(
        &self,
        method: &str,
        frame: Bytes,
        options: CallOptions,
    ) -> Result<StreamHandle, ClientError> {
        let open = self.subscribe(method, frame, options);

        #[cfg(feature = "tracing")]
        let open = open.instrument(info_span!(
            "rpc.call",
            rpc.method = %method,
            rpc.type = "server_stream",
            otel.kind = "client",
        ));

        open.await
    }

    async fn subscribe(
        &self,
        method: &str,
        frame: Bytes,
        options: CallOptions,
    ) -> Result<StreamHandle, ClientError> {
        let deadline = options.timeout.map(|t| Instant::now() + t);
        let request = build_request(&self.config, method, frame, &options.headers)?;

        let connect = async {
            let response = self.transport.request(request).await?;
            let (parts, body) = response.into_parts();
            check_response_head(parts.status, &parts.headers)?;
            Ok::<_, ClientError>((parts.headers, body))
        };

        let bounded = async {
            match deadline {
                Some(at) => match tokio::time::timeout_at(at, connect).await {
                    Ok(opened) => opened,
                    Err(_) => Err(ClientError::Transport(
                        "deadline passed before the stream opened".into(),
                    )),
                },
                None => connect.await,
            }
        };

        let (headers, body): (http::HeaderMap, Incoming) = match &options.cancel {
            Some(signal) => tokio::select! {
                biased;
                _ = signal.cancelled() => {
                    return Err(ClientError::Transport("stream cancelled before it opened".into()));
                }
                opened = bounded => opened?,
            },
            None => bounded.await?,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(deadline = ?options.timeout, "stream opened");

        Ok(streaming::spawn(
            body_stream(body),
            headers,
            self.config.stream_buffer,
            self.config.max_frame_size,
            options.cancel,
            deadline,
        ))
    }

    /// Open a subscription yielding decoded messages.
    pub async fn call_server_stream<Req, Res>(
        &self,
        method: impl AsRef<str>,
        request: &Req,
    ) -> Result<Streaming<Res>, ClientError>
    where
        Req: Message,
        Res: Message + Default,
    {
        self.call_server_stream_with_options(method, request, CallOptions::new())
            .await
    }

    pub async fn call_server_stream_with_options<Req, Res>(
        &self,
        method: impl AsRef<str>,
        request: &Req,
        options: CallOptions,
    ) -> Result<Streaming<Res>, ClientError>
    where
        Req: Message,
        Res: Message + Default,
    {
        let handle = self.open_stream(method, request, options).await?;
        Ok(handle.typed())
    }
}

/// Room left after the data frame for the trailer frame that follows it.
const TRAILER_ALLOWANCE: usize = 16 * 1024;

/// Largest unary body accepted: one data frame of `max_frame_size` plus its
/// trailer.
fn unary_body_limit(max_frame_size: usize) -> usize {
    max_frame_size
        .saturating_add(FRAME_HEADER_SIZE)
        .saturating_add(TRAILER_ALLOWANCE)
}

fn tolerates_empty_result(method: &str) -> bool {
    let name = method.rsplit('/').next().unwrap_or(method);
    name.parse::<Method>()
        .is_ok_and(|method| method.tolerates_empty_result())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_result_tolerance_by_name() {
        assert!(tolerates_empty_result("NearestFlights"));
        assert!(tolerates_empty_result("/NearestFlights"));
        assert!(tolerates_empty_result("fr24.feed.api.v1.Feed/NearestFlights"));
        assert!(!tolerates_empty_result("LiveFeed"));
        assert!(!tolerates_empty_result("nearestflights"));
    }

    #[test]
    fn test_unary_body_limit() {
        assert_eq!(unary_body_limit(1024), 1024 + 5 + 16 * 1024);
        assert_eq!(unary_body_limit(usize::MAX), usize::MAX);
    }

    #[test]
    fn test_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FeedClient>();
        assert_send_sync::<StreamHandle>();
    }
}
