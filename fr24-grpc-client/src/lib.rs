//! grpc-web client for the FR24 data feed.
//!
//! The feed speaks grpc-web over plain HTTP POST: every request body is one
//! length-prefixed frame, and responses carry data frames followed by a
//! trailer frame with the call status. This crate provides:
//!
//! - request/response calls with a fixed timeout
//! - long-lived subscriptions (`FollowFlight`) read by a background task
//!   into a bounded channel, with cancellation and deadlines
//! - typed decoding of payloads with any `prost` message
//!
//! Message schemas are not part of this crate; callers bring their own
//! `prost` types.
//!
//! ## Example
//!
//! ```ignore
//! use fr24_grpc_client::{FeedClient, Method};
//!
//! let client = FeedClient::builder().build()?;
//!
//! let response = client
//!     .call_unary::<LiveFeedRequest, LiveFeedResponse>(Method::LiveFeed, &request)
//!     .await?;
//! println!("{} flights", response.flights_list.len());
//! ```
//!
//! ## Subscription Example
//!
//! ```ignore
//! use fr24_grpc_client::{CallOptions, CancelSignal, FeedClient, Method};
//! use futures::StreamExt;
//! use std::time::Duration;
//!
//! let cancel = CancelSignal::new();
//! let options = CallOptions::new()
//!     .timeout(Duration::from_secs(600))
//!     .cancel_signal(cancel.clone());
//!
//! let mut stream = client
//!     .call_server_stream_with_options::<FollowFlightRequest, FollowFlightResponse>(
//!         Method::FollowFlight,
//!         &request,
//!         options,
//!     )
//!     .await?;
//!
//! while let Some(update) = stream.next().await {
//!     let update = update?;
//!     println!("{:?}", update.aircraft_info);
//! }
//! ```
//!
//! ## Stopping a Subscription
//!
//! - drop the stream, or call `cancel()` / `close()` on it
//! - raise a [`CancelSignal`] passed in [`CallOptions`]
//! - set a deadline with [`CallOptions::timeout`]
//! - take one item with `first()`
//!
//! In every case the background reader exits and the connection is
//! released, even if the consumer stopped reading.
//!
//! ## Feature Flags
//!
//! - `tls` (default) - `tls-ring` + `tls-native-roots`
//! - `tls-ring` / `tls-aws-lc` - TLS crypto provider
//! - `tls-native-roots` / `tls-webpki-roots` - TLS root certificates
//! - `tracing` (default) - spans and events for calls and subscriptions

mod builder;
mod client;
mod config;
mod error;
mod method;
mod options;
mod request;
mod response;
mod streaming;
pub mod transport;

pub use builder::ClientBuilder;
pub use client::FeedClient;
pub use config::{
    AuthMode, ClientConfig, DEFAULT_BASE_URL, DEFAULT_MAX_FRAME_SIZE, DEFAULT_PLATFORM_VERSION,
    DEFAULT_STREAM_BUFFER, DEFAULT_TIMEOUT, FR24_DEVICE_ID, FR24_PLATFORM, new_device_id,
};
pub use error::ClientError;
pub use method::{Method, UnknownMethod};
pub use options::CallOptions;
pub use request::{
    GRPC_WEB_CONTENT_TYPE, GRPC_WEB_USER_AGENT, X_GRPC_WEB, X_USER_AGENT, build_request,
    encode_request,
};
pub use response::{
    FeedResponse, check_response_head, decode_message, decode_unary, status_from_headers,
};
pub use streaming::{ByteStream, CancelSignal, StreamHandle, Streaming};

pub use fr24_grpc_core::{
    Code, FrameError, FrameHeader, ProtocolError, Status, TrailerSet, decode_frame, encode_frame,
};

