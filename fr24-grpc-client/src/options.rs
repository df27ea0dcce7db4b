//! Per-call options.

use http::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

use crate::streaming::CancelSignal;

/// Options for a single call.
///
/// For request/response calls `timeout` replaces the client default. For
/// subscriptions it is an overall deadline: the stream ends quietly once it
/// passes. Subscriptions have no deadline unless one is set here.
///
/// # Example
///
/// ```ignore
/// use fr24_grpc_client::{CallOptions, CancelSignal};
/// use std::time::Duration;
///
/// let cancel = CancelSignal::new();
/// let options = CallOptions::new()
///     .timeout(Duration::from_secs(300))
///     .header("x-request-id", "abc-123")
///     .cancel_signal(cancel.clone());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub(crate) timeout: Option<Duration>,
    pub(crate) headers: HeaderMap,
    pub(crate) cancel: Option<CancelSignal>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout (request/response) or deadline (subscription).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Add a header for this call. It replaces a client-level header of the
    /// same name.
    ///
    /// # Panics
    ///
    /// Panics if the header name or value is invalid.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        V::Error: std::fmt::Debug,
    {
        let name = name.try_into().expect("invalid header name");
        let value = value.try_into().expect("invalid header value");
        self.headers.append(name, value);
        self
    }

    /// Add a header for this call.
    ///
    /// Returns `None` if the header name or value is invalid.
    pub fn try_header<K, V>(mut self, name: K, value: V) -> Option<Self>
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        let name = name.try_into().ok()?;
        let value = value.try_into().ok()?;
        self.headers.append(name, value);
        Some(self)
    }

    /// Replace all per-call headers.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn get_headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Tie the call to an external cancellation signal.
    ///
    /// Cancelling the signal aborts a pending request and ends a
    /// subscription. One signal may be shared by several calls.
    pub fn cancel_signal(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    pub fn get_cancel_signal(&self) -> Option<&CancelSignal> {
        self.cancel.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_nothing_set() {
        let options = CallOptions::new();
        assert!(options.get_timeout().is_none());
        assert!(options.get_headers().is_empty());
        assert!(options.get_cancel_signal().is_none());
    }

    #[test]
    fn test_headers_accumulate() {
        let options = CallOptions::new()
            .header("x-request-id", "abc")
            .header("x-request-id", "def")
            .timeout(Duration::from_secs(3));

        let values: Vec<_> = options.get_headers().get_all("x-request-id").iter().collect();
        assert_eq!(values, ["abc", "def"]);
        assert_eq!(options.get_timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_try_header_rejects_invalid() {
        assert!(CallOptions::new().try_header("bad header", "x").is_none());
        assert!(CallOptions::new().try_header("x-ok", "line\nbreak").is_none());
        assert!(CallOptions::new().try_header("x-ok", "fine").is_some());
    }

    #[test]
    #[should_panic(expected = "invalid header name")]
    fn test_header_panics_on_invalid_name() {
        let _ = CallOptions::new().header("bad header", "x");
    }

    #[test]
    fn test_cancel_signal_is_shared() {
        let signal = CancelSignal::new();
        let options = CallOptions::new().cancel_signal(signal.clone());
        signal.cancel();
        assert!(options.get_cancel_signal().unwrap().is_cancelled());
    }
}
