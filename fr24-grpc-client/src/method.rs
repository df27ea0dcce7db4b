//! The remote feed service's method catalog.

use std::str::FromStr;

/// A method of the `fr24.feed.api.v1.Feed` service.
///
/// The message schemas are supplied by the caller; this type only knows the
/// names and the per-method quirks the transport has to honour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    LiveFeed,
    Playback,
    NearestFlights,
    LiveFlightsStatus,
    TopFlights,
    LiveTrail,
    HistoricTrail,
    FlightDetails,
    PlaybackFlight,
    FollowFlight,
}

impl Method {
    pub const ALL: [Method; 10] = [
        Method::LiveFeed,
        Method::Playback,
        Method::NearestFlights,
        Method::LiveFlightsStatus,
        Method::TopFlights,
        Method::LiveTrail,
        Method::HistoricTrail,
        Method::FlightDetails,
        Method::PlaybackFlight,
        Method::FollowFlight,
    ];

    /// The name used in the request path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::LiveFeed => "LiveFeed",
            Method::Playback => "Playback",
            Method::NearestFlights => "NearestFlights",
            Method::LiveFlightsStatus => "LiveFlightsStatus",
            Method::TopFlights => "TopFlights",
            Method::LiveTrail => "LiveTrail",
            Method::HistoricTrail => "HistoricTrail",
            Method::FlightDetails => "FlightDetails",
            Method::PlaybackFlight => "PlaybackFlight",
            Method::FollowFlight => "FollowFlight",
        }
    }

    /// Whether the method is a subscription that keeps sending frames.
    pub fn is_server_streaming(&self) -> bool {
        matches!(self, Method::FollowFlight)
    }

    /// Whether an empty frame from this method means "no results" rather
    /// than a broken response.
    ///
    /// `NearestFlights` answers a query with nothing nearby with a
    /// zero-length data frame, or no frame at all.
    pub fn tolerates_empty_result(&self) -> bool {
        matches!(self, Method::NearestFlights)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Error returned when a method name is not in the catalog.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown feed method {0:?}")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}
