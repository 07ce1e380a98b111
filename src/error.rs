//! Unified error handling for the route-pilot library.
//!
//! Only a few conditions are errors here. Session-fatal problems (a route
//! that can't be loaded or has no track) end the session, and per-event
//! problems (a tap far from the track, a stale waypoint index) are logged
//! and dropped by the engines. Everything else flows through the output
//! channels as data.

use thiserror::Error;

/// Unified error type for route-pilot operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavigationError {
    /// The route has no track points, so nothing can be tracked against it
    #[error("Route has an empty track")]
    EmptyTrack,

    /// A track point has non-finite or out-of-range coordinates
    #[error("Track point {index} has invalid coordinates")]
    InvalidTrackPoint { index: usize },

    /// A waypoint has non-finite or out-of-range coordinates
    #[error("Waypoint {index} has invalid coordinates")]
    InvalidWaypoint { index: usize },

    /// The external route loader failed
    #[error("Route can't be loaded: {message}")]
    RouteLoad { message: String },

    /// A waypoint target refers past the projected waypoints
    #[error("Waypoint {index} has no projection ({projected} waypoints projected)")]
    WaypointOutOfRange { index: usize, projected: usize },

    /// A map tap landed too far from the track to pick a target
    #[error("Tapped point is {distance:.0}m from the track, maximum {maximum:.0}m")]
    TapOutOfReach { distance: f64, maximum: f64 },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl From<serde_json::Error> for NavigationError {
    fn from(err: serde_json::Error) -> Self {
        NavigationError::Config {
            message: err.to_string(),
        }
    }
}

/// Result type alias for route-pilot operations.
pub type Result<T> = std::result::Result<T, NavigationError>;

/// Extension trait for converting Option to NavigationError.
pub trait OptionExt<T> {
    /// Convert Option to Result with an empty track error.
    ///
    /// Searches over a track only come back empty when the track itself is
    /// empty, which the session rejects before any engine starts.
    fn ok_or_empty_track(self) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_empty_track(self) -> Result<T> {
        self.ok_or(NavigationError::EmptyTrack)
    }
}
