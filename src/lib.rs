//! # Route Pilot
//!
//! Live progress tracking of a GPS device against a pre-recorded route.
//!
//! This library provides:
//! - Great-circle geometry over route tracks (distance, path length, bounds)
//! - Nearest-point search and monotone waypoint-to-track projection
//! - A reactive progress engine (passed / remaining / unused track, waypoint
//!   states, projection markers) driven by live fixes and target selections
//! - A telemetry engine (current and average speed, remaining distance,
//!   remaining time, ETA)
//! - The stream primitives both engines are built from
//!
//! Route parsing, location subscription and rendering stay outside: a
//! [`session::NavigationSession`] consumes them through the
//! [`session::RouteLoader`] and [`session::LocationProvider`] traits and
//! publishes its results on latest-value channels.
//!
//! ## Quick Start
//!
//! ```rust
//! use route_pilot::{GeoPoint, Route, Waypoint};
//! use route_pilot::projection::project_waypoints;
//! use route_pilot::progress::TrackSegments;
//!
//! let track: Vec<GeoPoint> = (0..5)
//!     .map(|i| GeoPoint::new(51.5074 + i as f64 * 0.001, -0.1278))
//!     .collect();
//! let waypoints = vec![Waypoint::new(Some("Bridge".into()), GeoPoint::new(51.5094, -0.1279))];
//! let route = Route::new(track, waypoints);
//!
//! let projection = project_waypoints(&route);
//! assert_eq!(projection.positions(), &[2]);
//!
//! let segments = TrackSegments::split(&route.track, 1, 2);
//! assert_eq!(segments.remaining.len(), 2);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{NavigationError, OptionExt, Result};

// Geographic utilities (distance, path length, bounds)
pub mod geo_utils;

// Nearest track point search
pub mod nearest;
pub use nearest::nearest_index;

// Waypoint to track alignment
pub mod projection;
pub use projection::{project_waypoints, ProjectionIndex};

// Stream primitives (channels, combinators, task supervision)
pub mod streams;

// Progress stream engine
pub mod progress;
pub use progress::{
    PositionTracker, ProgressEngine, ProgressOutputs, ResolvedTarget, TrackSegments, WaypointView,
};

// Telemetry stream engine
pub mod telemetry;
pub use telemetry::{RemainingEstimate, TelemetryEngine, TelemetryOutputs};

// Per-route task group and collaborator interfaces
pub mod session;
pub use session::{
    BlockingRouteLoader, LocationProvider, NavigationSession, RouteLoader, SessionEvent,
    SessionOutputs,
};

// Display strings for telemetry values
pub mod format;

/// Initialize logging for Android
#[cfg(target_os = "android")]
pub fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("RoutePilotRust"),
    );
}

#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A geographic coordinate with latitude and longitude in degrees.
///
/// # Example
/// ```
/// use route_pilot::GeoPoint;
/// let point = GeoPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new geographic point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// Great-circle distance to another point in meters.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        geo_utils::haversine_distance(self, other)
    }
}

/// A named point of interest along (not necessarily on) the track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: Option<String>,
    pub location: GeoPoint,
}

impl Waypoint {
    pub fn new(name: Option<String>, location: GeoPoint) -> Self {
        Self { name, location }
    }
}

/// A recorded route: the track polyline and its waypoints.
///
/// Waypoints are expected in travel order. A route is never mutated once
/// loaded; sessions share it behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Route name from the source file metadata, if any
    pub name: Option<String>,
    /// Ordered track points
    pub track: Vec<GeoPoint>,
    /// Waypoints in travel order
    pub waypoints: Vec<Waypoint>,
}

impl Route {
    /// Create an unnamed route.
    pub fn new(track: Vec<GeoPoint>, waypoints: Vec<Waypoint>) -> Self {
        Self {
            name: None,
            track,
            waypoints,
        }
    }

    /// Set the route name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Index of the final track point, `None` for an empty track.
    pub fn last_index(&self) -> Option<usize> {
        self.track.len().checked_sub(1)
    }

    /// Check the route can be tracked against: a non-empty track of valid
    /// coordinates, and waypoints with valid coordinates.
    pub fn validate(&self) -> Result<()> {
        if self.track.is_empty() {
            return Err(NavigationError::EmptyTrack);
        }
        if let Some(index) = self.track.iter().position(|p| !p.is_valid()) {
            return Err(NavigationError::InvalidTrackPoint { index });
        }
        if let Some(index) = self.waypoints.iter().position(|w| !w.location.is_valid()) {
            return Err(NavigationError::InvalidWaypoint { index });
        }
        Ok(())
    }

    /// Bounding box of the track, `None` for an empty track.
    pub fn bounds(&self) -> Option<Bounds> {
        geo_utils::compute_bounds(&self.track)
    }
}

/// Bounding box of a track (camera bounds for the map view).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// One live GPS sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub location: GeoPoint,
    /// Ground speed in m/s
    pub speed_mps: f32,
    /// Bearing in degrees
    pub bearing_deg: f32,
    /// Horizontal accuracy radius in meters
    pub accuracy_m: f32,
    pub timestamp: DateTime<Utc>,
}

impl Fix {
    /// A fix at `location` with the given speed, stamped now.
    pub fn new(location: GeoPoint, speed_mps: f32) -> Self {
        Self {
            location,
            speed_mps,
            bearing_deg: 0.0,
            accuracy_m: 0.0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_accuracy(mut self, accuracy_m: f32) -> Self {
        self.accuracy_m = accuracy_m;
        self
    }

    pub fn with_bearing(mut self, bearing_deg: f32) -> Self {
        self.bearing_deg = bearing_deg;
        self
    }

    /// Whether the accuracy radius is within `threshold` meters.
    pub fn is_accurate(&self, threshold: f32) -> bool {
        self.accuracy_m <= threshold
    }
}

/// What the location provider yields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LocationUpdate {
    Fix(Fix),
    /// Location is temporarily unavailable
    Unavailable,
}

/// A user's choice of what to measure progress against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Target {
    /// A waypoint, by its index in the route's waypoint list
    Waypoint(usize),
    /// An arbitrary map point, snapped to the nearest track point
    Point(GeoPoint),
}

/// Classification of a waypoint relative to the current position and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WayPointState {
    Passed,
    Target,
    Remaining,
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the progress and telemetry engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Fixes farther than this from the nearest track point don't move the
    /// current position and pause telemetry.
    /// Default: 100.0 meters
    pub near_track_threshold: f64,

    /// Fixes with an accuracy radius at or below this are reported accurate.
    /// Default: 10.0 meters
    pub accurate_fix_threshold: f32,

    /// Map taps farther than this from the track don't change the target.
    /// Default: 50.0 meters
    pub map_tap_threshold: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            near_track_threshold: 100.0,
            accurate_fix_threshold: 10.0,
            map_tap_threshold: 50.0,
        }
    }
}

impl NavigationConfig {
    /// Parse a JSON object; missing fields keep their defaults.
    ///
    /// Positional (array) documents are rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(NavigationError::Config {
                message: format!("Expected a JSON object, got {}", value),
            });
        }
        Ok(serde_json::from_value(value)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
