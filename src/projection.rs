//! Waypoint to track alignment.
//!
//! Each waypoint is projected onto the nearest track point, searching only
//! from the previous waypoint's projection onward. Waypoints are assumed to be
//! recorded in travel order; the sliding start keeps the result monotone and
//! makes the whole pass a single sweep over the track. A waypoint recorded out
//! of order snaps to the nearest point *ahead* of its predecessor rather than
//! being reported.

use serde::{Deserialize, Serialize};

use crate::nearest::nearest_index;
use crate::{GeoPoint, Route};

/// Track index of each projected waypoint, in waypoint order.
///
/// Invariants: non-decreasing, every entry is a valid track index. It may be
/// shorter than the waypoint list when projection stopped early; entry `i`
/// always belongs to waypoint `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionIndex(Vec<usize>);

impl ProjectionIndex {
    pub fn positions(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Track index of waypoint `waypoint`, if it was projected.
    pub fn get(&self, waypoint: usize) -> Option<usize> {
        self.0.get(waypoint).copied()
    }

    /// Track index of the last projected waypoint.
    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Whether some waypoint projects onto `track_index`.
    pub fn contains(&self, track_index: usize) -> bool {
        // Sorted by construction
        self.0.binary_search(&track_index).is_ok()
    }

    /// Track coordinates of the projections.
    pub fn points(&self, track: &[GeoPoint]) -> Vec<GeoPoint> {
        self.0.iter().map(|&i| track[i]).collect()
    }
}

/// Project the route's waypoints onto its track.
///
/// Returns an empty index when the route has no waypoints or no track.
///
/// # Example
/// ```
/// use route_pilot::{GeoPoint, Route, Waypoint};
/// use route_pilot::projection::project_waypoints;
///
/// let track: Vec<GeoPoint> = (0..10).map(|i| GeoPoint::new(0.0, i as f64 * 0.01)).collect();
/// let waypoints = vec![
///     Waypoint::new(None, GeoPoint::new(0.001, 0.031)),
///     Waypoint::new(None, GeoPoint::new(-0.001, 0.072)),
/// ];
/// let projection = project_waypoints(&Route::new(track, waypoints));
/// assert_eq!(projection.positions(), &[3, 7]);
/// ```
pub fn project_waypoints(route: &Route) -> ProjectionIndex {
    let mut positions = Vec::with_capacity(route.waypoints.len());
    let mut start_offset = 0;

    for waypoint in &route.waypoints {
        match nearest_index(&route.track, &waypoint.location, start_offset) {
            Some(index) => {
                positions.push(index);
                start_offset = index;
            }
            None => break,
        }
    }

    ProjectionIndex(positions)
}
