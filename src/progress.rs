//! # Progress Engine
//!
//! Turns live fixes and target selections into what the map shows: the
//! passed / remaining / unused parts of the track, per-waypoint states and
//! the projection markers.
//!
//! The pure pieces ([`PositionTracker`], [`TrackSegments::split`],
//! [`resolve_target`], [`classify_waypoints`], [`projection_markers`]) carry
//! all the logic. [`ProgressEngine`] only wires them into tasks that talk
//! through [`Conflated`] channels.
//!
//! ## Streams
//!
//! ```text
//! fixes ──► tracking ──► near_track, position, track_fixes
//!                    └─► current_index ─┐
//! targets ─► resolver ─► target ────────┼─► segments  (passed, remaining, unused)
//!                                       ├─► waypoints
//!                                       └─► markers
//! ```
//!
//! The current index is seeded with 0 so segments exist before the first fix.

use std::sync::Arc;

use futures::StreamExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::error::{NavigationError, OptionExt, Result};
use crate::geo_utils::haversine_distance;
use crate::nearest::nearest_index;
use crate::projection::ProjectionIndex;
use crate::streams::{
    combine_latest, combine_latest2, distinct_until_changed, start_with, Conflated,
    MailboxReceiver,
};
use crate::{Fix, GeoPoint, LocationUpdate, NavigationConfig, Route, Target, WayPointState};

// ============================================================================
// Position tracking
// ============================================================================

/// Where a fix lies relative to the track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackObservation {
    /// Index of the nearest track point
    pub nearest: usize,
    /// Distance from the fix to that point in meters
    pub distance_m: f64,
    /// Whether the fix is within the near-track threshold
    pub near: bool,
}

/// Result of feeding one fix to a [`PositionTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionUpdate {
    pub observation: TrackObservation,
    /// New current index, set only when the fix is near the track and its
    /// nearest point differs from the last accepted one
    pub changed: Option<usize>,
}

/// Tracks the current track index from a sequence of fixes.
#[derive(Debug, Clone)]
pub struct PositionTracker {
    near_threshold: f64,
    last_index: Option<usize>,
}

impl PositionTracker {
    pub fn new(near_threshold: f64) -> Self {
        Self {
            near_threshold,
            last_index: None,
        }
    }

    /// Last accepted current index.
    pub fn last_index(&self) -> Option<usize> {
        self.last_index
    }

    /// Observe a fix location.
    ///
    /// Fails only for an empty track.
    pub fn observe(&mut self, track: &[GeoPoint], location: &GeoPoint) -> Result<PositionUpdate> {
        let nearest = nearest_index(track, location, 0).ok_or_empty_track()?;
        let distance_m = haversine_distance(&track[nearest], location);
        let near = distance_m <= self.near_threshold;

        let changed = if near && self.last_index != Some(nearest) {
            self.last_index = Some(nearest);
            Some(nearest)
        } else {
            None
        };

        Ok(PositionUpdate {
            observation: TrackObservation {
                nearest,
                distance_m,
                near,
            },
            changed,
        })
    }
}

/// The live position marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionMarker {
    pub location: GeoPoint,
    pub bearing_deg: f32,
    /// Accuracy radius within the accurate-fix threshold
    pub accurate: bool,
}

impl PositionMarker {
    pub fn from_fix(fix: &Fix, accurate_threshold: f32) -> Self {
        Self {
            location: fix.location,
            bearing_deg: fix.bearing_deg,
            accurate: fix.is_accurate(accurate_threshold),
        }
    }
}

/// A fix accepted as near the track, with its nearest track index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackFix {
    pub fix: Fix,
    pub index: usize,
}

// ============================================================================
// Segments
// ============================================================================

/// The track split around the current and target indices.
///
/// Boundary points are shared: `passed` ends where `remaining` starts (when
/// the target is ahead) and `remaining` ends where `unused` starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackSegments {
    /// `track[..=min(current, target)]`
    pub passed: Vec<GeoPoint>,
    /// `track[current..=target]`, empty once the target is behind
    pub remaining: Vec<GeoPoint>,
    /// `track[target..]`
    pub unused: Vec<GeoPoint>,
}

impl TrackSegments {
    /// # Panics
    /// If either index is outside the track.
    pub fn split(track: &[GeoPoint], current: usize, target: usize) -> Self {
        assert!(
            current < track.len() && target < track.len(),
            "segment indices {} and {} out of bounds for track of {} points",
            current,
            target,
            track.len()
        );

        let passed = track[..=current.min(target)].to_vec();
        let remaining = if current <= target {
            track[current..=target].to_vec()
        } else {
            Vec::new()
        };
        let unused = track[target..].to_vec();

        Self {
            passed,
            remaining,
            unused,
        }
    }
}

// ============================================================================
// Targets
// ============================================================================

/// A target resolved to a track index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    pub index: usize,
    /// Selected waypoint, `None` for map points and the track end
    pub waypoint: Option<usize>,
}

/// The target before the user picks one: the last projected waypoint, or the
/// end of the track when no waypoint was projected.
pub fn default_target(route: &Route, projection: &ProjectionIndex) -> Result<ResolvedTarget> {
    match projection.last() {
        Some(index) => Ok(ResolvedTarget {
            index,
            waypoint: Some(projection.len() - 1),
        }),
        None => Ok(ResolvedTarget {
            index: route.last_index().ok_or_empty_track()?,
            waypoint: None,
        }),
    }
}

/// Resolve a user's target selection.
pub fn resolve_target(
    track: &[GeoPoint],
    projection: &ProjectionIndex,
    target: Target,
    config: &NavigationConfig,
) -> Result<ResolvedTarget> {
    match target {
        Target::Waypoint(waypoint) => {
            let index = projection
                .get(waypoint)
                .ok_or(NavigationError::WaypointOutOfRange {
                    index: waypoint,
                    projected: projection.len(),
                })?;
            Ok(ResolvedTarget {
                index,
                waypoint: Some(waypoint),
            })
        }
        Target::Point(point) => {
            let index = nearest_index(track, &point, 0).ok_or_empty_track()?;
            let distance = haversine_distance(&track[index], &point);
            if distance > config.map_tap_threshold {
                return Err(NavigationError::TapOutOfReach {
                    distance,
                    maximum: config.map_tap_threshold,
                });
            }
            Ok(ResolvedTarget {
                index,
                waypoint: None,
            })
        }
    }
}

// ============================================================================
// Waypoints and markers
// ============================================================================

/// A waypoint as shown on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointView {
    pub name: Option<String>,
    pub location: GeoPoint,
    pub state: WayPointState,
}

/// State of every projected waypoint.
///
/// The selected waypoint is the target; others are passed once the current
/// index reaches their projection.
pub fn classify_waypoints(
    projection: &ProjectionIndex,
    current: usize,
    selected: Option<usize>,
) -> Vec<WayPointState> {
    projection
        .positions()
        .iter()
        .enumerate()
        .map(|(i, &projected)| {
            if Some(i) == selected {
                WayPointState::Target
            } else if projected <= current {
                WayPointState::Passed
            } else {
                WayPointState::Remaining
            }
        })
        .collect()
}

/// Projection points, plus the target point when it isn't one of them.
pub fn projection_markers(
    track: &[GeoPoint],
    projection: &ProjectionIndex,
    target_index: usize,
) -> Vec<GeoPoint> {
    let mut markers = projection.points(track);
    if !projection.contains(target_index) {
        markers.push(track[target_index]);
    }
    markers
}

// ============================================================================
// Engine
// ============================================================================

/// Channels the progress engine publishes to.
#[derive(Debug, Clone, Default)]
pub struct ProgressOutputs {
    /// Current track index, on change only
    pub current_index: Conflated<usize>,
    /// Whether the latest fix is near the track, on every fix
    pub near_track: Conflated<bool>,
    /// Latest fix near the track
    pub track_fixes: Conflated<TrackFix>,
    /// Live position marker, `None` while location is unavailable
    pub position: Conflated<Option<PositionMarker>>,
    pub target: Conflated<ResolvedTarget>,
    pub passed: Conflated<Arc<[GeoPoint]>>,
    pub remaining: Conflated<Arc<[GeoPoint]>>,
    pub unused: Conflated<Arc<[GeoPoint]>>,
    pub waypoints: Conflated<Vec<WaypointView>>,
    pub markers: Conflated<Vec<GeoPoint>>,
}

/// Progress engine for one route.
pub struct ProgressEngine {
    route: Arc<Route>,
    projection: Arc<ProjectionIndex>,
    config: NavigationConfig,
    outputs: ProgressOutputs,
}

impl ProgressEngine {
    pub fn new(
        route: Arc<Route>,
        projection: Arc<ProjectionIndex>,
        config: NavigationConfig,
        outputs: ProgressOutputs,
    ) -> Self {
        Self {
            route,
            projection,
            config,
            outputs,
        }
    }

    pub fn outputs(&self) -> &ProgressOutputs {
        &self.outputs
    }

    /// Start the engine's tasks on `tasks`.
    ///
    /// Every input is subscribed before this returns, so nothing sent
    /// afterwards is missed. Fails with [`NavigationError::EmptyTrack`]
    /// without starting anything when the route has no track.
    pub fn spawn(
        self,
        fixes: &Conflated<LocationUpdate>,
        targets: MailboxReceiver<Target>,
        tasks: &mut JoinSet<()>,
    ) -> Result<()> {
        let initial = default_target(&self.route, &self.projection)?;
        self.outputs.target.send(initial);
        info!(
            "[ProgressEngine] Tracking {} points, {} projected waypoints, default target {}",
            self.route.track.len(),
            self.projection.len(),
            initial.index
        );

        self.spawn_tracking(fixes, tasks);
        self.spawn_target_resolver(targets, tasks);
        self.spawn_segments(tasks);
        self.spawn_markers(tasks);
        if !self.projection.is_empty() {
            self.spawn_waypoints(tasks);
        }
        Ok(())
    }

    fn spawn_tracking(&self, fixes: &Conflated<LocationUpdate>, tasks: &mut JoinSet<()>) {
        let mut updates = fixes.subscribe();
        let route = Arc::clone(&self.route);
        let config = self.config.clone();
        let outputs = self.outputs.clone();

        tasks.spawn(async move {
            let mut tracker = PositionTracker::new(config.near_track_threshold);
            while let Some(update) = updates.recv().await {
                let fix = match update {
                    LocationUpdate::Fix(fix) => fix,
                    LocationUpdate::Unavailable => {
                        debug!("[ProgressEngine] Location unavailable");
                        outputs.position.send(None);
                        continue;
                    }
                };

                outputs.position.send(Some(PositionMarker::from_fix(
                    &fix,
                    config.accurate_fix_threshold,
                )));

                let update = match tracker.observe(&route.track, &fix.location) {
                    Ok(update) => update,
                    Err(e) => {
                        warn!("[ProgressEngine] Can't place fix: {}", e);
                        continue;
                    }
                };
                let observation = update.observation;

                outputs.near_track.send(observation.near);
                if observation.near {
                    outputs.track_fixes.send(TrackFix {
                        fix,
                        index: observation.nearest,
                    });
                }
                if let Some(index) = update.changed {
                    debug!(
                        "[ProgressEngine] Current point: {}, distance: {:.1}m",
                        index, observation.distance_m
                    );
                    outputs.current_index.send(index);
                }
            }
        });
    }

    fn spawn_target_resolver(&self, mut targets: MailboxReceiver<Target>, tasks: &mut JoinSet<()>) {
        let route = Arc::clone(&self.route);
        let projection = Arc::clone(&self.projection);
        let config = self.config.clone();
        let outputs = self.outputs.clone();

        tasks.spawn(async move {
            while let Some(target) = targets.recv().await {
                match resolve_target(&route.track, &projection, target, &config) {
                    Ok(resolved) => {
                        debug!("[ProgressEngine] Target {:?} -> {}", target, resolved.index);
                        outputs.target.send(resolved);
                    }
                    Err(e) => warn!("[ProgressEngine] Ignoring target {:?}: {}", target, e),
                }
            }
        });
    }

    fn spawn_segments(&self, tasks: &mut JoinSet<()>) {
        let route = Arc::clone(&self.route);
        let outputs = self.outputs.clone();
        let mut pairs = distinct_until_changed(combine_latest([
            start_with(0, outputs.current_index.stream()),
            outputs.target.stream().map(|t| t.index).boxed(),
        ]));

        tasks.spawn(async move {
            while let Some([current, target]) = pairs.next().await {
                debug!(
                    "[ProgressEngine] Positions: current {}, target {} (track: {})",
                    current,
                    target,
                    route.track.len()
                );
                let segments = TrackSegments::split(&route.track, current, target);
                outputs.passed.send(segments.passed.into());
                outputs.remaining.send(segments.remaining.into());
                outputs.unused.send(segments.unused.into());
            }
        });
    }

    fn spawn_waypoints(&self, tasks: &mut JoinSet<()>) {
        let route = Arc::clone(&self.route);
        let projection = Arc::clone(&self.projection);
        let outputs = self.outputs.clone();
        let mut pairs = distinct_until_changed(combine_latest2(
            start_with(0, outputs.current_index.stream()),
            outputs.target.stream(),
        ));

        tasks.spawn(async move {
            while let Some((current, target)) = pairs.next().await {
                let states = classify_waypoints(&projection, current, target.waypoint);
                let views = route
                    .waypoints
                    .iter()
                    .zip(states)
                    .map(|(waypoint, state)| WaypointView {
                        name: waypoint.name.clone(),
                        location: waypoint.location,
                        state,
                    })
                    .collect();
                outputs.waypoints.send(views);
            }
        });
    }

    fn spawn_markers(&self, tasks: &mut JoinSet<()>) {
        let route = Arc::clone(&self.route);
        let projection = Arc::clone(&self.projection);
        let outputs = self.outputs.clone();
        let mut targets = distinct_until_changed(outputs.target.stream().map(|t| t.index));

        tasks.spawn(async move {
            while let Some(target) = targets.next().await {
                outputs
                    .markers
                    .send(projection_markers(&route.track, &projection, target));
            }
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::EARTH_RADIUS_M;
    use crate::projection::project_waypoints;
    use crate::streams::{mailbox, Subscription};
    use crate::Waypoint;
    use std::time::Duration;
    use tokio::time::timeout;

    fn pt(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint::new(lat, lng)
    }

    fn equator_track(count: usize, step: f64) -> Vec<GeoPoint> {
        let step_deg = (step / EARTH_RADIUS_M).to_degrees();
        (0..count).map(|i| pt(0.0, i as f64 * step_deg)).collect()
    }

    fn projection_of(positions: &[usize], track: &[GeoPoint]) -> ProjectionIndex {
        let waypoints = positions
            .iter()
            .map(|&i| Waypoint::new(None, track[i]))
            .collect();
        project_waypoints(&Route::new(track.to_vec(), waypoints))
    }

    async fn next<T: Clone>(sub: &mut Subscription<T>) -> T {
        timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("timed out")
            .expect("channel closed")
    }

    async fn next_where<T: Clone>(sub: &mut Subscription<T>, pred: impl Fn(&T) -> bool) -> T {
        loop {
            let value = next(sub).await;
            if pred(&value) {
                return value;
            }
        }
    }

    #[test]
    fn test_tracker_reports_changes_only() {
        let track = equator_track(4, 100.0);
        let mut tracker = PositionTracker::new(100.0);

        let first = tracker.observe(&track, &track[1]).unwrap();
        assert_eq!(first.changed, Some(1));
        assert!(first.observation.near);
        assert!(first.observation.distance_m < 1e-6);

        let repeat = tracker.observe(&track, &track[1]).unwrap();
        assert_eq!(repeat.changed, None);
        assert_eq!(tracker.last_index(), Some(1));
    }

    #[test]
    fn test_tracker_ignores_far_fix() {
        let track = equator_track(4, 100.0);
        let mut tracker = PositionTracker::new(100.0);
        tracker.observe(&track, &track[0]).unwrap();

        // ~1.1 km north of P2
        let far = pt(0.01, track[2].longitude);
        let update = tracker.observe(&track, &far).unwrap();
        assert!(!update.observation.near);
        assert_eq!(update.observation.nearest, 2);
        assert_eq!(update.changed, None);
        assert_eq!(tracker.last_index(), Some(0));
    }

    #[test]
    fn test_tracker_empty_track() {
        let mut tracker = PositionTracker::new(100.0);
        assert_eq!(
            tracker.observe(&[], &pt(0.0, 0.0)),
            Err(NavigationError::EmptyTrack)
        );
    }

    #[test]
    fn test_segments_target_ahead() {
        let track = equator_track(4, 100.0);
        let segments = TrackSegments::split(&track, 0, 3);
        assert_eq!(segments.passed, vec![track[0]]);
        assert_eq!(segments.remaining, track);
        assert_eq!(segments.unused, vec![track[3]]);
    }

    #[test]
    fn test_segments_target_behind() {
        let track = equator_track(6, 100.0);
        let segments = TrackSegments::split(&track, 4, 2);
        assert_eq!(segments.passed, track[..=2].to_vec());
        assert!(segments.remaining.is_empty());
        assert_eq!(segments.unused, track[2..].to_vec());
    }

    #[test]
    fn test_segments_cover_track() {
        let track = equator_track(7, 50.0);
        for current in 0..track.len() {
            for target in current..track.len() {
                let s = TrackSegments::split(&track, current, target);
                let mut joined = s.passed.clone();
                joined.extend_from_slice(&s.remaining[1..]);
                joined.extend_from_slice(&s.unused[1..]);
                assert_eq!(joined, track, "current {} target {}", current, target);
            }
        }
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_segments_index_past_end() {
        let track = equator_track(3, 100.0);
        TrackSegments::split(&track, 0, 3);
    }

    #[test]
    fn test_default_target() {
        let track = equator_track(10, 100.0);
        let route = Route::new(track.clone(), vec![]);

        let projection = projection_of(&[2, 6], &track);
        assert_eq!(
            default_target(&route, &projection).unwrap(),
            ResolvedTarget {
                index: 6,
                waypoint: Some(1)
            }
        );

        let none = ProjectionIndex::default();
        assert_eq!(
            default_target(&route, &none).unwrap(),
            ResolvedTarget {
                index: 9,
                waypoint: None
            }
        );

        assert_eq!(
            default_target(&Route::default(), &none),
            Err(NavigationError::EmptyTrack)
        );
    }

    #[test]
    fn test_resolve_waypoint_target() {
        let track = equator_track(10, 100.0);
        let projection = projection_of(&[2, 6], &track);
        let config = NavigationConfig::default();

        let resolved = resolve_target(&track, &projection, Target::Waypoint(0), &config).unwrap();
        assert_eq!(resolved.index, 2);
        assert_eq!(resolved.waypoint, Some(0));

        assert_eq!(
            resolve_target(&track, &projection, Target::Waypoint(5), &config),
            Err(NavigationError::WaypointOutOfRange {
                index: 5,
                projected: 2
            })
        );
    }

    #[test]
    fn test_resolve_point_target() {
        let track = equator_track(10, 100.0);
        let projection = ProjectionIndex::default();
        let config = NavigationConfig::default();

        // ~11 m off P7
        let tap = pt(0.0001, track[7].longitude);
        let resolved = resolve_target(&track, &projection, Target::Point(tap), &config).unwrap();
        assert_eq!(resolved.index, 7);
        assert_eq!(resolved.waypoint, None);

        // ~111 m off the track
        let far = pt(0.001, track[7].longitude);
        assert!(matches!(
            resolve_target(&track, &projection, Target::Point(far), &config),
            Err(NavigationError::TapOutOfReach { .. })
        ));
    }

    #[test]
    fn test_classify_waypoints() {
        let track = equator_track(10, 100.0);
        let projection = projection_of(&[1, 3, 3, 8], &track);

        use WayPointState::{Passed, Remaining};
        assert_eq!(
            classify_waypoints(&projection, 3, Some(3)),
            vec![Passed, Passed, Passed, WayPointState::Target]
        );
        assert_eq!(
            classify_waypoints(&projection, 0, Some(1)),
            vec![Remaining, WayPointState::Target, Remaining, Remaining]
        );
        // Map point target: no waypoint is the target
        assert_eq!(
            classify_waypoints(&projection, 5, None),
            vec![Passed, Passed, Passed, Remaining]
        );
    }

    #[test]
    fn test_projection_markers() {
        let track = equator_track(10, 100.0);
        let projection = projection_of(&[2, 6], &track);

        assert_eq!(
            projection_markers(&track, &projection, 6),
            vec![track[2], track[6]]
        );
        assert_eq!(
            projection_markers(&track, &projection, 4),
            vec![track[2], track[6], track[4]]
        );
    }

    #[test]
    fn test_position_marker_accuracy() {
        let fix = Fix::new(pt(0.0, 0.0), 3.0)
            .with_accuracy(12.0)
            .with_bearing(90.0);
        let marker = PositionMarker::from_fix(&fix, 10.0);
        assert!(!marker.accurate);
        assert_eq!(marker.bearing_deg, 90.0);
        assert!(PositionMarker::from_fix(&fix.with_accuracy(4.0), 10.0).accurate);
    }

    struct Harness {
        fixes: Conflated<LocationUpdate>,
        targets: crate::streams::MailboxSender<Target>,
        outputs: ProgressOutputs,
        _tasks: JoinSet<()>,
    }

    fn start(route: Route) -> Harness {
        let projection = Arc::new(project_waypoints(&route));
        let outputs = ProgressOutputs::default();
        let fixes = Conflated::new();
        let (targets, target_rx) = mailbox();
        let mut tasks = JoinSet::new();

        ProgressEngine::new(
            Arc::new(route),
            projection,
            NavigationConfig::default(),
            outputs.clone(),
        )
        .spawn(&fixes, target_rx, &mut tasks)
        .unwrap();

        Harness {
            fixes,
            targets,
            outputs,
            _tasks: tasks,
        }
    }

    #[tokio::test]
    async fn test_engine_initial_segments() {
        let track = equator_track(4, 100.0);
        let h = start(Route::new(track.clone(), vec![]));

        let mut remaining = h.outputs.remaining.subscribe();
        assert_eq!(next(&mut remaining).await.len(), 4);
        assert_eq!(h.outputs.passed.subscribe().recv().await.unwrap().len(), 1);
        assert_eq!(h.outputs.unused.subscribe().recv().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_engine_follows_fixes() {
        let track = equator_track(4, 100.0);
        let h = start(Route::new(track.clone(), vec![]));
        let mut current = h.outputs.current_index.subscribe();
        let mut remaining = h.outputs.remaining.subscribe_changes();

        h.fixes.send(LocationUpdate::Fix(Fix::new(track[2], 5.0)));
        assert_eq!(next(&mut current).await, 2);
        let remaining = next_where(&mut remaining, |r| r.len() == 2).await;
        assert_eq!(remaining.to_vec(), track[2..].to_vec());
        assert_eq!(h.outputs.near_track.latest(), Some(true));
        assert_eq!(h.outputs.track_fixes.latest().map(|f| f.index), Some(2));
    }

    #[tokio::test]
    async fn test_engine_unavailable_location_clears_marker() {
        let track = equator_track(4, 100.0);
        let h = start(Route::new(track.clone(), vec![]));
        let mut position = h.outputs.position.subscribe();

        h.fixes.send(LocationUpdate::Fix(Fix::new(track[1], 1.0)));
        assert!(next(&mut position).await.is_some());

        h.fixes.send(LocationUpdate::Unavailable);
        assert_eq!(next(&mut position).await, None);
    }

    #[tokio::test]
    async fn test_engine_target_selection() {
        let track = equator_track(10, 100.0);
        let waypoints = vec![
            Waypoint::new(Some("Spring".into()), track[3]),
            Waypoint::new(Some("Hut".into()), track[8]),
        ];
        let h = start(Route::new(track.clone(), waypoints));

        let mut waypoints = h.outputs.waypoints.subscribe();
        let views = next(&mut waypoints).await;
        assert_eq!(views[1].state, WayPointState::Target);
        assert_eq!(views[0].name.as_deref(), Some("Spring"));
        assert_eq!(h.outputs.target.latest().map(|t| t.index), Some(8));

        let mut markers = h.outputs.markers.subscribe_changes();
        h.targets.offer(Target::Waypoint(0));
        let views = next_where(&mut waypoints, |v| v[0].state == WayPointState::Target).await;
        assert_eq!(views[1].state, WayPointState::Remaining);

        h.targets.offer(Target::Point(track[5]));
        let markers = next_where(&mut markers, |m| m.len() == 3).await;
        assert_eq!(markers, vec![track[3], track[8], track[5]]);
        assert_eq!(
            h.outputs.target.latest(),
            Some(ResolvedTarget {
                index: 5,
                waypoint: None
            })
        );
    }

    #[tokio::test]
    async fn test_engine_marks_target_without_waypoints() {
        let track = equator_track(6, 100.0);
        let h = start(Route::new(track.clone(), vec![]));

        let mut markers = h.outputs.markers.subscribe();
        assert_eq!(next(&mut markers).await, vec![track[5]]);

        h.targets.offer(Target::Point(track[2]));
        assert_eq!(next_where(&mut markers, |m| m[0] == track[2]).await, vec![track[2]]);
        assert_eq!(h.outputs.waypoints.latest(), None);
    }

    #[tokio::test]
    async fn test_engine_ignores_bad_targets() {
        let track = equator_track(10, 100.0);
        let h = start(Route::new(track.clone(), vec![Waypoint::new(None, track[4])]));
        let mut target = h.outputs.target.subscribe_changes();

        h.targets.offer(Target::Waypoint(3));
        h.targets.offer(Target::Point(pt(1.0, 1.0)));
        assert!(timeout(Duration::from_millis(100), target.recv())
            .await
            .is_err());
        assert_eq!(h.outputs.target.latest().map(|t| t.index), Some(4));
    }

    #[test]
    fn test_engine_rejects_empty_track() {
        let outputs = ProgressOutputs::default();
        let (_targets, target_rx) = mailbox();
        let mut tasks = JoinSet::new();
        let result = ProgressEngine::new(
            Arc::new(Route::default()),
            Arc::new(ProjectionIndex::default()),
            NavigationConfig::default(),
            outputs.clone(),
        )
        .spawn(&Conflated::new(), target_rx, &mut tasks);

        assert_eq!(result, Err(NavigationError::EmptyTrack));
        assert!(tasks.is_empty());
        assert_eq!(outputs.target.latest(), None);
    }
}
