//! # Telemetry Engine
//!
//! Speed and arrival figures derived from the progress engine's outputs:
//! current speed, average speed since the last reset, remaining distance,
//! remaining time and ETA.
//!
//! Only fixes near the track count. While the latest fix is off the track the
//! remaining figures keep their last values instead of flickering to unknown.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::geo_utils::path_length;
use crate::progress::ProgressOutputs;
use crate::streams::{
    combine_latest3, consume_separately, distinct_until_changed, running_average, start_with,
    Conflated,
};
use crate::{GeoPoint, Route};

/// Meters per second to kilometers per hour.
pub fn speed_kmh(speed_mps: f32) -> f32 {
    speed_mps * 3.6
}

/// Distance and time left to the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RemainingEstimate {
    pub distance_m: f64,
    /// Whole seconds at the given speed, `None` when not moving
    pub time: Option<Duration>,
}

/// Estimate what's left between `current` and `target` at `speed_mps`.
///
/// A target at or behind the current index is zero distance and zero time
/// away. Without positive speed the time is unknown rather than zero.
///
/// # Example
/// ```
/// use route_pilot::GeoPoint;
/// use route_pilot::telemetry::estimate_remaining;
///
/// let track: Vec<GeoPoint> = (0..3).map(|i| GeoPoint::new(0.0, i as f64 * 0.01)).collect();
/// let estimate = estimate_remaining(&track, 0, 2, 10.0);
/// assert!((estimate.distance_m - 2_223.9).abs() < 1.0);
/// assert_eq!(estimate.time.map(|t| t.as_secs()), Some(222));
///
/// assert_eq!(estimate_remaining(&track, 0, 2, 0.0).time, None);
/// ```
pub fn estimate_remaining(
    track: &[GeoPoint],
    current: usize,
    target: usize,
    speed_mps: f32,
) -> RemainingEstimate {
    let distance_m = if current < target {
        path_length(track, current..=target)
    } else {
        0.0
    };

    let time = if speed_mps.is_finite() && speed_mps > 0.0 {
        let secs = (distance_m / f64::from(speed_mps)).round() as u64;
        Some(Duration::from_secs(secs))
    } else {
        None
    };

    RemainingEstimate { distance_m, time }
}

/// Wall-clock arrival time, only for a known, non-zero remaining time.
pub fn eta(now: DateTime<Utc>, remaining: Option<Duration>) -> Option<DateTime<Utc>> {
    let remaining = remaining.filter(|t| !t.is_zero())?;
    let delta = chrono::Duration::from_std(remaining).ok()?;
    now.checked_add_signed(delta)
}

// ============================================================================
// Engine
// ============================================================================

/// Channels the telemetry engine publishes to.
#[derive(Debug, Clone, Default)]
pub struct TelemetryOutputs {
    pub current_speed_kmh: Conflated<f32>,
    /// Mean of near-track speeds since the last reset
    pub average_speed_kmh: Conflated<f32>,
    pub remaining_distance_m: Conflated<f64>,
    /// `None` while not moving
    pub remaining_time: Conflated<Option<Duration>>,
    /// `None` while the remaining time is unknown or zero
    pub eta: Conflated<Option<DateTime<Utc>>>,
}

/// Telemetry engine for one route.
pub struct TelemetryEngine {
    route: Arc<Route>,
    outputs: TelemetryOutputs,
}

impl TelemetryEngine {
    pub fn new(route: Arc<Route>, outputs: TelemetryOutputs) -> Self {
        Self { route, outputs }
    }

    pub fn outputs(&self) -> &TelemetryOutputs {
        &self.outputs
    }

    /// Start the engine's tasks on `tasks`, reading from the progress
    /// engine's outputs. Each value sent on `resets` restarts the average.
    pub fn spawn(self, progress: &ProgressOutputs, resets: &Conflated<()>, tasks: &mut JoinSet<()>) {
        self.spawn_current_speed(progress, tasks);
        self.spawn_average_speed(progress, resets, tasks);
        self.spawn_remaining(progress, tasks);
    }

    fn spawn_current_speed(&self, progress: &ProgressOutputs, tasks: &mut JoinSet<()>) {
        let output = self.outputs.current_speed_kmh.clone();
        let mut speeds = distinct_until_changed(
            progress
                .track_fixes
                .stream()
                .map(|f| speed_kmh(f.fix.speed_mps)),
        );

        tasks.spawn(async move {
            while let Some(speed) = speeds.next().await {
                output.send(speed);
            }
        });
    }

    fn spawn_average_speed(
        &self,
        progress: &ProgressOutputs,
        resets: &Conflated<()>,
        tasks: &mut JoinSet<()>,
    ) {
        let fixes = progress.track_fixes.clone();
        let output = self.outputs.average_speed_kmh.clone();
        let signals = start_with((), resets.subscribe_changes().into_stream());

        // First unit listens from engine start
        let mut initial = Some(fixes.subscribe_changes());

        tasks.spawn(consume_separately(signals, true, move |()| {
            let samples = match initial.take() {
                Some(subscription) => subscription,
                None => {
                    debug!("[TelemetryEngine] Average speed reset");
                    fixes.subscribe_changes()
                }
            };
            let output = output.clone();
            async move {
                let mut averages =
                    running_average(samples.into_stream().map(|f| speed_kmh(f.fix.speed_mps)));
                while let Some(average) = averages.next().await {
                    output.send(average);
                }
            }
        }));
    }

    fn spawn_remaining(&self, progress: &ProgressOutputs, tasks: &mut JoinSet<()>) {
        let route = Arc::clone(&self.route);
        let outputs = self.outputs.clone();
        let near_track = progress.near_track.clone();
        let mut inputs = combine_latest3(
            progress.current_index.stream(),
            progress.target.stream().map(|t| t.index),
            start_with(0.0f32, progress.track_fixes.stream().map(|f| f.fix.speed_mps)),
        );

        tasks.spawn(async move {
            while let Some((current, target, speed_mps)) = inputs.next().await {
                if near_track.latest() == Some(false) {
                    debug!("[TelemetryEngine] Off track, keeping last estimate");
                    continue;
                }
                let estimate = estimate_remaining(&route.track, current, target, speed_mps);
                outputs.remaining_distance_m.send(estimate.distance_m);
                outputs.remaining_time.send(estimate.time);
                outputs.eta.send(eta(Utc::now(), estimate.time));
            }
        });
    }
}
