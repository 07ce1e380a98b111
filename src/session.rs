//! # Navigation Session
//!
//! One session per open route. The session loads the route through a
//! [`RouteLoader`], projects its waypoints, starts the progress and telemetry
//! engines and pumps fixes from a [`LocationProvider`] into them.
//!
//! Everything runs under a single root task. Closing (or dropping) the
//! session aborts it, which drops the task group and with it the location
//! subscription.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let session = NavigationSession::start(loader, provider, NavigationConfig::default());
//! let mut events = session.outputs().events.subscribe();
//! let mut remaining = session.outputs().progress.remaining.subscribe();
//!
//! session.select_waypoint(2);
//! session.reset_average_speed();
//! ```

use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::task::{JoinHandle, JoinSet};

use crate::error::{NavigationError, Result};
use crate::geo_utils::polyline_length;
use crate::progress::{ProgressEngine, ProgressOutputs};
use crate::projection::project_waypoints;
use crate::streams::{mailbox, Conflated, MailboxReceiver, MailboxSender};
use crate::telemetry::{TelemetryEngine, TelemetryOutputs};
use crate::{Bounds, GeoPoint, LocationUpdate, NavigationConfig, Route, Target};

// ============================================================================
// Collaborators
// ============================================================================

/// Source of the route for a session. Awaited once.
pub trait RouteLoader: Send + Sync + 'static {
    fn load(&self) -> BoxFuture<'static, Result<Route>>;
}

/// Adapter for synchronous route parsers.
///
/// The parser runs on the blocking thread pool so file I/O never stalls the
/// engines.
pub struct BlockingRouteLoader<F> {
    parse: Arc<F>,
}

impl<F> BlockingRouteLoader<F>
where
    F: Fn() -> Result<Route> + Send + Sync + 'static,
{
    pub fn new(parse: F) -> Self {
        Self {
            parse: Arc::new(parse),
        }
    }
}

impl<F> RouteLoader for BlockingRouteLoader<F>
where
    F: Fn() -> Result<Route> + Send + Sync + 'static,
{
    fn load(&self) -> BoxFuture<'static, Result<Route>> {
        let parse = Arc::clone(&self.parse);
        async move {
            tokio::task::spawn_blocking(move || parse())
                .await
                .map_err(|e| NavigationError::RouteLoad {
                    message: format!("Parser task failed: {}", e),
                })?
        }
        .boxed()
    }
}

/// Source of live location updates.
///
/// Dropping the returned stream unsubscribes.
pub trait LocationProvider: Send + Sync + 'static {
    fn subscribe(&self) -> BoxStream<'static, LocationUpdate>;
}

// ============================================================================
// Outputs
// ============================================================================

/// Once-per-session notification about the route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Route loaded and engines running
    RouteReady {
        name: Option<String>,
        bounds: Bounds,
        waypoints: usize,
        projected: usize,
    },
    /// Route can't be used; the session has stopped
    RouteUnavailable { reason: String },
}

/// Every channel a UI layer can subscribe to.
///
/// Created with the session, so subscribing before the route is loaded is
/// fine.
#[derive(Debug, Clone, Default)]
pub struct SessionOutputs {
    pub progress: ProgressOutputs,
    pub telemetry: TelemetryOutputs,
    /// Camera bounds of the track
    pub bounds: Conflated<Bounds>,
    pub events: Conflated<SessionEvent>,
}

// ============================================================================
// Session
// ============================================================================

/// A running session for one route.
pub struct NavigationSession {
    outputs: SessionOutputs,
    targets: MailboxSender<Target>,
    resets: Conflated<()>,
    root: JoinHandle<()>,
}

impl NavigationSession {
    /// Start a session.
    ///
    /// # Panics
    /// Outside a Tokio runtime.
    pub fn start<L, P>(loader: L, provider: P, config: NavigationConfig) -> Self
    where
        L: RouteLoader,
        P: LocationProvider,
    {
        let outputs = SessionOutputs::default();
        let (targets, target_rx) = mailbox();
        let resets = Conflated::new();

        let root = tokio::spawn(run(
            loader,
            provider,
            config,
            outputs.clone(),
            target_rx,
            resets.clone(),
        ));

        Self {
            outputs,
            targets,
            resets,
            root,
        }
    }

    pub fn outputs(&self) -> &SessionOutputs {
        &self.outputs
    }

    /// Measure progress against `target` from now on.
    pub fn select_target(&self, target: Target) {
        if let Some(replaced) = self.targets.offer(target) {
            debug!("[NavigationSession] Target {:?} superseded", replaced);
        }
    }

    pub fn select_waypoint(&self, index: usize) {
        self.select_target(Target::Waypoint(index));
    }

    pub fn select_point(&self, point: GeoPoint) {
        self.select_target(Target::Point(point));
    }

    /// Restart the average speed from the next sample.
    pub fn reset_average_speed(&self) {
        self.resets.send(());
    }

    /// Whether the session has stopped, by closing or because the route was
    /// unavailable.
    pub fn is_finished(&self) -> bool {
        self.root.is_finished()
    }

    /// Stop every task of the session.
    pub fn close(&self) {
        self.root.abort();
    }
}

impl Drop for NavigationSession {
    fn drop(&mut self) {
        self.root.abort();
    }
}

fn unavailable(outputs: &SessionOutputs, err: NavigationError) {
    error!("[NavigationSession] Route unavailable: {}", err);
    outputs.events.send(SessionEvent::RouteUnavailable {
        reason: err.to_string(),
    });
}

async fn run<L, P>(
    loader: L,
    provider: P,
    config: NavigationConfig,
    outputs: SessionOutputs,
    targets: MailboxReceiver<Target>,
    resets: Conflated<()>,
) where
    L: RouteLoader,
    P: LocationProvider,
{
    let route = match loader.load().await {
        Ok(route) => route,
        Err(e) => return unavailable(&outputs, e),
    };
    if let Err(e) = route.validate() {
        return unavailable(&outputs, e);
    }
    let Some(bounds) = route.bounds() else {
        return unavailable(&outputs, NavigationError::EmptyTrack);
    };
    outputs.bounds.send(bounds);

    if route.waypoints.is_empty() {
        warn!("[NavigationSession] Waypoints not found");
    }

    let route = Arc::new(route);
    let start = Instant::now();
    let projection = {
        let route = Arc::clone(&route);
        match tokio::task::spawn_blocking(move || project_waypoints(&route)).await {
            Ok(projection) => Arc::new(projection),
            Err(e) => {
                return unavailable(
                    &outputs,
                    NavigationError::RouteLoad {
                        message: format!("Projection failed: {}", e),
                    },
                )
            }
        }
    };
    info!(
        "[NavigationSession] Projected {}/{} waypoints onto {} points ({:.0} m) in {:?}",
        projection.len(),
        route.waypoints.len(),
        route.track.len(),
        polyline_length(&route.track),
        start.elapsed()
    );

    let mut tasks = JoinSet::new();
    let fixes = Conflated::new();

    let progress = ProgressEngine::new(
        Arc::clone(&route),
        Arc::clone(&projection),
        config,
        outputs.progress.clone(),
    );
    if let Err(e) = progress.spawn(&fixes, targets, &mut tasks) {
        return unavailable(&outputs, e);
    }
    TelemetryEngine::new(Arc::clone(&route), outputs.telemetry.clone()).spawn(
        &outputs.progress,
        &resets,
        &mut tasks,
    );

    let mut locations = provider.subscribe();
    tasks.spawn(async move {
        while let Some(update) = locations.next().await {
            fixes.send(update);
        }
        debug!("[NavigationSession] Location stream ended");
    });

    outputs.events.send(SessionEvent::RouteReady {
        name: route.name.clone(),
        bounds,
        waypoints: route.waypoints.len(),
        projected: projection.len(),
    });

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            if e.is_panic() {
                error!("[NavigationSession] Task panicked: {}", e);
            }
        }
    }
    debug!("[NavigationSession] All tasks finished");
}
