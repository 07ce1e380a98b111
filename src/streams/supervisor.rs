//! One-at-a-time task supervision.

use std::future::Future;

use futures::stream::{Stream, StreamExt};
use log::warn;
use tokio::task::JoinHandle;

/// Owns at most one running unit of work.
///
/// Starting a new unit aborts the running one first. With `await_stop` set
/// the supervisor also waits for the aborted unit to finish before starting
/// the next, so two units never overlap. Dropping the supervisor aborts the
/// running unit.
#[derive(Debug)]
pub struct Supervisor {
    current: Option<JoinHandle<()>>,
    await_stop: bool,
}

impl Supervisor {
    pub fn new(await_stop: bool) -> Self {
        Self {
            current: None,
            await_stop,
        }
    }

    /// Stop the running unit (if any) and spawn `unit` in its place.
    pub async fn replace<F>(&mut self, unit: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.stop().await;
        self.current = Some(tokio::spawn(unit));
    }

    /// Abort the running unit.
    pub async fn stop(&mut self) {
        let Some(handle) = self.current.take() else {
            return;
        };
        handle.abort();
        if self.await_stop {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    warn!("[Supervisor] Unit panicked: {}", e);
                }
            }
        }
    }

    /// Wait for the running unit to finish on its own.
    pub async fn join(&mut self) {
        if let Some(handle) = self.current.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    warn!("[Supervisor] Unit panicked: {}", e);
                }
            }
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.abort();
        }
    }
}

/// Run one unit of work per signal, each replacing the previous one.
///
/// `unit` is called synchronously for every signal, so it can subscribe to
/// its inputs before the previous unit is stopped. When `signals` ends the
/// last unit is left to finish. Cancelling the returned future aborts the
/// running unit.
pub async fn consume_separately<S, F, Fut>(signals: S, await_stop: bool, mut unit: F)
where
    S: Stream,
    F: FnMut(S::Item) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut supervisor = Supervisor::new(await_stop);
    futures::pin_mut!(signals);

    while let Some(signal) = signals.next().await {
        let next = unit(signal);
        supervisor.replace(next).await;
    }

    supervisor.join().await;
}
