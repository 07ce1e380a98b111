//! Latest-value broadcast and coalescing mailbox.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::{watch, Notify};

// ============================================================================
// Conflated broadcast
// ============================================================================

/// Latest-value broadcast channel.
///
/// Backed by a single `watch` slot holding `Option<T>` (`None` until the first
/// send). Sending replaces the slot and wakes every subscriber; subscribers
/// that fall behind skip straight to the newest value. Clones share the slot.
#[derive(Debug)]
pub struct Conflated<T> {
    tx: Arc<watch::Sender<Option<T>>>,
}

impl<T> Clone for Conflated<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T> Default for Conflated<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Conflated<T> {
    /// An empty channel.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// A channel already holding `value`.
    pub fn with_value(value: T) -> Self {
        let (tx, _) = watch::channel(Some(value));
        Self { tx: Arc::new(tx) }
    }

    /// Publish a value, replacing whatever was there.
    ///
    /// Never blocks and never fails, even with no subscribers.
    pub fn send(&self, value: T) {
        self.tx.send_replace(Some(value));
    }

    /// Subscribe, receiving the current value (if any) first.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            rx: self.tx.subscribe(),
            primed: false,
        }
    }

    /// Subscribe to values sent from now on only.
    pub fn subscribe_changes(&self) -> Subscription<T> {
        Subscription {
            rx: self.tx.subscribe(),
            primed: true,
        }
    }
}

impl<T: Clone> Conflated<T> {
    /// The current value without subscribing.
    pub fn latest(&self) -> Option<T> {
        self.tx.borrow().clone()
    }
}

impl<T> Conflated<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Stream of values, starting with the current one.
    pub fn stream(&self) -> BoxStream<'static, T> {
        self.subscribe().into_stream()
    }
}

/// A subscriber's view of a [`Conflated`] channel.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: watch::Receiver<Option<T>>,
    primed: bool,
}

impl<T: Clone> Subscription<T> {
    /// Wait for the next value not yet seen by this subscription.
    ///
    /// Returns `None` once every handle to the channel is gone.
    pub async fn recv(&mut self) -> Option<T> {
        if !self.primed {
            self.primed = true;
            let current = self.rx.borrow_and_update().clone();
            if current.is_some() {
                return current;
            }
        }

        loop {
            self.rx.changed().await.ok()?;
            let current = self.rx.borrow_and_update().clone();
            if current.is_some() {
                return current;
            }
        }
    }
}

impl<T> Subscription<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn into_stream(self) -> BoxStream<'static, T> {
        stream::unfold(self, |mut sub| async move {
            let value = sub.recv().await?;
            Some((value, sub))
        })
        .boxed()
    }
}

// ============================================================================
// Coalescing mailbox
// ============================================================================

#[derive(Debug)]
struct Mailbox<T> {
    slot: Mutex<Option<T>>,
    notify: Notify,
    senders: AtomicUsize,
    closed: AtomicBool,
}

/// Create a capacity-one mailbox.
///
/// An item offered while another is still pending replaces it. Items offered
/// before the receiver starts listening are kept until it does.
pub fn mailbox<T>() -> (MailboxSender<T>, MailboxReceiver<T>) {
    let shared = Arc::new(Mailbox {
        slot: Mutex::new(None),
        notify: Notify::new(),
        senders: AtomicUsize::new(1),
        closed: AtomicBool::new(false),
    });
    (
        MailboxSender {
            shared: Arc::clone(&shared),
        },
        MailboxReceiver { shared },
    )
}

/// Sending half of a [`mailbox`]. Cheap to clone.
#[derive(Debug)]
pub struct MailboxSender<T> {
    shared: Arc<Mailbox<T>>,
}

impl<T> MailboxSender<T> {
    /// Deposit an item, returning the pending item it replaced, if any.
    pub fn offer(&self, item: T) -> Option<T> {
        let replaced = self
            .shared
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(item);
        self.shared.notify.notify_one();
        replaced
    }
}

impl<T> Clone for MailboxSender<T> {
    fn clone(&self) -> Self {
        self.shared.senders.fetch_add(1, Ordering::Relaxed);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for MailboxSender<T> {
    fn drop(&mut self) {
        if self.shared.senders.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.closed.store(true, Ordering::Release);
            self.shared.notify.notify_one();
        }
    }
}

/// Receiving half of a [`mailbox`].
#[derive(Debug)]
pub struct MailboxReceiver<T> {
    shared: Arc<Mailbox<T>>,
}

impl<T> MailboxReceiver<T> {
    /// Take the pending item, waiting for one if necessary.
    ///
    /// Returns `None` once all senders are gone and nothing is pending.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            if let Some(item) = self.try_recv() {
                return Some(item);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                // A last item may have landed between the two checks
                return self.try_recv();
            }
            self.shared.notify.notified().await;
        }
    }

    /// Take the pending item without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.shared
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
