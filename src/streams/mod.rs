//! # Stream Primitives
//!
//! Building blocks the progress and telemetry engines are composed from.
//!
//! ## Channels
//!
//! - [`Conflated`]: one producer, any number of subscribers, only the latest
//!   value survives. A slow subscriber never holds the producer back.
//! - [`mailbox`]: a single-consumer queue of capacity one where a newer item
//!   replaces a pending one, so a burst of user taps collapses to the last
//!   intent without losing it before the consumer starts.
//!
//! ## Combinators
//!
//! - [`combine_latest`] (and the [`combine_latest2`] / [`combine_latest3`]
//!   adaptors for mixed item types): re-evaluate from the latest value of
//!   every input once all of them have produced one
//! - [`distinct_until_changed`]: drop consecutive duplicates
//! - [`start_with`]: prime a stream with a seed value
//! - [`running_average`]: mean of everything seen so far
//! - [`complete_by`]: end after the first item matching a predicate
//!
//! ## Supervision
//!
//! - [`Supervisor`] / [`consume_separately`]: run one cancellable unit of
//!   work per control signal, replacing the previous unit each time.

mod channel;
mod combinators;
mod supervisor;

pub use channel::{mailbox, Conflated, MailboxReceiver, MailboxSender, Subscription};
pub use combinators::{
    combine_latest, combine_latest2, combine_latest3, complete_by, distinct_until_changed,
    running_average, start_with,
};
pub use supervisor::{consume_separately, Supervisor};
