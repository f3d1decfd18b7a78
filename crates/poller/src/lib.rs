//! Background polling of the Passwall service.
//!
//! A [`Poller`] owns a [`ServiceController`](passwall_service::ServiceController)
//! and drives it from a single tokio task: a status check every interval,
//! an address check every N-th status check, and on-demand requests
//! serialized between them. Results leave the task only as
//! [`PollerEvent`]s.
//!
//! ```text
//! consumer ──PollerHandle──▶ request queue ──▶ worker task ──▶ ServiceController
//!    ▲                                              │
//!    └────────────── PollerEvent channel ◀──────────┘
//! ```

mod config;
mod event;
mod poller;
mod worker;

pub use config::PollConfig;
pub use event::{LogLevel, LogLine, PollerEvent};
pub use poller::{Poller, PollerHandle, PollerState, StopOutcome};

use std::time::Duration;

/// How long `stop()` waits for the worker to exit on its own.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// How long `stop()` waits after aborting a worker that did not exit.
pub const ABORT_TIMEOUT: Duration = Duration::from_secs(1);

/// Pending on-demand requests beyond which new ones are dropped.
pub const REQUEST_QUEUE_CAPACITY: usize = 32;

/// Buffered events between the worker and the consumer.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Errors returned by the poller control surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollerError {
    #[error("poller is {0:?}, expected {1:?}")]
    InvalidState(PollerState, PollerState),

    #[error("poller is not running")]
    NotRunning,

    #[error("request queue is full")]
    QueueFull,
}
