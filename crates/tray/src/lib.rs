//! Tray side of the Passwall switcher.
//!
//! The tray talks to the application core via channels:
//! - [`TrayEvent`]: user actions from the tray (toggle, refresh, quit)
//! - [`TrayUpdate`]: state pushed to the tray (status, address, log lines,
//!   notifications)
//!
//! [`TrayState`] folds poller events into the current status and address
//! and decides which changes deserve a desktop notification.
//!
//! # Platform notes
//! - The GUI backend is not part of this crate
//! - The tray event loop must run on the main thread on some platforms

mod state;
mod tray;

pub use state::{Notification, NotificationKind, TrayState};
pub use tray::{TrayConfig, TrayEvent, TrayHandle, TrayUpdate};
