//! Tray handle, events, and update types.
//!
//! The actual system tray implementation needs platform-specific GUI
//! libraries. This module defines the channel-based interface that the
//! application core uses to communicate with the tray, independent of the
//! GUI backend.

use std::sync::mpsc;

use passwall_poller::{LogLine, PollerEvent};
use passwall_service::{AddressResult, ServiceState};
use tokio::sync::mpsc as async_mpsc;
use tracing::debug;

use crate::state::{Notification, TrayState};

/// Configuration for the system tray.
#[derive(Debug, Clone)]
pub struct TrayConfig {
    /// Tooltip shown when hovering the tray icon.
    pub tooltip: String,
    /// Whether status and address changes raise desktop notifications.
    pub notifications: bool,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            tooltip: "Passwall Switch".into(),
            notifications: true,
        }
    }
}

/// Events emitted by the tray to the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayEvent {
    /// User clicked the toggle entry.
    Toggle,
    /// User asked for a fresh status check.
    RefreshStatus,
    /// User clicked "Refresh IP".
    RefreshAddress,
    /// User asked to bring the log window forward.
    ShowWindow,
    /// User clicked "Quit".
    Quit,
}

/// Updates sent from the application core to the tray.
#[derive(Debug, Clone)]
pub enum TrayUpdate {
    Status(ServiceState),
    Address(AddressResult),
    /// A line for the log view.
    Log(LogLine),
    /// A desktop notification to show.
    Notify(Notification),
    /// Request tray shutdown.
    Shutdown,
}

/// Handle for communicating with the system tray from the application core.
///
/// This is the async side of the tray interface. The tray event loop runs
/// on the main thread: it sends events with a non-blocking unbounded
/// sender and drains updates from a plain std receiver.
pub struct TrayHandle {
    update_tx: mpsc::Sender<TrayUpdate>,
    event_rx: async_mpsc::UnboundedReceiver<TrayEvent>,
    state: TrayState,
    tooltip: String,
    notifications: bool,
}

impl TrayHandle {
    /// Creates a new tray handle with its channel pair.
    ///
    /// Returns `(handle, event_sender, update_receiver)`; the sender and
    /// receiver go to the tray event loop.
    pub fn new(
        config: TrayConfig,
    ) -> (
        Self,
        async_mpsc::UnboundedSender<TrayEvent>,
        mpsc::Receiver<TrayUpdate>,
    ) {
        let (update_tx, update_rx) = mpsc::channel();
        let (event_tx, event_rx) = async_mpsc::unbounded_channel();

        let handle = Self {
            update_tx,
            event_rx,
            state: TrayState::new(),
            tooltip: config.tooltip,
            notifications: config.notifications,
        };

        (handle, event_tx, update_rx)
    }

    /// Folds a poller event into the tray state and pushes the resulting
    /// updates to the tray.
    pub fn forward(&mut self, event: PollerEvent) {
        let notification = self.state.apply(&event);
        let update = match event {
            PollerEvent::StatusChanged(state) => TrayUpdate::Status(state),
            PollerEvent::AddressChanged(address) => TrayUpdate::Address(address),
            PollerEvent::Log(line) => TrayUpdate::Log(line),
        };
        self.send(update);

        if let Some(notification) = notification {
            if self.notifications {
                self.send(TrayUpdate::Notify(notification));
            } else {
                debug!(body = %notification.body, "notification suppressed");
            }
        }
    }

    /// Requests the tray to shut down.
    pub fn shutdown(&self) {
        self.send(TrayUpdate::Shutdown);
    }

    /// Waits for the next tray event. Returns `None` once the tray side
    /// has dropped its sender.
    pub async fn recv_event(&mut self) -> Option<TrayEvent> {
        self.event_rx.recv().await
    }

    /// Tries to receive a tray event (non-blocking).
    pub fn try_recv_event(&mut self) -> Option<TrayEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn state(&self) -> &TrayState {
        &self.state
    }

    /// Tooltip text: the configured title followed by the status and
    /// address lines.
    pub fn tooltip(&self) -> String {
        format!(
            "{}\n{}\n{}",
            self.tooltip,
            self.state.status_label(),
            self.state.address_label()
        )
    }

    fn send(&self, update: TrayUpdate) {
        if self.update_tx.send(update).is_err() {
            debug!("tray update receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use passwall_poller::LogLevel;

    use super::*;

    fn drain(rx: &mpsc::Receiver<TrayUpdate>) -> Vec<TrayUpdate> {
        let mut updates = Vec::new();
        while let Ok(u) = rx.try_recv() {
            updates.push(u);
        }
        updates
    }

    #[test]
    fn tray_config_default() {
        let config = TrayConfig::default();
        assert_eq!(config.tooltip, "Passwall Switch");
        assert!(config.notifications);
    }

    #[test]
    fn forward_status_sends_update_and_notification() {
        let (mut handle, _event_tx, update_rx) = TrayHandle::new(TrayConfig::default());

        handle.forward(PollerEvent::StatusChanged(ServiceState::Active));
        let updates = drain(&update_rx);
        assert_eq!(updates.len(), 2);
        assert!(matches!(updates[0], TrayUpdate::Status(ServiceState::Active)));
        assert!(matches!(updates[1], TrayUpdate::Notify(_)));
        assert_eq!(handle.state().status(), Some(ServiceState::Active));
    }

    #[test]
    fn forward_log_line() {
        let (mut handle, _event_tx, update_rx) = TrayHandle::new(TrayConfig::default());

        handle.forward(PollerEvent::Log(LogLine::new(LogLevel::Info, "checking")));
        let updates = drain(&update_rx);
        assert_eq!(updates.len(), 1);
        assert!(matches!(&updates[0], TrayUpdate::Log(line) if line.text == "checking"));
    }

    #[test]
    fn notifications_can_be_disabled() {
        let config = TrayConfig {
            notifications: false,
            ..TrayConfig::default()
        };
        let (mut handle, _event_tx, update_rx) = TrayHandle::new(config);

        handle.forward(PollerEvent::StatusChanged(ServiceState::Error));
        let updates = drain(&update_rx);
        assert_eq!(updates.len(), 1);
        assert!(matches!(updates[0], TrayUpdate::Status(ServiceState::Error)));
    }

    #[test]
    fn tooltip_tracks_state() {
        let config = TrayConfig {
            tooltip: "Router".into(),
            ..TrayConfig::default()
        };
        let (mut handle, _event_tx, _update_rx) = TrayHandle::new(config);
        assert_eq!(handle.tooltip(), "Router\nStatus: Unknown\nIP: Unknown");

        handle.forward(PollerEvent::StatusChanged(ServiceState::Inactive));
        handle.forward(PollerEvent::AddressChanged(AddressResult::Public(
            "203.0.113.5".into(),
        )));
        assert_eq!(
            handle.tooltip(),
            "Router\nStatus: Inactive\nIP: 203.0.113.5"
        );
    }

    #[test]
    fn tray_handle_events() {
        let (mut handle, event_tx, _update_rx) = TrayHandle::new(TrayConfig::default());

        assert!(handle.try_recv_event().is_none());

        event_tx.send(TrayEvent::Quit).unwrap();
        assert_eq!(handle.try_recv_event(), Some(TrayEvent::Quit));
    }

    #[tokio::test]
    async fn recv_event_ends_when_tray_gone() {
        let (mut handle, event_tx, _update_rx) = TrayHandle::new(TrayConfig::default());

        event_tx.send(TrayEvent::Toggle).unwrap();
        drop(event_tx);
        assert_eq!(handle.recv_event().await, Some(TrayEvent::Toggle));
        assert_eq!(handle.recv_event().await, None);
    }

    #[test]
    fn tray_handle_shutdown() {
        let (handle, _event_tx, update_rx) = TrayHandle::new(TrayConfig::default());

        handle.shutdown();
        let update = update_rx.recv().unwrap();
        assert!(matches!(update, TrayUpdate::Shutdown));
    }

    #[test]
    fn shutdown_after_tray_dropped_is_silent() {
        let (handle, _event_tx, update_rx) = TrayHandle::new(TrayConfig::default());
        drop(update_rx);
        handle.shutdown();
    }
}
