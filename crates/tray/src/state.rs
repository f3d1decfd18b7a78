//! Consumer-side view of the service, updated only from poller events.

use passwall_poller::PollerEvent;
use passwall_service::{AddressResult, ServiceState};

/// Title used for every notification.
const NOTIFICATION_TITLE: &str = "Passwall Switch";

/// Urgency of a desktop notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Critical,
}

/// A desktop notification for the tray to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub kind: NotificationKind,
}

impl Notification {
    fn info(body: impl Into<String>) -> Self {
        Self {
            title: NOTIFICATION_TITLE.into(),
            body: body.into(),
            kind: NotificationKind::Info,
        }
    }

    fn critical(body: impl Into<String>) -> Self {
        Self {
            title: NOTIFICATION_TITLE.into(),
            body: body.into(),
            kind: NotificationKind::Critical,
        }
    }
}

/// Current status and address as last reported by the poller.
#[derive(Debug, Clone, Default)]
pub struct TrayState {
    status: Option<ServiceState>,
    address: Option<AddressResult>,
    last_notified: Option<ServiceState>,
}

impl TrayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the first status result arrives.
    pub fn status(&self) -> Option<ServiceState> {
        self.status
    }

    pub fn address(&self) -> Option<&AddressResult> {
        self.address.as_ref()
    }

    /// Status line, e.g. `Status: Active`.
    pub fn status_label(&self) -> String {
        let status = match self.status {
            Some(ServiceState::Active) => "Active",
            Some(ServiceState::Inactive) => "Inactive",
            Some(ServiceState::Error) => "Error",
            None => "Unknown",
        };
        format!("Status: {status}")
    }

    /// Address line, e.g. `IP: 203.0.113.5`.
    pub fn address_label(&self) -> String {
        match &self.address {
            Some(address) => format!("IP: {address}"),
            None => "IP: Unknown".into(),
        }
    }

    /// Folds one event into the state. Returns a notification when the
    /// status differs from the last one notified, or when a new usable
    /// address arrives. Log events never notify.
    pub fn apply(&mut self, event: &PollerEvent) -> Option<Notification> {
        match event {
            PollerEvent::StatusChanged(state) => {
                self.status = Some(*state);
                if self.last_notified == Some(*state) {
                    return None;
                }
                self.last_notified = Some(*state);
                Some(match state {
                    ServiceState::Active => {
                        Notification::info("Passwall has been activated and is now running.")
                    }
                    ServiceState::Inactive => {
                        Notification::info("Passwall has been deactivated and is now stopped.")
                    }
                    ServiceState::Error => {
                        Notification::critical("Failed to connect or retrieve status.")
                    }
                })
            }
            PollerEvent::AddressChanged(address) => {
                let changed = self.address.as_ref() != Some(address);
                self.address = Some(address.clone());
                if changed && !address.is_error() {
                    Some(Notification::info(format!("Current IP address: {address}")))
                } else {
                    None
                }
            }
            PollerEvent::Log(_) => None,
        }
    }
}
