//! The polling task.
//!
//! Owns the controller (and through it the SSH session) for its whole life.
//! Timer checks and on-demand requests run one at a time on this task.

use passwall_remote::CommandRunner;
use passwall_service::{AddressResult, ServiceController, ServiceState, ToggleAction};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PollConfig;
use crate::event::{LogLevel, LogLine, PollerEvent};

/// On-demand work queued by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Request {
    Status,
    Address,
    /// Toggle from the given state, or from the last known one if `None`.
    Toggle(Option<ServiceState>),
}

pub(crate) struct Worker<R> {
    pub(crate) controller: ServiceController<R>,
    pub(crate) config: PollConfig,
    pub(crate) events: mpsc::Sender<PollerEvent>,
    pub(crate) requests: mpsc::Receiver<Request>,
    pub(crate) cancel: CancellationToken,
    pub(crate) last_status: Option<ServiceState>,
    pub(crate) last_address: Option<AddressResult>,
}

impl<R: CommandRunner> Worker<R> {
    /// Runs until cancelled or until every request sender is gone.
    ///
    /// A check in progress is never interrupted by cancellation; it runs
    /// to its own timeout and cancellation is observed afterwards.
    pub(crate) async fn run(mut self) {
        self.log(
            LogLevel::Info,
            format!(
                "Background status monitoring started - polling interval: {} seconds",
                self.config.status_interval.as_secs()
            ),
        )
        .await;

        self.check_status().await;
        self.check_address().await;

        let mut since_address: u32 = 0;
        'poll: loop {
            let deadline = Instant::now() + self.config.status_interval;
            loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break 'poll,
                    request = self.requests.recv() => match request {
                        Some(request) => self.handle(request).await,
                        None => {
                            debug!("all poller handles dropped");
                            break 'poll;
                        }
                    },
                    _ = tokio::time::sleep_until(deadline) => break,
                }
            }

            self.check_status().await;
            since_address += 1;
            if since_address >= self.config.address_every {
                since_address = 0;
                self.check_address().await;
            }
        }

        let closed = self.controller.close().await;
        debug!(closed, "poll loop exited");
    }

    async fn handle(&mut self, request: Request) {
        debug!(?request, "handling on-demand request");
        match request {
            Request::Status => self.check_status().await,
            Request::Address => self.check_address().await,
            Request::Toggle(current) => self.toggle(current).await,
        }
    }

    pub(crate) async fn check_status(&mut self) {
        self.log(
            LogLevel::Info,
            "Initiating status check - connecting to router via SSH...",
        )
        .await;

        let state = match self.controller.probe_status().await {
            Ok(state) => {
                self.log(
                    LogLevel::Success,
                    format!(
                        "Pass Wall service status check completed - service is {}",
                        state.as_str().to_uppercase()
                    ),
                )
                .await;
                state
            }
            Err(e) => {
                self.log(
                    LogLevel::Error,
                    format!("Failed to retrieve Pass Wall service status from router: {e}"),
                )
                .await;
                ServiceState::Error
            }
        };

        if self.last_status != Some(state) {
            self.last_status = Some(state);
            self.emit(PollerEvent::StatusChanged(state)).await;
        }
    }

    pub(crate) async fn check_address(&mut self) {
        self.log(
            LogLevel::Info,
            "Initiating IP address check - connecting to router via SSH...",
        )
        .await;

        let report = self.controller.resolve_address().await;
        for (source, e) in &report.failures {
            self.log(LogLevel::Info, format!("Address source '{source}' failed: {e}"))
                .await;
        }

        match (&report.result, &report.source) {
            (AddressResult::Error, _) => {
                self.log(
                    LogLevel::Error,
                    "Failed to retrieve current IP address from all sources",
                )
                .await;
            }
            (result, source) => {
                self.log(
                    LogLevel::Success,
                    format!(
                        "IP address check completed - current IP: {result} (via {})",
                        source.as_deref().unwrap_or("unknown")
                    ),
                )
                .await;
            }
        }

        if self.last_address.as_ref() != Some(&report.result) {
            self.last_address = Some(report.result.clone());
            self.emit(PollerEvent::AddressChanged(report.result)).await;
        }
    }

    async fn toggle(&mut self, requested: Option<ServiceState>) {
        let known = requested.or(self.last_status);
        let current = known.unwrap_or(ServiceState::Error);
        let action = ToggleAction::for_state(current);
        let current_label = known.map_or("UNKNOWN".to_string(), |s| s.as_str().to_uppercase());

        self.log(
            LogLevel::Info,
            format!(
                "Initiating Pass Wall service toggle operation - attempting to {} service (current state: {current_label})",
                action.as_str().to_uppercase()
            ),
        )
        .await;

        match self.controller.toggle(current).await {
            Ok(action) => {
                self.log(
                    LogLevel::Success,
                    format!("Pass Wall service {action} command sent successfully to router"),
                )
                .await;
            }
            Err(e) => {
                self.log(
                    LogLevel::Error,
                    format!("Failed to {action} Pass Wall service: {e}"),
                )
                .await;
            }
        }

        // The remote side may change state late or fail silently.
        self.log(
            LogLevel::Info,
            "Verifying service state change by performing status check...",
        )
        .await;
        self.check_status().await;
    }

    async fn log(&mut self, level: LogLevel, text: impl Into<String>) {
        let line = LogLine::new(level, text);
        match level {
            LogLevel::Info | LogLevel::Success => info!(level = %level, "{}", line.text),
            LogLevel::Warning => warn!("{}", line.text),
            LogLevel::Error => error!("{}", line.text),
        }
        self.emit(PollerEvent::Log(line)).await;
    }

    async fn emit(&mut self, event: PollerEvent) {
        if self.events.send(event).await.is_err() {
            debug!("event receiver dropped");
        }
    }
}
