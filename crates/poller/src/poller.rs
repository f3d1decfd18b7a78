use std::time::Duration;

use passwall_remote::CommandRunner;
use passwall_service::{ServiceController, ServiceState};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PollConfig;
use crate::event::{LogLevel, LogLine, PollerEvent};
use crate::worker::{Request, Worker};
use crate::{
    ABORT_TIMEOUT, EVENT_CHANNEL_CAPACITY, PollerError, REQUEST_QUEUE_CAPACITY, STOP_TIMEOUT,
};

/// Lifecycle of a [`Poller`]. A stopped poller is not restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// How [`Poller::stop`] ended the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The worker observed cancellation and closed the session itself.
    Graceful,
    /// The worker was aborted and the abort completed.
    Forced,
    /// The worker did not finish even after the abort; it was left behind.
    Detached,
    /// Nothing was running.
    NotRunning,
}

/// Cloneable control surface for a running poller.
///
/// Every method only enqueues; none waits for the work to happen.
#[derive(Debug, Clone)]
pub struct PollerHandle {
    requests: mpsc::Sender<Request>,
}

impl PollerHandle {
    pub fn refresh_status(&self) -> Result<(), PollerError> {
        enqueue(&self.requests, Request::Status)
    }

    pub fn refresh_address(&self) -> Result<(), PollerError> {
        enqueue(&self.requests, Request::Address)
    }

    /// Toggles from the worker's last known state.
    pub fn toggle(&self) -> Result<(), PollerError> {
        enqueue(&self.requests, Request::Toggle(None))
    }
}

fn enqueue(requests: &mpsc::Sender<Request>, request: Request) -> Result<(), PollerError> {
    match requests.try_send(request) {
        Ok(()) => Ok(()),
        Err(mpsc::error::TrySendError::Full(request)) => {
            warn!(?request, "request queue full, dropping request");
            Err(PollerError::QueueFull)
        }
        Err(mpsc::error::TrySendError::Closed(_)) => Err(PollerError::NotRunning),
    }
}

/// Periodic status and address checker running on its own task.
pub struct Poller<R> {
    state: PollerState,
    worker: Option<Worker<R>>,
    requests: mpsc::Sender<Request>,
    events_tx: Option<mpsc::Sender<PollerEvent>>,
    events_rx: Option<mpsc::Receiver<PollerEvent>>,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
    stop_timeout: Duration,
    abort_timeout: Duration,
}

impl<R: CommandRunner + 'static> Poller<R> {
    pub fn new(controller: ServiceController<R>, config: PollConfig) -> Self {
        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_QUEUE_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let worker = Worker {
            controller,
            config,
            events: events_tx.clone(),
            requests: requests_rx,
            cancel: cancel.clone(),
            last_status: None,
            last_address: None,
        };

        Self {
            state: PollerState::Idle,
            worker: Some(worker),
            requests: requests_tx,
            events_tx: Some(events_tx),
            events_rx: Some(events_rx),
            cancel,
            join: None,
            stop_timeout: STOP_TIMEOUT,
            abort_timeout: ABORT_TIMEOUT,
        }
    }

    /// Take the event receiver. Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<PollerEvent>> {
        self.events_rx.take()
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn handle(&self) -> PollerHandle {
        PollerHandle {
            requests: self.requests.clone(),
        }
    }

    /// Spawns the worker on the current tokio runtime.
    pub fn start(&mut self) -> Result<(), PollerError> {
        if self.state != PollerState::Idle {
            return Err(PollerError::InvalidState(self.state, PollerState::Idle));
        }
        let Some(worker) = self.worker.take() else {
            return Err(PollerError::InvalidState(self.state, PollerState::Idle));
        };

        info!(
            interval_secs = worker.config.status_interval.as_secs(),
            address_every = worker.config.address_every,
            "starting poller"
        );
        self.join = Some(tokio::spawn(worker.run()));
        self.state = PollerState::Running;
        Ok(())
    }

    pub fn request_toggle(&self, current: ServiceState) -> Result<(), PollerError> {
        self.running_enqueue(Request::Toggle(Some(current)))
    }

    pub fn request_status_check(&self) -> Result<(), PollerError> {
        self.running_enqueue(Request::Status)
    }

    pub fn request_address_check(&self) -> Result<(), PollerError> {
        self.running_enqueue(Request::Address)
    }

    fn running_enqueue(&self, request: Request) -> Result<(), PollerError> {
        if self.state != PollerState::Running {
            return Err(PollerError::NotRunning);
        }
        enqueue(&self.requests, request)
    }

    /// Stops the worker, waiting at most the stop timeout plus the abort
    /// timeout. Safe to call repeatedly.
    pub async fn stop(&mut self) -> StopOutcome {
        match self.state {
            PollerState::Idle => {
                self.state = PollerState::Stopped;
                self.worker = None;
                self.events_tx = None;
                return StopOutcome::NotRunning;
            }
            PollerState::Stopping | PollerState::Stopped => return StopOutcome::NotRunning,
            PollerState::Running => {}
        }

        self.state = PollerState::Stopping;
        self.cancel.cancel();
        let events_tx = self.events_tx.take();

        let outcome = match self.join.take() {
            None => StopOutcome::NotRunning,
            Some(mut join) => match tokio::time::timeout(self.stop_timeout, &mut join).await {
                Ok(_) => StopOutcome::Graceful,
                Err(_) => {
                    join.abort();
                    match tokio::time::timeout(self.abort_timeout, join).await {
                        Ok(_) => StopOutcome::Forced,
                        Err(_) => StopOutcome::Detached,
                    }
                }
            },
        };

        if matches!(outcome, StopOutcome::Forced | StopOutcome::Detached) {
            let text = format!(
                "Background monitoring did not stop within {}s and was terminated",
                self.stop_timeout.as_secs()
            );
            warn!(?outcome, "{text}");
            if let Some(tx) = &events_tx {
                let line = LogLine::new(LogLevel::Warning, text);
                if let Err(e) = tx.try_send(PollerEvent::Log(line)) {
                    debug!(error = %e, "stop warning not delivered");
                }
            }
        }

        self.state = PollerState::Stopped;
        debug!(?outcome, "poller stopped");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use passwall_remote::{CommandOutput, ExecError, RunnerFuture};
    use passwall_service::ServiceConfig;

    use super::*;

    struct IdleRunner;

    impl CommandRunner for IdleRunner {
        fn execute<'a>(
            &'a mut self,
            _command: &'a str,
        ) -> RunnerFuture<'a, Result<CommandOutput, ExecError>> {
            Box::pin(async { Ok(CommandOutput::stdout("")) })
        }

        fn close(&mut self) -> RunnerFuture<'_, bool> {
            Box::pin(async { false })
        }
    }

    fn poller() -> Poller<IdleRunner> {
        let controller =
            ServiceController::with_resolvers(IdleRunner, ServiceConfig::default(), Vec::new());
        Poller::new(controller, PollConfig::default())
    }

    #[test]
    fn take_events_only_once() {
        let mut poller = poller();
        assert!(poller.take_events().is_some());
        assert!(poller.take_events().is_none());
    }

    #[test]
    fn requests_before_start_are_rejected() {
        let poller = poller();
        assert_eq!(poller.state(), PollerState::Idle);
        assert_eq!(poller.request_status_check(), Err(PollerError::NotRunning));
        assert_eq!(
            poller.request_toggle(ServiceState::Active),
            Err(PollerError::NotRunning)
        );
    }

    #[tokio::test]
    async fn start_twice_is_invalid() {
        let mut poller = poller();
        let _events = poller.take_events();
        poller.start().unwrap();
        assert_eq!(
            poller.start(),
            Err(PollerError::InvalidState(
                PollerState::Running,
                PollerState::Idle
            ))
        );
        assert_eq!(poller.stop().await, StopOutcome::Graceful);
        assert_eq!(poller.state(), PollerState::Stopped);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mut poller = poller();
        let _events = poller.take_events();
        poller.start().unwrap();
        assert_eq!(poller.stop().await, StopOutcome::Graceful);
        assert_eq!(poller.stop().await, StopOutcome::NotRunning);
        assert_eq!(poller.request_address_check(), Err(PollerError::NotRunning));
    }

    #[tokio::test]
    async fn stop_before_start() {
        let mut poller = poller();
        assert_eq!(poller.stop().await, StopOutcome::NotRunning);
        assert_eq!(poller.state(), PollerState::Stopped);
        assert!(matches!(
            poller.start(),
            Err(PollerError::InvalidState(PollerState::Stopped, _))
        ));
    }

    #[test]
    fn full_queue_drops_requests() {
        let poller = poller();
        let handle = poller.handle();
        for _ in 0..REQUEST_QUEUE_CAPACITY {
            handle.refresh_status().unwrap();
        }
        assert_eq!(handle.refresh_address(), Err(PollerError::QueueFull));
    }

    #[test]
    fn handle_after_drop_reports_not_running() {
        let poller = poller();
        let handle = poller.handle();
        drop(poller);
        assert_eq!(handle.toggle(), Err(PollerError::NotRunning));
    }
}
