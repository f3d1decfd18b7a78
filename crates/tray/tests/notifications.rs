use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use passwall_poller::{PollConfig, Poller};
use passwall_remote::{CommandOutput, CommandRunner, ExecError, RunnerFuture};
use passwall_service::{
    AddressResolver, RemoteCommandResolver, ServiceConfig, ServiceController, ServiceState,
};
use passwall_tray::{NotificationKind, TrayConfig, TrayHandle, TrayUpdate};
use tokio::time::sleep;

/// Router whose service state flips on init-script commands.
struct Router {
    running: Arc<AtomicBool>,
}

impl CommandRunner for Router {
    fn execute<'a>(
        &'a mut self,
        command: &'a str,
    ) -> RunnerFuture<'a, Result<CommandOutput, ExecError>> {
        let output = if command.starts_with("ps w") {
            if self.running.load(Ordering::SeqCst) {
                CommandOutput::stdout("2211 root /usr/share/passwall/app.sh\n")
            } else {
                CommandOutput::default()
            }
        } else if command.ends_with(" start") {
            self.running.store(true, Ordering::SeqCst);
            CommandOutput::default()
        } else if command.ends_with(" stop") {
            self.running.store(false, Ordering::SeqCst);
            CommandOutput::default()
        } else {
            CommandOutput::stdout("198.51.100.7")
        };
        let result: Result<CommandOutput, ExecError> = Ok(output);
        Box::pin(async move { result })
    }

    fn close(&mut self) -> RunnerFuture<'_, bool> {
        Box::pin(async { true })
    }
}

#[tokio::test(start_paused = true)]
async fn poller_events_drive_tray_notifications() {
    let running = Arc::new(AtomicBool::new(false));
    let resolvers: Vec<Box<dyn AddressResolver>> =
        vec![Box::new(RemoteCommandResolver::new("curl -s ifconfig.me"))];
    let controller = ServiceController::with_resolvers(
        Router {
            running: running.clone(),
        },
        ServiceConfig::default(),
        resolvers,
    );
    let mut poller = Poller::new(controller, PollConfig::new(5, 12));
    let mut events = poller.take_events().unwrap();
    let control = poller.handle();
    let (mut tray, _event_tx, update_rx) = TrayHandle::new(TrayConfig::default());

    poller.start().unwrap();
    sleep(Duration::from_secs(1)).await;
    control.toggle().unwrap();
    // Several timer checks with no change in between.
    sleep(Duration::from_secs(20)).await;
    poller.stop().await;

    while let Ok(event) = events.try_recv() {
        tray.forward(event);
    }
    tray.shutdown();

    let notifications: Vec<_> = update_rx
        .try_iter()
        .filter_map(|u| match u {
            TrayUpdate::Notify(n) => Some(n),
            _ => None,
        })
        .collect();

    let bodies: Vec<&str> = notifications.iter().map(|n| n.body.as_str()).collect();
    assert_eq!(
        bodies,
        vec![
            "Passwall has been deactivated and is now stopped.",
            "Current IP address: 198.51.100.7",
            "Passwall has been activated and is now running.",
        ]
    );
    assert!(notifications.iter().all(|n| n.kind == NotificationKind::Info));
    assert_eq!(tray.state().status(), Some(ServiceState::Active));
    assert_eq!(tray.state().address_label(), "IP: 198.51.100.7");
}
