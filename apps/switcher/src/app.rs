//! Application orchestrator: wires the session, controller, poller and tray.

use std::io::BufRead;
use std::ops::ControlFlow;
use std::sync::mpsc;

use passwall_poller::{Poller, PollerError, PollerEvent, PollerHandle};
use passwall_remote::RemoteSession;
use passwall_service::ServiceController;
use passwall_tray::{TrayConfig, TrayEvent, TrayHandle, TrayUpdate};
use tokio::sync::mpsc as async_mpsc;

use crate::config::Config;

/// Runs the switcher until Ctrl-C or a tray quit.
pub async fn run(config: Config) -> anyhow::Result<()> {
    // -- Router --
    let endpoint = config.endpoint();
    tracing::info!(
        %endpoint,
        auth = endpoint.credentials.resolve().kind(),
        "router endpoint configured"
    );
    let session = RemoteSession::new(endpoint);
    let controller = ServiceController::new(session, config.service_config());

    // -- Poller --
    let mut poller = Poller::new(controller, config.poll_config());
    let mut events = poller
        .take_events()
        .ok_or_else(|| anyhow::anyhow!("poller events already taken"))?;
    let control = poller.handle();

    // -- Tray --
    let (mut tray, tray_events, update_rx) = TrayHandle::new(TrayConfig::default());
    let sink = tokio::task::spawn_blocking(move || headless_tray(update_rx));
    // Not joined: a read on stdin cannot be interrupted.
    std::thread::Builder::new()
        .name("console-input".into())
        .spawn(move || console_input(std::io::stdin().lock(), tray_events))?;

    poller.start()?;
    tracing::info!("switcher ready (commands: toggle, status, ip, show, quit)");

    // -- Main loop: forward events until shutdown --
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut tray_open = true;

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "failed to listen for SIGINT");
                }
                tracing::info!("SIGINT received, shutting down");
                break;
            }
            event = events.recv() => match event {
                Some(event) => {
                    let refreshes_tooltip = !matches!(event, PollerEvent::Log(_));
                    tray.forward(event);
                    if refreshes_tooltip {
                        tracing::debug!(tooltip = %tray.tooltip(), "tray tooltip updated");
                    }
                }
                None => {
                    tracing::warn!("poller event channel closed");
                    break;
                }
            },
            event = tray.recv_event(), if tray_open => match event {
                Some(event) => {
                    if dispatch(event, &control).is_break() {
                        tracing::info!("quit requested via tray");
                        break;
                    }
                }
                None => {
                    tracing::debug!("tray event sender dropped");
                    tray_open = false;
                }
            },
        }
    }

    // -- Graceful shutdown --
    tracing::info!("stopping services...");
    let outcome = poller.stop().await;
    tracing::info!(?outcome, "poller stopped");
    while let Ok(event) = events.try_recv() {
        tray.forward(event);
    }
    tray.shutdown();
    sink.await?;

    Ok(())
}

/// Turns a tray event into a poller request. Breaks on quit.
fn dispatch(event: TrayEvent, control: &PollerHandle) -> ControlFlow<()> {
    match event {
        TrayEvent::Quit => return ControlFlow::Break(()),
        TrayEvent::Toggle => report("toggle", control.toggle()),
        TrayEvent::RefreshStatus => report("status check", control.refresh_status()),
        TrayEvent::RefreshAddress => report("address check", control.refresh_address()),
        TrayEvent::ShowWindow => tracing::debug!("show window requested"),
    }
    ControlFlow::Continue(())
}

fn report(what: &str, result: Result<(), PollerError>) {
    if let Err(e) = result {
        tracing::warn!(error = %e, "{what} request dropped");
    }
}

fn parse_command(line: &str) -> Option<TrayEvent> {
    match line.trim().to_ascii_lowercase().as_str() {
        "t" | "toggle" => Some(TrayEvent::Toggle),
        "s" | "status" => Some(TrayEvent::RefreshStatus),
        "ip" | "address" => Some(TrayEvent::RefreshAddress),
        "show" | "window" => Some(TrayEvent::ShowWindow),
        "q" | "quit" | "exit" => Some(TrayEvent::Quit),
        _ => None,
    }
}

/// Stand-in for the tray menu: reads one command per line and sends the
/// matching event. Returns at end of input or once the core is gone.
fn console_input(reader: impl BufRead, events: async_mpsc::UnboundedSender<TrayEvent>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!(error = %e, "console input closed");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let Some(event) = parse_command(&line) else {
            tracing::warn!(command = %line.trim(), "unknown command");
            continue;
        };
        if events.send(event).is_err() {
            return;
        }
    }
    tracing::debug!("console input reached end of file");
}

/// Stand-in for a GUI tray: surfaces notifications through the log until
/// asked to shut down. Log lines are already traced by the poller.
fn headless_tray(updates: mpsc::Receiver<TrayUpdate>) {
    while let Ok(update) = updates.recv() {
        match update {
            TrayUpdate::Status(state) => tracing::debug!(%state, "{}", state.description()),
            TrayUpdate::Address(address) => tracing::debug!(%address, "address updated"),
            TrayUpdate::Log(_) => {}
            TrayUpdate::Notify(notification) => {
                tracing::info!(title = %notification.title, "{}", notification.body);
            }
            TrayUpdate::Shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use passwall_poller::{LogLevel, LogLine, PollConfig};
    use passwall_remote::{CommandOutput, CommandRunner, ExecError, RunnerFuture};
    use passwall_service::{ServiceConfig, ServiceState};

    use super::*;

    /// Router with Passwall running; records every command it is sent.
    #[derive(Clone, Default)]
    struct RecordingRouter(Arc<Mutex<Vec<String>>>);

    impl RecordingRouter {
        fn sent(&self, command: &str) -> usize {
            self.0.lock().unwrap().iter().filter(|c| *c == command).count()
        }
    }

    impl CommandRunner for RecordingRouter {
        fn execute<'a>(
            &'a mut self,
            command: &'a str,
        ) -> RunnerFuture<'a, Result<CommandOutput, ExecError>> {
            self.0.lock().unwrap().push(command.to_string());
            let output = if command.starts_with("ps w") {
                CommandOutput::stdout(" 2211 root  4096 S  /usr/share/passwall/app.sh\n")
            } else {
                CommandOutput::default()
            };
            let result: Result<CommandOutput, ExecError> = Ok(output);
            Box::pin(async move { result })
        }

        fn close(&mut self) -> RunnerFuture<'_, bool> {
            Box::pin(async { true })
        }
    }

    #[test]
    fn parse_console_commands() {
        assert_eq!(parse_command("toggle"), Some(TrayEvent::Toggle));
        assert_eq!(parse_command("  IP \r"), Some(TrayEvent::RefreshAddress));
        assert_eq!(parse_command("s"), Some(TrayEvent::RefreshStatus));
        assert_eq!(parse_command("show"), Some(TrayEvent::ShowWindow));
        assert_eq!(parse_command("Quit"), Some(TrayEvent::Quit));
        assert_eq!(parse_command("reboot"), None);
    }

    #[test]
    fn console_input_skips_unknown_lines() {
        let (mut tray, events, _updates) = TrayHandle::new(TrayConfig::default());
        console_input(Cursor::new("toggle\n\nreboot\nip\nquit\n"), events);

        assert_eq!(tray.try_recv_event(), Some(TrayEvent::Toggle));
        assert_eq!(tray.try_recv_event(), Some(TrayEvent::RefreshAddress));
        assert_eq!(tray.try_recv_event(), Some(TrayEvent::Quit));
        assert_eq!(tray.try_recv_event(), None);
    }

    #[test]
    fn console_input_stops_when_core_gone() {
        let (tray, events, _updates) = TrayHandle::new(TrayConfig::default());
        drop(tray);
        console_input(Cursor::new("toggle\nstatus\n"), events);
    }

    #[test]
    fn quit_breaks_and_requests_continue() {
        let controller = ServiceController::with_resolvers(
            RecordingRouter::default(),
            ServiceConfig::default(),
            Vec::new(),
        );
        let poller = Poller::new(controller, PollConfig::default());
        let control = poller.handle();

        assert!(dispatch(TrayEvent::Quit, &control).is_break());
        assert!(dispatch(TrayEvent::ShowWindow, &control).is_continue());
        assert!(dispatch(TrayEvent::RefreshStatus, &control).is_continue());
        drop(poller);
        // Dropped requests are reported, not fatal.
        assert!(dispatch(TrayEvent::Toggle, &control).is_continue());
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_line_stops_running_service() {
        let router = RecordingRouter::default();
        let controller =
            ServiceController::with_resolvers(router.clone(), ServiceConfig::default(), Vec::new());
        let mut poller = Poller::new(controller, PollConfig::new(60, 12));
        let _events = poller.take_events();
        let control = poller.handle();
        poller.start().unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let (mut tray, events, _updates) = TrayHandle::new(TrayConfig::default());
        console_input(Cursor::new("toggle\n"), events);
        let event = tray.recv_event().await.unwrap();
        assert!(dispatch(event, &control).is_continue());
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(router.sent("/etc/init.d/passwall stop"), 1);
        assert_eq!(router.sent("/etc/init.d/passwall start"), 0);
        poller.stop().await;
    }

    #[test]
    fn headless_tray_stops_on_shutdown() {
        let (mut tray, _events, update_rx) = TrayHandle::new(TrayConfig::default());
        tray.forward(PollerEvent::StatusChanged(ServiceState::Active));
        tray.forward(PollerEvent::Log(LogLine::new(LogLevel::Info, "checking")));
        tray.shutdown();

        let worker = std::thread::spawn(move || headless_tray(update_rx));
        worker.join().unwrap();
    }

    #[test]
    fn headless_tray_stops_when_core_gone() {
        let (tray, _events, update_rx) = TrayHandle::new(TrayConfig::default());
        drop(tray);
        let worker = std::thread::spawn(move || headless_tray(update_rx));
        worker.join().unwrap();
    }
}
