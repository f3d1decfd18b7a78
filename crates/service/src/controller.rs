//! Service control on top of a [`CommandRunner`].

use std::fmt;

use passwall_remote::{CommandRunner, ExecError};
use tracing::{debug, info, warn};

use crate::address::{AddressReport, AddressResolver, AddressResult, build_resolvers};
use crate::state::{ServiceConfig, ServiceState};

/// The init-script action a toggle issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Start,
    Stop,
}

impl ToggleAction {
    /// `Stop` only when the service is confirmed active; anything else,
    /// including an undetermined state, attempts a start.
    pub fn for_state(current: ServiceState) -> Self {
        if current.is_active() {
            ToggleAction::Stop
        } else {
            ToggleAction::Start
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToggleAction::Start => "start",
            ToggleAction::Stop => "stop",
        }
    }
}

impl fmt::Display for ToggleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A start/stop command that failed or complained.
#[derive(Debug, thiserror::Error)]
pub enum ToggleError {
    #[error("init script wrote to stderr: {0}")]
    Stderr(String),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Translates service intents into remote commands.
pub struct ServiceController<R> {
    runner: R,
    config: ServiceConfig,
    resolvers: Vec<Box<dyn AddressResolver>>,
}

impl<R: CommandRunner> ServiceController<R> {
    /// Creates a controller with the resolver chain described by
    /// `config.address`.
    pub fn new(runner: R, config: ServiceConfig) -> Self {
        let resolvers = build_resolvers(&config.address);
        Self::with_resolvers(runner, config, resolvers)
    }

    /// Creates a controller with an explicit resolver chain.
    pub fn with_resolvers(
        runner: R,
        config: ServiceConfig,
        resolvers: Vec<Box<dyn AddressResolver>>,
    ) -> Self {
        Self {
            runner,
            config,
            resolvers,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Queries the process list. Returns the execution error instead of
    /// collapsing it, for callers that want to log the cause.
    pub async fn probe_status(&mut self) -> Result<ServiceState, ExecError> {
        let command = self.config.status_command();
        let output = self.runner.execute(&command).await?;
        if output.stdout.trim().is_empty() {
            Ok(ServiceState::Inactive)
        } else {
            Ok(ServiceState::Active)
        }
    }

    /// Queries the process list: matching output means `Active`, no output
    /// means `Inactive`, failure to run the query means `Error`.
    pub async fn status(&mut self) -> ServiceState {
        match self.probe_status().await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "status query failed");
                ServiceState::Error
            }
        }
    }

    /// Issues `stop` if `current` is `Active`, `start` otherwise.
    ///
    /// Success only means the command ran cleanly; callers confirm the
    /// transition with a fresh [`status`](Self::status).
    pub async fn toggle(&mut self, current: ServiceState) -> Result<ToggleAction, ToggleError> {
        let action = ToggleAction::for_state(current);
        let command = format!("{} {}", self.config.init_script, action);
        info!(%current, %action, "toggling service");

        let output = self.runner.execute(&command).await?;
        if !output.stderr.is_empty() {
            return Err(ToggleError::Stderr(output.stderr.trim().to_string()));
        }
        Ok(action)
    }

    /// Runs the resolver chain and reports every failed attempt.
    pub async fn resolve_address(&mut self) -> AddressReport {
        let mut failures = Vec::new();
        for resolver in &self.resolvers {
            match resolver.resolve(&mut self.runner).await {
                Ok(result) => {
                    debug!(resolver = resolver.name(), %result, "address resolved");
                    return AddressReport {
                        result,
                        source: Some(resolver.name().to_string()),
                        failures,
                    };
                }
                Err(e) => {
                    debug!(resolver = resolver.name(), error = %e, "address resolver failed");
                    failures.push((resolver.name().to_string(), e));
                }
            }
        }

        warn!(attempts = failures.len(), "all address resolvers failed");
        AddressReport {
            result: AddressResult::Error,
            source: None,
            failures,
        }
    }

    /// Returns the first validated address from the chain, or `Error`.
    pub async fn external_address(&mut self) -> AddressResult {
        self.resolve_address().await.result
    }

    /// Closes the underlying transport.
    pub async fn close(&mut self) -> bool {
        self.runner.close().await
    }
}
