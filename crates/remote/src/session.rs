//! SSH-backed [`CommandRunner`].

use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Handle};
use russh::keys::{HashAlg, PrivateKeyWithHashAlg, load_secret_key};
use russh::{ChannelMsg, Disconnect};
use tracing::{debug, info, warn};

use crate::endpoint::{AuthMethod, Endpoint};
use crate::error::{ConnectError, ExecError};
use crate::runner::{CommandOutput, CommandRunner, RunnerFuture};
use crate::{CLOSE_TIMEOUT, CONNECT_TIMEOUT, EXEC_TIMEOUT};

/// SSH extended data type carrying stderr.
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// Client handler that accepts the router's host key on first contact.
///
/// OpenWrt images regenerate host keys on reflash, so keys are not pinned.
/// The fingerprint is logged for auditing.
struct TrustOnFirstUse {
    host: String,
}

impl client::Handler for TrustOnFirstUse {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            host = %self.host,
            fingerprint = %server_public_key.fingerprint(HashAlg::Sha256),
            "accepting host key"
        );
        Ok(true)
    }
}

/// At most one authenticated SSH connection to a single [`Endpoint`].
pub struct RemoteSession {
    endpoint: Endpoint,
    config: Arc<client::Config>,
    handle: Option<Handle<TrustOnFirstUse>>,
    connect_timeout: Duration,
    exec_timeout: Duration,
}

impl RemoteSession {
    /// Creates a session. No connection is made until the first command.
    pub fn new(endpoint: Endpoint) -> Self {
        let config = client::Config {
            inactivity_timeout: Some(Duration::from_secs(300)),
            ..Default::default()
        };
        Self {
            endpoint,
            config: Arc::new(config),
            handle: None,
            connect_timeout: CONNECT_TIMEOUT,
            exec_timeout: EXEC_TIMEOUT,
        }
    }

    /// Overrides the connect and execution timeouts.
    pub fn with_timeouts(mut self, connect: Duration, exec: Duration) -> Self {
        self.connect_timeout = connect;
        self.exec_timeout = exec;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns `true` if a live transport is currently held.
    pub fn is_connected(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_closed())
    }

    /// Connects and authenticates unless a live transport already exists.
    pub async fn ensure_connected(&mut self) -> Result<(), ConnectError> {
        if self.is_connected() {
            return Ok(());
        }
        // Drop a dead handle before dialing again.
        self.handle = None;

        let timeout = self.connect_timeout;
        let handle = match tokio::time::timeout(timeout, self.connect()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(endpoint = %self.endpoint, ?timeout, "ssh connect timed out");
                return Err(ConnectError::Timeout(timeout));
            }
        };
        self.handle = Some(handle);
        Ok(())
    }

    async fn connect(&self) -> Result<Handle<TrustOnFirstUse>, ConnectError> {
        let endpoint = &self.endpoint;
        let handler = TrustOnFirstUse {
            host: endpoint.host.clone(),
        };

        let mut handle = client::connect(
            Arc::clone(&self.config),
            (endpoint.host.as_str(), endpoint.port),
            handler,
        )
        .await
        .map_err(|e| {
            warn!(endpoint = %endpoint, error = %e, "ssh transport failed");
            ConnectError::Transport(e.to_string())
        })?;

        let method = endpoint.credentials.resolve();
        info!(endpoint = %endpoint, method = %method, "authenticating");

        let user = endpoint.username.as_str();
        let auth = match &method {
            AuthMethod::KeyFile(path) => {
                let key = load_secret_key(path, None).map_err(|e| ConnectError::Key {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
                let hash_alg = handle
                    .best_supported_rsa_hash()
                    .await
                    .map_err(|e| ConnectError::Transport(e.to_string()))?
                    .flatten();
                handle
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
                    .await
            }
            AuthMethod::Password(password) => {
                handle.authenticate_password(user, password.as_str()).await
            }
            AuthMethod::None => handle.authenticate_none(user).await,
        }
        .map_err(|e| ConnectError::Transport(e.to_string()))?;

        if !auth.success() {
            warn!(endpoint = %endpoint, method = method.kind(), "authentication rejected");
            return Err(ConnectError::AuthenticationFailed {
                user: endpoint.username.clone(),
                method: method.kind(),
            });
        }

        info!(endpoint = %endpoint, "ssh session established");
        Ok(handle)
    }

    /// Runs `command`, connecting first if needed.
    ///
    /// Connection failures are returned without attempting execution. A
    /// transport that dies mid-command is dropped so the next call dials
    /// again.
    pub async fn execute(&mut self, command: &str) -> Result<CommandOutput, ExecError> {
        self.ensure_connected().await?;
        let Some(handle) = self.handle.as_ref() else {
            return Err(ExecError::Channel("session handle missing".into()));
        };

        debug!(command, "executing remote command");
        let timeout = self.exec_timeout;
        let result = match tokio::time::timeout(timeout, run_command(handle, command)).await {
            Ok(result) => result,
            Err(_) => Err(ExecError::Timeout(timeout)),
        };

        match &result {
            Ok(output) => {
                debug!(
                    command,
                    exit_status = ?output.exit_status,
                    stdout_len = output.stdout.len(),
                    stderr_len = output.stderr.len(),
                    "remote command finished"
                );
            }
            Err(e) => {
                warn!(command, error = %e, "remote command failed");
                if !self.is_connected() {
                    self.handle = None;
                }
            }
        }
        result
    }

    /// Closes the transport if open. Close errors are logged, never raised.
    ///
    /// Returns `true` if a live transport was torn down; repeated calls
    /// return `false` and touch nothing.
    pub async fn close(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };
        if handle.is_closed() {
            debug!(endpoint = %self.endpoint, "ssh transport already closed");
            return false;
        }

        let disconnect = handle.disconnect(Disconnect::ByApplication, "", "English");
        match tokio::time::timeout(CLOSE_TIMEOUT, disconnect).await {
            Ok(Ok(())) => info!(endpoint = %self.endpoint, "ssh session closed"),
            Ok(Err(e)) => warn!(endpoint = %self.endpoint, error = %e, "error while closing ssh session"),
            Err(_) => warn!(endpoint = %self.endpoint, "timed out closing ssh session"),
        }
        true
    }
}

/// Opens a session channel, runs the command and collects both streams.
async fn run_command(
    handle: &Handle<TrustOnFirstUse>,
    command: &str,
) -> Result<CommandOutput, ExecError> {
    let mut channel = handle
        .channel_open_session()
        .await
        .map_err(|e| ExecError::Channel(e.to_string()))?;
    channel
        .exec(true, command)
        .await
        .map_err(|e| ExecError::Channel(e.to_string()))?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_status = None;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
            ChannelMsg::ExtendedData { ref data, ext } if ext == SSH_EXTENDED_DATA_STDERR => {
                stderr.extend_from_slice(data)
            }
            ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
            _ => {}
        }
    }

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_status,
    })
}

impl CommandRunner for RemoteSession {
    fn execute<'a>(
        &'a mut self,
        command: &'a str,
    ) -> RunnerFuture<'a, Result<CommandOutput, ExecError>> {
        Box::pin(RemoteSession::execute(self, command))
    }

    fn close(&mut self) -> RunnerFuture<'_, bool> {
        Box::pin(RemoteSession::close(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// An endpoint nothing listens on.
    fn unreachable_endpoint() -> Endpoint {
        Endpoint::new("127.0.0.1", "root")
            .with_port(1)
            .with_password("secret")
    }

    #[tokio::test]
    async fn close_without_connection_is_noop() {
        let mut session = RemoteSession::new(unreachable_endpoint());
        assert!(!session.is_connected());
        assert!(!session.close().await);
        assert!(!session.close().await);
    }

    #[tokio::test]
    async fn execute_reports_connection_error_when_unreachable() {
        let mut session = RemoteSession::new(unreachable_endpoint())
            .with_timeouts(Duration::from_secs(2), Duration::from_secs(2));

        let result = session.execute("ps w").await;
        assert!(matches!(result, Err(ExecError::Connection(_))));
        assert!(!session.is_connected());

        // The failed attempt leaves nothing to close.
        assert!(!session.close().await);
    }

    #[tokio::test]
    async fn ensure_connected_error_is_not_auth_failure_when_unreachable() {
        let mut session = RemoteSession::new(unreachable_endpoint())
            .with_timeouts(Duration::from_secs(2), Duration::from_secs(2));

        let err = session.ensure_connected().await.unwrap_err();
        assert!(!err.is_auth_failure(), "unexpected error: {err}");
    }

    #[test]
    fn session_keeps_endpoint() {
        let session = RemoteSession::new(unreachable_endpoint());
        assert_eq!(session.endpoint().port, 1);
        assert_eq!(session.endpoint().username, "root");
    }
}
