//! Transport-independent command execution seam.

use std::future::Future;
use std::pin::Pin;

use crate::error::ExecError;

/// A boxed future returned by [`CommandRunner`] methods.
pub type RunnerFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Captured output of one remote command. Neither stream is trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: Option<u32>,
}

impl CommandOutput {
    pub fn stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            exit_status: Some(0),
            ..Self::default()
        }
    }

    pub fn stderr(stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into(),
            exit_status: Some(1),
            ..Self::default()
        }
    }
}

/// Something that can run shell commands on the router.
///
/// [`RemoteSession`](crate::RemoteSession) implements this over SSH.
/// Calls take `&mut self`: one command is in flight at a time.
pub trait CommandRunner: Send {
    /// Runs `command` and returns its captured output.
    fn execute<'a>(
        &'a mut self,
        command: &'a str,
    ) -> RunnerFuture<'a, Result<CommandOutput, ExecError>>;

    /// Tears down the underlying transport. Returns `true` if a live
    /// transport was closed. Must be safe to call repeatedly.
    fn close(&mut self) -> RunnerFuture<'_, bool>;
}
