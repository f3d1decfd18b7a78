//! Remote command execution on the router over SSH.
//!
//! [`RemoteSession`] owns at most one authenticated connection to a single
//! [`Endpoint`]. The connection is opened lazily by the first command and
//! re-opened whenever the transport is found closed. Domain code talks to
//! the session through the [`CommandRunner`] trait so it can be exercised
//! against scripted fakes.

mod endpoint;
mod error;
mod runner;
mod session;

pub use endpoint::{AuthMethod, Credentials, Endpoint};
pub use error::{ConnectError, ExecError};
pub use runner::{CommandOutput, CommandRunner, RunnerFuture};
pub use session::RemoteSession;

use std::time::Duration;

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Upper bound for TCP connect, key exchange and authentication.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for a single remote command.
pub const EXEC_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for the disconnect handshake on close.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);
