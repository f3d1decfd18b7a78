//! External address discovery.
//!
//! Resolution is an ordered chain of [`AddressResolver`]s; the first one
//! that yields a valid dotted quad wins. The default chain asks the router
//! itself first, then queries a lookup service from this machine, and
//! finally falls back to the local address of an outbound socket.

use std::fmt;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::time::Duration;

use passwall_remote::{CommandRunner, ExecError};
use tracing::{debug, warn};

/// Timeout for local HTTP lookups.
const HTTP_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of address discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressResult {
    /// Public address as reported by a lookup service.
    Public(String),
    /// Address of this machine on the local network; not the public one.
    Local(String),
    Error,
}

impl AddressResult {
    pub fn is_error(&self) -> bool {
        matches!(self, AddressResult::Error)
    }
}

impl fmt::Display for AddressResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressResult::Public(ip) => f.write_str(ip),
            AddressResult::Local(ip) => write!(f, "{ip} (local)"),
            AddressResult::Error => f.write_str("error"),
        }
    }
}

/// Why a single resolver produced no address.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("remote command failed: {0}")]
    Exec(#[from] ExecError),

    #[error("remote command wrote to stderr: {0}")]
    Stderr(String),

    #[error("empty response")]
    Empty,

    #[error("not a valid IPv4 address: {0:?}")]
    Validation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("local address is not IPv4: {0}")]
    NotIpv4(IpAddr),
}

/// Returns `true` for four dot-separated base-10 components in `0..=255`.
///
/// Reserved and private ranges are accepted.
pub fn is_valid_ipv4(candidate: &str) -> bool {
    let parts: Vec<&str> = candidate.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|part| {
            !part.is_empty()
                && part.bytes().all(|b| b.is_ascii_digit())
                && part.parse::<u64>().is_ok_and(|n| n <= 255)
        })
}

fn validated(raw: &str) -> Result<String, ResolveError> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        return Err(ResolveError::Empty);
    }
    if !is_valid_ipv4(candidate) {
        return Err(ResolveError::Validation(candidate.to_string()));
    }
    Ok(candidate.to_string())
}

/// A boxed future returned by [`AddressResolver::resolve`].
pub type ResolveFuture<'a> =
    Pin<Box<dyn Future<Output = Result<AddressResult, ResolveError>> + Send + 'a>>;

/// One strategy in the address discovery chain.
pub trait AddressResolver: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Attempts to produce a validated address. Resolvers that run on the
    /// router use `runner`; local ones ignore it.
    fn resolve<'a>(&'a self, runner: &'a mut dyn CommandRunner) -> ResolveFuture<'a>;
}

/// Runs a command on the router that prints the router's public address.
pub struct RemoteCommandResolver {
    command: String,
}

impl RemoteCommandResolver {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl AddressResolver for RemoteCommandResolver {
    fn name(&self) -> &str {
        &self.command
    }

    fn resolve<'a>(&'a self, runner: &'a mut dyn CommandRunner) -> ResolveFuture<'a> {
        Box::pin(async move {
            let output = runner.execute(&self.command).await?;
            if !output.stderr.is_empty() {
                return Err(ResolveError::Stderr(output.stderr.trim().to_string()));
            }
            validated(&output.stdout).map(AddressResult::Public)
        })
    }
}

/// Queries an address lookup service directly from this machine.
pub struct HttpResolver {
    url: String,
    client: reqwest::Client,
}

impl HttpResolver {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

impl AddressResolver for HttpResolver {
    fn name(&self) -> &str {
        &self.url
    }

    fn resolve<'a>(&'a self, _runner: &'a mut dyn CommandRunner) -> ResolveFuture<'a> {
        Box::pin(async move {
            let body = self
                .client
                .get(&self.url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;
            validated(&body).map(AddressResult::Public)
        })
    }
}

/// Reads the local address the OS assigns to an outbound UDP socket.
///
/// `connect` on a datagram socket only selects a route; nothing is sent.
pub struct LocalSocketResolver {
    probe: SocketAddr,
}

impl LocalSocketResolver {
    pub fn new(probe: SocketAddr) -> Self {
        Self { probe }
    }
}

impl Default for LocalSocketResolver {
    fn default() -> Self {
        Self::new(SocketAddr::from(([8, 8, 8, 8], 80)))
    }
}

impl AddressResolver for LocalSocketResolver {
    fn name(&self) -> &str {
        "local socket"
    }

    fn resolve<'a>(&'a self, _runner: &'a mut dyn CommandRunner) -> ResolveFuture<'a> {
        Box::pin(async move {
            let socket = tokio::net::UdpSocket::bind(("0.0.0.0", 0)).await?;
            socket.connect(self.probe).await?;
            match socket.local_addr()?.ip() {
                IpAddr::V4(ip) => validated(&ip.to_string()).map(AddressResult::Local),
                other => Err(ResolveError::NotIpv4(other)),
            }
        })
    }
}

/// Settings for the default resolver chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressConfig {
    /// Commands run on the router, in order.
    pub remote_commands: Vec<String>,
    /// Lookup URLs queried from this machine, in order.
    pub http_urls: Vec<String>,
    /// Whether to fall back to the local network address.
    pub local_fallback: bool,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            remote_commands: vec![
                "curl -s ifconfig.me".into(),
                "curl -s ipinfo.io/ip".into(),
                "curl -s icanhazip.com".into(),
                "wget -qO- ifconfig.me".into(),
            ],
            http_urls: vec![
                "https://api.ipify.org".into(),
                "https://ifconfig.me/ip".into(),
            ],
            local_fallback: true,
        }
    }
}

/// Builds the resolver chain: remote commands, HTTP lookups, local socket.
pub fn build_resolvers(config: &AddressConfig) -> Vec<Box<dyn AddressResolver>> {
    let mut resolvers: Vec<Box<dyn AddressResolver>> = config
        .remote_commands
        .iter()
        .map(|cmd| Box::new(RemoteCommandResolver::new(cmd.clone())) as Box<dyn AddressResolver>)
        .collect();

    if !config.http_urls.is_empty() {
        match reqwest::Client::builder()
            .timeout(HTTP_LOOKUP_TIMEOUT)
            .build()
        {
            Ok(client) => {
                for url in &config.http_urls {
                    resolvers.push(Box::new(HttpResolver::new(url.clone(), client.clone())));
                }
            }
            Err(e) => warn!(error = %e, "HTTP client unavailable, skipping local lookups"),
        }
    }

    if config.local_fallback {
        resolvers.push(Box::new(LocalSocketResolver::default()));
    }

    debug!(count = resolvers.len(), "address resolver chain built");
    resolvers
}

/// Result of running the whole chain, with the failures along the way.
#[derive(Debug)]
pub struct AddressReport {
    pub result: AddressResult,
    /// Name of the resolver that produced `result`, if any.
    pub source: Option<String>,
    /// Resolvers that were tried and failed, in order.
    pub failures: Vec<(String, ResolveError)>,
}
