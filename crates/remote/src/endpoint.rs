//! Connection endpoint and credential resolution.

use std::fmt;
use std::path::PathBuf;

use crate::DEFAULT_PORT;

/// Credentials configured for the router.
///
/// Both fields may be set; [`Credentials::resolve`] decides which one is
/// actually used for a connection attempt.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub password: Option<String>,
    pub key_file: Option<PathBuf>,
}

/// The authentication method picked for a connection attempt.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    KeyFile(PathBuf),
    Password(String),
    None,
}

impl Credentials {
    /// Picks the authentication method: a key file that exists on disk,
    /// then a non-empty password, then "none".
    pub fn resolve(&self) -> AuthMethod {
        if let Some(path) = self.key_file.as_ref().filter(|p| p.is_file()) {
            return AuthMethod::KeyFile(path.clone());
        }
        if let Some(password) = self.password.as_ref().filter(|p| !p.is_empty()) {
            return AuthMethod::Password(password.clone());
        }
        AuthMethod::None
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("key_file", &self.key_file)
            .finish()
    }
}

impl AuthMethod {
    /// Short name used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthMethod::KeyFile(_) => "key file",
            AuthMethod::Password(_) => "password",
            AuthMethod::None => "none",
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            AuthMethod::Password(_) => f.write_str("Password(***)"),
            AuthMethod::None => f.write_str("None"),
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::KeyFile(path) => write!(f, "key file {}", path.display()),
            other => f.write_str(other.kind()),
        }
    }
}

/// The router this process controls. Immutable after construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub credentials: Credentials,
}

impl Endpoint {
    /// Creates an endpoint on the default SSH port with no credentials.
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            credentials: Credentials::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.credentials.password = Some(password.into());
        self
    }

    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials.key_file = Some(path.into());
        self
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_existing_key_file() {
        let key = tempfile::NamedTempFile::new().unwrap();
        let endpoint = Endpoint::new("192.168.1.1", "root")
            .with_password("secret")
            .with_key_file(key.path());

        assert_eq!(
            endpoint.credentials.resolve(),
            AuthMethod::KeyFile(key.path().to_path_buf())
        );
    }

    #[test]
    fn resolve_skips_missing_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Endpoint::new("192.168.1.1", "root")
            .with_password("secret")
            .with_key_file(dir.path().join("id_missing"));

        assert_eq!(
            endpoint.credentials.resolve(),
            AuthMethod::Password("secret".into())
        );
    }

    #[test]
    fn resolve_falls_back_to_none() {
        let endpoint = Endpoint::new("192.168.1.1", "root").with_password("");
        assert_eq!(endpoint.credentials.resolve(), AuthMethod::None);

        let endpoint = Endpoint::new("192.168.1.1", "root");
        assert_eq!(endpoint.credentials.resolve(), AuthMethod::None);
    }

    #[test]
    fn debug_output_redacts_password() {
        let endpoint = Endpoint::new("router", "root").with_password("hunter2");
        let debug = format!("{endpoint:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));

        let method = endpoint.credentials.resolve();
        assert!(!format!("{method:?}").contains("hunter2"));
        assert_eq!(method.to_string(), "password");
    }

    #[test]
    fn endpoint_display() {
        let endpoint = Endpoint::new("10.0.0.1", "admin").with_port(2222);
        assert_eq!(endpoint.to_string(), "admin@10.0.0.1:2222");
        assert_eq!(Endpoint::new("h", "u").port, 22);
    }
}
