//! Switcher configuration management.
//!
//! Configuration is stored as TOML:
//! - `$PASSWALL_SWITCHER_CONFIG` when set
//! - Linux: `~/.config/passwall-switcher/config.toml`
//! - Windows: `%APPDATA%/passwall-switcher/config.toml`

use std::path::{Path, PathBuf};

use passwall_poller::PollConfig;
use passwall_remote::Endpoint;
use passwall_service::{AddressConfig, ServiceConfig};
use serde::{Deserialize, Serialize};

/// Environment variable overriding the config file location.
const CONFIG_ENV: &str = "PASSWALL_SWITCHER_CONFIG";

/// Switcher configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ssh: SshSection,
    #[serde(default)]
    pub poll: PollSection,
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub address: AddressSection,
}

/// Router connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Used when no usable key file is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Private key; takes precedence over the password when it exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
}

fn default_host() -> String {
    "192.168.1.1".into()
}

fn default_user() -> String {
    "root".into()
}

fn default_port() -> u16 {
    passwall_remote::DEFAULT_PORT
}

impl Default for SshSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            user: default_user(),
            port: default_port(),
            password: None,
            key_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSection {
    /// Seconds between status checks.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Address check on every N-th status check.
    #[serde(default = "default_address_every")]
    pub address_check_every: u32,
}

fn default_interval() -> u64 {
    3
}

fn default_address_every() -> u32 {
    12
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            address_check_every: default_address_every(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSection {
    #[serde(default = "default_process_pattern")]
    pub process_pattern: String,

    #[serde(default = "default_init_script")]
    pub init_script: String,
}

fn default_process_pattern() -> String {
    ServiceConfig::default().process_pattern
}

fn default_init_script() -> String {
    ServiceConfig::default().init_script
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            process_pattern: default_process_pattern(),
            init_script: default_init_script(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSection {
    #[serde(default = "default_remote_commands")]
    pub remote_commands: Vec<String>,

    #[serde(default = "default_http_urls")]
    pub http_urls: Vec<String>,

    #[serde(default = "default_true")]
    pub local_fallback: bool,
}

fn default_remote_commands() -> Vec<String> {
    AddressConfig::default().remote_commands
}

fn default_http_urls() -> Vec<String> {
    AddressConfig::default().http_urls
}

fn default_true() -> bool {
    true
}

impl Default for AddressSection {
    fn default() -> Self {
        Self {
            remote_commands: default_remote_commands(),
            http_urls: default_http_urls(),
            local_fallback: default_true(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // May hold the router password.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn endpoint(&self) -> Endpoint {
        let mut endpoint =
            Endpoint::new(self.ssh.host.clone(), self.ssh.user.clone()).with_port(self.ssh.port);
        if let Some(password) = &self.ssh.password {
            endpoint = endpoint.with_password(password.clone());
        }
        if let Some(key_file) = &self.ssh.key_file {
            endpoint = endpoint.with_key_file(expand_home(key_file));
        }
        endpoint
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            process_pattern: self.service.process_pattern.clone(),
            init_script: self.service.init_script.clone(),
            address: AddressConfig {
                remote_commands: self.address.remote_commands.clone(),
                http_urls: self.address.http_urls.clone(),
                local_fallback: self.address.local_fallback,
            },
        }
    }

    /// Zero values are raised to 1.
    pub fn poll_config(&self) -> PollConfig {
        PollConfig::new(self.poll.interval_secs, self.poll.address_check_every)
    }
}

/// Expands a leading `~/` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let var = "USERPROFILE";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";
    std::env::var_os(var).map(PathBuf::from)
}

/// Returns the configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("passwall-switcher")
            .join("config.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata)
            .join("passwall-switcher")
            .join("config.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/passwall-switcher/config.toml"))
    }
}
