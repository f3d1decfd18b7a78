//! Service state and service-specific settings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::AddressConfig;

/// Running state of the Passwall service.
///
/// Derived fresh from every status query; `Error` means the state could not
/// be determined at all, which is distinct from a confirmed `Inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Active,
    Inactive,
    Error,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Active => "active",
            ServiceState::Inactive => "inactive",
            ServiceState::Error => "error",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ServiceState::Active)
    }

    /// Long human-readable description for log views.
    pub fn description(&self) -> &'static str {
        match self {
            ServiceState::Active => "Pass Wall service is currently ACTIVE and running",
            ServiceState::Inactive => "Pass Wall service is currently INACTIVE and stopped",
            ServiceState::Error => "ERROR: Unable to determine Pass Wall service status",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the service is found and driven on the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// `grep` pattern matched against `ps w` output. The bracket keeps grep
    /// from matching its own command line.
    pub process_pattern: String,
    /// Init script accepting `start` and `stop`.
    pub init_script: String,
    /// Address discovery chain settings.
    pub address: AddressConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            process_pattern: "[p]asswall".into(),
            init_script: "/etc/init.d/passwall".into(),
            address: AddressConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn status_command(&self) -> String {
        format!("ps w | grep '{}'", self.process_pattern)
    }
}
