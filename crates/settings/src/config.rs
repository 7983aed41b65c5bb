//! Configuration types, persisted as TOML.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{default_settings_path, Result, SettingsError};

/// A node's full configuration. Sections mirror spec.md §6's
/// `incoming/mmtp.*`, `outgoing/mmtp.*`, and `server.*` keys directly:
/// `[incoming.mmtp]`, `[outgoing.mmtp]`, `[server]` in the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub incoming: IncomingSettings,

    #[serde(default)]
    pub outgoing: OutgoingSettings,

    #[serde(default)]
    pub server: ServerSettings,

    /// Path this was loaded from, or will be saved to. Not persisted.
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            incoming: IncomingSettings::default(),
            outgoing: OutgoingSettings::default(),
            server: ServerSettings::default(),
            config_path: None,
        }
    }
}

impl Settings {
    /// Load settings from the default path, or fall back to defaults
    /// if nothing is there yet.
    pub fn load_or_default() -> Result<Self> {
        Self::load_from(&default_settings_path())
    }

    /// Load settings from a specific path, or fall back to defaults.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
            let mut settings: Settings = toml::from_str(&content)?;
            settings.config_path = Some(path.clone());
            info!(?path, "loaded settings");
            Ok(settings)
        } else {
            let mut settings = Self::default();
            settings.config_path = Some(path.clone());
            Ok(settings)
        }
    }

    /// Save to the path this was loaded from, or the default path if
    /// it was never loaded from disk.
    pub fn save(&self) -> Result<()> {
        let path = self.config_path.clone().unwrap_or_else(default_settings_path);
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(SettingsError::CreateDirError)?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(SettingsError::WriteError)?;
        info!(?path, "saved settings");
        Ok(())
    }
}

/// Where the MMTP server accepts connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingSettings {
    pub mmtp: MmtpListenSettings,
}

impl Default for IncomingSettings {
    fn default() -> Self {
        Self { mmtp: MmtpListenSettings::default() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MmtpListenSettings {
    #[serde(default = "default_listen_ip")]
    pub listen_ip: Ipv4Addr,

    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

fn default_listen_ip() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

fn default_listen_port() -> u16 {
    48099
}

impl Default for MmtpListenSettings {
    fn default() -> Self {
        Self { listen_ip: default_listen_ip(), listen_port: default_listen_port() }
    }
}

/// Outbound connection limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingSettings {
    pub mmtp: MmtpDialSettings,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self { mmtp: MmtpDialSettings::default() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MmtpDialSettings {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_max_connections() -> usize {
    16
}

impl Default for MmtpDialSettings {
    fn default() -> Self {
        Self { max_connections: default_max_connections() }
    }
}

/// Bandwidth and liveness limits the reactor's token bucket and
/// timeout sweep enforce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Average bytes/s the token bucket refills by each tick. `None`
    /// means unlimited: the reactor never throttles.
    #[serde(default)]
    pub max_bandwidth: Option<u64>,

    /// Burst ceiling on the token bucket. Defaults to `5 *
    /// max_bandwidth` when bandwidth is limited, and is meaningless
    /// when it is not.
    #[serde(default)]
    pub max_bandwidth_spike: Option<u64>,

    /// Seconds a connection may sit idle before the reactor closes it.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_timeout() -> u64 {
    600
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { max_bandwidth: None, max_bandwidth_spike: None, timeout: default_timeout() }
    }
}

impl ServerSettings {
    /// The burst ceiling to actually use: the configured spike value,
    /// or `5 * max_bandwidth` if bandwidth is limited but no spike was
    /// given, or `None` if bandwidth itself is unlimited.
    pub fn effective_max_bucket(&self) -> Option<u64> {
        match (self.max_bandwidth, self.max_bandwidth_spike) {
            (_, Some(spike)) => Some(spike),
            (Some(avg), None) => Some(avg.saturating_mul(5)),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let s = Settings::default();
        assert_eq!(s.incoming.mmtp.listen_ip, Ipv4Addr::UNSPECIFIED);
        assert_eq!(s.outgoing.mmtp.max_connections, 16);
        assert_eq!(s.server.max_bandwidth, None);
        assert_eq!(s.server.effective_max_bucket(), None);
    }

    #[test]
    fn spike_defaults_to_five_times_average_when_limited() {
        let mut s = ServerSettings::default();
        s.max_bandwidth = Some(1000);
        assert_eq!(s.effective_max_bucket(), Some(5000));
    }

    #[test]
    fn round_trips_through_toml() {
        let mut s = Settings::default();
        s.incoming.mmtp.listen_port = 9999;
        let text = toml::to_string_pretty(&s).unwrap();
        let back: Settings = toml::from_str(&text).unwrap();
        assert_eq!(back.incoming.mmtp.listen_port, 9999);
    }

    #[test]
    fn load_from_missing_path_falls_back_to_defaults() {
        let path = PathBuf::from("/nonexistent/duskrelay-test-settings.toml");
        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.outgoing.mmtp.max_connections, 16);
    }
}
