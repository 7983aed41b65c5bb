//! DuskRelay Settings
//!
//! Configuration for a single remailer node: where it listens, how
//! many outbound connections it keeps open, and the bandwidth and
//! idle-timeout limits the transport's reactor enforces. This crate
//! owns only the configuration surface spec.md §6 calls core-relevant;
//! directory-facing and operator-facing settings (if any) live above
//! this crate.
//!
//! ```no_run
//! use duskrelay_settings::Settings;
//!
//! let settings = Settings::load_or_default()?;
//! settings.save()?;
//! # Ok::<(), duskrelay_settings::SettingsError>(())
//! ```

mod config;

pub use config::{IncomingSettings, OutgoingSettings, ServerSettings, Settings};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("failed to write settings: {0}")]
    WriteError(std::io::Error),

    #[error("failed to parse settings: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize settings: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("failed to create config directory: {0}")]
    CreateDirError(std::io::Error),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// `$XDG_CONFIG_HOME/duskrelay` (or the platform equivalent), falling
/// back to the current directory if no home directory can be found —
/// a node run from an explicit config path never needs this.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("duskrelay")
}

pub fn default_settings_path() -> PathBuf {
    default_config_dir().join("duskrelay.toml")
}
