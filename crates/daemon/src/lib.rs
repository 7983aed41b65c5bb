//! Minimal binary wiring `duskrelay-settings` configuration into a
//! running `duskrelay-transport` node. This crate owns no protocol
//! logic of its own: packet construction, decoding, and routing
//! decisions live in `duskrelay-onion` and whatever directory/mixing
//! layer a real deployment adds on top.

pub mod node;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("settings error: {0}")]
    Settings(#[from] duskrelay_settings::SettingsError),

    #[error("transport error: {0}")]
    Transport(duskrelay_transport::TransportError),

    #[error("I/O error: {0}")]
    Io(std::io::Error),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
