//! Process-wide tracing setup for the remailer daemon. Every crate in
//! this workspace logs through `tracing`; this crate just owns turning
//! that into formatted output once, at startup.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a global tracing subscriber: an `EnvFilter` read from
/// `RUST_LOG` (defaulting to `info`, with this workspace's own crates
/// at `debug`) feeding a plain formatted layer on stderr.
///
/// Call once, as early as possible in `main`. Panics if a subscriber
/// is already installed, since that means something went wrong with
/// startup ordering rather than a recoverable condition.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,duskrelay=debug"));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_does_not_panic_when_called_once() {
        // Installing a second global subscriber in the same process
        // would panic, so this is the only test in the crate that
        // calls `init_tracing`.
        init_tracing();
        tracing::info!("tracing initialized");
    }
}
