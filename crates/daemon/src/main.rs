//! DuskRelay node binary: loads settings, starts tracing, and runs the
//! MMTP transport until interrupted.

use duskrelay_daemon::{node, DaemonError};
use duskrelay_settings::Settings;

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    duskrelay_logging::init_tracing();

    tracing::info!("starting duskrelay node");

    let settings = Settings::load_or_default()?;

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    if let Err(e) = node::run(settings, shutdown).await {
        tracing::error!(error = %e, "node exited with an error");
        return Err(e);
    }

    tracing::info!("duskrelay node stopped");
    Ok(())
}
