//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI.

pub mod scrape;
pub mod scrape_one;
pub mod status;

use tokio_util::sync::CancellationToken;
use tracing::warn;

pub use scrape::{run as scrape_run, ScrapeArgs};
pub use scrape_one::run as scrape_one_run;
pub use status::run as status_run;

/// Token cancelled on Ctrl+C or SIGTERM.
pub fn cancel_on_signal() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        warn!("Interrupt received, stopping at the next request");
        token.cancel();
    });
    cancel
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(err) => {
            warn!("Cannot listen for SIGTERM: {}", err);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
