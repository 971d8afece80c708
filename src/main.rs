//! Tails every regular file in the current directory.
//!
//! Usage:
//!     dirtail
//!
//! Appended content goes to stdout, notices to stderr. Stops on SIGINT or
//! SIGTERM after closing every file. Set `RUST_LOG` for more logging.

use std::future::Future;
use std::io;

use tracing_subscriber::EnvFilter;

use dirtail::{Config, Pause, Tracker};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_tracing();

    let config = Config::default();
    let period = config.period;

    // Handlers are installed before the first cycle so an early signal is not
    // lost.
    let shutdown = shutdown_signal()?;

    let mut tracker = Tracker::stdio(config);
    tracker.run(Pause::new(period), shutdown).await?;

    Ok(())
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[cfg(unix)]
fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    Ok(async {
        if tokio::signal::ctrl_c().await.is_err() {
            // Without a handler there is nothing to wait for but termination.
            std::future::pending::<()>().await;
        }
    })
}
