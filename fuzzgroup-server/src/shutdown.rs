//! Process signals that stop the accept loop

use std::fmt;
use std::io;

use tokio::signal;
use tracing::info;

use crate::logging::prefix::PULSE_CLOSE;

/// Signal that ended the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Ctrl+C / SIGINT
    Interrupt,
    /// SIGTERM, sent by process supervisors
    Terminate,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Interrupt => f.write_str("interrupt"),
            Signal::Terminate => f.write_str("terminate signal"),
        }
    }
}

#[cfg(unix)]
async fn terminated() -> io::Result<()> {
    let mut stream = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    stream.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminated() -> io::Result<()> {
    std::future::pending().await
}

/// Wait for the first interrupt or terminate signal.
///
/// Fails only if a handler cannot be installed; the caller decides whether
/// to keep serving without one.
pub async fn shutdown_signal() -> io::Result<Signal> {
    let received = tokio::select! {
        res = signal::ctrl_c() => res.map(|()| Signal::Interrupt)?,
        res = terminated() => res.map(|()| Signal::Terminate)?,
    };

    info!("{} Received {}, shutting down", PULSE_CLOSE, received);
    Ok(received)
}
