//! Shutdown on SIGINT/SIGTERM (Ctrl+C on Windows)

use tokio::sync::mpsc;

use pmkit_core::prelude::*;

use crate::message::Message;

/// Signal that ended the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    Interrupt,
    Terminate,
}

/// Spawn a task that turns the first termination signal into
/// [`Message::Quit`]. The host then finishes its model before exiting.
pub fn spawn_signal_handler(tx: mpsc::Sender<Message>) {
    tokio::spawn(async move {
        let shutdown = match wait_for_signal().await {
            Ok(shutdown) => shutdown,
            Err(e) => {
                error!("Signal handler error: {}", e);
                return;
            }
        };

        info!(?shutdown, "stopping host");
        if tx.send(Message::Quit).await.is_err() {
            debug!("host loop already gone");
        }
    });
}

async fn wait_for_signal() -> Result<Shutdown> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| Error::host(format!("Failed to create SIGINT handler: {}", e)))?;
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| Error::host(format!("Failed to create SIGTERM handler: {}", e)))?;

        Ok(tokio::select! {
            _ = sigint.recv() => Shutdown::Interrupt,
            _ = sigterm.recv() => Shutdown::Terminate,
        })
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| Error::host(format!("Failed to listen for Ctrl+C: {}", e)))?;
        Ok(Shutdown::Interrupt)
    }
}
