// src/shutdown.rs - Cooperative cancellation for in-flight backend runs

use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Reasons for shutdown initiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Interrupt or terminate signal (Ctrl+C, SIGTERM)
    Signal,
    /// Requested programmatically
    Requested,
}

/// Owns the sending side of the cancellation channel
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    shutdown_tx: watch::Sender<Option<ShutdownReason>>,
}

/// Cheap, cloneable view of the cancellation state. Runs check it between
/// lifecycle steps.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    shutdown_rx: watch::Receiver<Option<ShutdownReason>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(None);
        Self { shutdown_tx }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            shutdown_rx: self.shutdown_tx.subscribe(),
        }
    }

    /// Fire the shutdown signal. Later calls keep the first reason.
    pub fn initiate_shutdown(&self, reason: ShutdownReason) {
        let fired = self.shutdown_tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason.clone());
            true
        });

        if fired {
            info!("🛑 Shutdown requested: {:?}", reason);
        } else {
            debug!("Shutdown already in progress, ignoring duplicate request");
        }
    }

    /// Spawn a task that fires the signal on SIGINT/SIGTERM (Ctrl+C elsewhere)
    pub fn listen_for_signals(&self) {
        let coordinator = self.clone();

        tokio::spawn(async move {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};

                let mut sigterm = match signal(SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };

                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, cancelling in-flight runs");
                    }
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            warn!("Failed to listen for Ctrl+C: {}", e);
                            return;
                        }
                        info!("Received SIGINT (Ctrl+C), cancelling in-flight runs");
                    }
                }
            }

            #[cfg(not(unix))]
            {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                    return;
                }
                info!("Received Ctrl+C, cancelling in-flight runs");
            }

            coordinator.initiate_shutdown(ShutdownReason::Signal);
        });
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        ShutdownCoordinator::new().signal()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.shutdown_rx.borrow().clone()
    }
}
