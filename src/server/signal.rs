// Signal handling module
//
// Supported signals:
// - SIGTERM: Graceful shutdown
// - SIGINT:  Graceful shutdown (Ctrl+C)
// - SIGUSR1: Reopen log files

use std::sync::Arc;
use tokio::sync::Notify;

use crate::config::AppState;
use crate::logger;

/// Signal handler state
pub struct SignalHandler {
    /// Shutdown signal (SIGTERM, SIGINT)
    pub shutdown: Arc<Notify>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Wake the server loop so it stops accepting
    pub fn request_shutdown(&self) {
        // notify_one keeps a permit if the loop is not waiting yet
        self.shutdown.notify_one();
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Start signal handlers (Unix)
///
/// | Signal  | Action          |
/// |---------|-----------------|
/// | SIGTERM | Graceful stop   |
/// | SIGINT  | Graceful stop   |
/// | SIGUSR1 | Reopen log files|
#[cfg(unix)]
pub fn start_signal_handler(handler: Arc<SignalHandler>, state: Arc<AppState>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let registered = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
            signal(SignalKind::user_defined1()),
        );
        let (mut sigterm, mut sigint, mut sigusr1) = match registered {
            (Ok(term), Ok(int), Ok(usr1)) => (term, int, usr1),
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                logger::log_error(&format!("Failed to register signal handlers: {e}"));
                return;
            }
        };

        logger::log_info(&format!(
            "Signal handlers registered (pid {}): SIGTERM/SIGINT stop, SIGUSR1 reopens logs",
            std::process::id()
        ));

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    logger::log_info("SIGTERM received, shutting down");
                    handler.request_shutdown();
                    break;
                }

                _ = sigint.recv() => {
                    logger::log_info("SIGINT received, shutting down");
                    handler.request_shutdown();
                    break;
                }

                _ = sigusr1.recv() => {
                    match logger::reopen(&state.config) {
                        Ok(()) => logger::log_info("SIGUSR1 received, log files reopened"),
                        Err(e) => logger::log_error(&format!("Failed to reopen log files: {e}")),
                    }
                }
            }
        }
    });
}

/// Fallback for non-Unix targets: only Ctrl+C is handled
#[cfg(not(unix))]
pub fn start_signal_handler(handler: Arc<SignalHandler>, _state: Arc<AppState>) {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            logger::log_info("Ctrl+C received, shutting down");
            handler.request_shutdown();
        }
    });
}
