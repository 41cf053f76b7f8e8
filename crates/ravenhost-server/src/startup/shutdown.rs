//! Graceful shutdown handling
//!
//! A broadcast-backed notification shared between the boot loop and anything
//! else that needs to observe shutdown. No drain timeout: the node's stop
//! path is already bounded (engine flush + listener stop).

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Shutdown notification. Cloning shares the underlying channel.
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    pub fn shutdown(&self) {
        let _ = self.sender.send(());
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Install Ctrl+C and SIGTERM handlers.
///
/// The returned receiver is subscribed before the listener task starts, so a
/// signal delivered at any point after this call is never dropped for lack
/// of a subscriber.
pub fn wait_for_shutdown_signal() -> broadcast::Receiver<()> {
    let signal = ShutdownSignal::new();
    let receiver = signal.subscribe();
    tokio::spawn(listen_for_signals(signal));
    receiver
}

async fn listen_for_signals(signal: ShutdownSignal) {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("cannot install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("cannot install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }

    signal.shutdown();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_signal_reaches_subscriber() {
        let signal = ShutdownSignal::new();
        let mut receiver = signal.subscribe();

        signal.shutdown();
        assert!(receiver.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_before_recv_is_not_dropped() {
        // A receiver obtained before the trigger sees the notification even
        // when it only starts waiting afterwards. This is the property that
        // lets the pre-subscribed receiver from wait_for_shutdown_signal
        // cover the window between handler installation and the event loop.
        let signal = ShutdownSignal::new();
        let mut receiver = signal.subscribe();

        signal.shutdown();
        tokio::task::yield_now().await;
        assert!(receiver.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_without_subscriber_is_silent() {
        let signal = ShutdownSignal::new();
        signal.shutdown();

        // A later subscriber missed the send; only pre-subscribed receivers
        // observe it.
        let mut late = signal.subscribe();
        assert!(late.try_recv().is_err());
    }
}
