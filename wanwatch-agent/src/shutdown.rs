//! Cooperative shutdown for the watchdog loop
//!
//! Every wait in the agent (poll interval, grace period, settle period,
//! delay between probe targets) goes through [`Shutdown::sleep`] so a
//! termination signal never has to wait out a multi-minute pause.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Create a linked trigger/listener pair
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx: Arc::new(tx) }, Shutdown { rx })
}

/// Fires the shutdown signal. Cloneable so signal handlers and tests can share it.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownTrigger {
    pub fn fire(&self) {
        if !*self.tx.borrow() {
            debug!("Shutdown requested");
        }
        self.tx.send_replace(true);
    }
}

/// Listener side, held by whatever performs blocking waits
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Sleep for `duration` unless shutdown fires first.
    ///
    /// Returns `true` when the full duration elapsed, `false` when the wait
    /// was cut short (or shutdown had already been requested).
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_triggered() {
            return false;
        }

        let rx = &mut self.rx;
        let triggered = async move {
            // A dropped trigger can never fire: keep waiting on the timer only.
            let fired = rx.wait_for(|stop| *stop).await.map(|_| ());
            if fired.is_err() {
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = triggered => false,
        }
    }
}
