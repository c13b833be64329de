//! One-shot "initial load complete" notification
//!
//! Starts not-ready, fires exactly once and never resets. Watchers created
//! after the signal fired see it immediately.

use tokio::sync::watch;
use tracing::{debug, warn};

/// Firing side of the readiness signal
#[derive(Debug)]
pub struct ReadySignal {
    tx: watch::Sender<bool>,
}

impl ReadySignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Mark the initial load as complete; returns false if already fired
    pub fn fire(&self) -> bool {
        let fired = self.tx.send_if_modified(|ready| {
            if *ready {
                return false;
            }
            *ready = true;
            true
        });
        if fired {
            debug!("ready signal fired");
        }
        fired
    }

    /// A new watcher for components that sequence themselves after the load
    pub fn watcher(&self) -> ReadyWatcher {
        ReadyWatcher {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Waiting side of the readiness signal
#[derive(Debug, Clone)]
pub struct ReadyWatcher {
    rx: watch::Receiver<bool>,
}

impl ReadyWatcher {
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the signal fires
    ///
    /// Returns early if the signal is dropped without firing.
    pub async fn wait(mut self) {
        let fired = self.rx.wait_for(|ready| *ready).await.map(|_| ());
        if fired.is_err() {
            warn!("ready signal dropped before firing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fires_once() {
        let signal = ReadySignal::new();
        let watcher = signal.watcher();
        assert!(!watcher.is_ready());
        assert!(signal.fire());
        assert!(!signal.fire());
        assert!(watcher.is_ready());
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_fire() {
        let signal = ReadySignal::new();
        let watcher = signal.watcher();
        assert!(!watcher.is_ready());

        let waiting = tokio::spawn(watcher.wait());
        signal.fire();

        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .expect("watcher should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_late_watcher_sees_fired_signal() {
        let signal = ReadySignal::new();
        signal.fire();
        let watcher = signal.watcher();
        assert!(watcher.is_ready());
        watcher.wait().await;
    }

    #[tokio::test]
    async fn test_dropped_signal_releases_waiters() {
        let signal = ReadySignal::new();
        let watcher = signal.watcher();
        drop(signal);
        watcher.wait().await;
    }
}
