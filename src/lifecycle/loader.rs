//! Initial loading sequence
//!
//! Progress climbs from 0 to 100 in 100ms ticks. Reaching 100 fires the
//! ready signal once, which releases everything waiting on the page load.

use std::time::Duration;

use rand::Rng;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use super::readiness::ReadySignal;

pub const TICK: Duration = Duration::from_millis(100);
const MIN_STEP: f32 = 2.0;
const MAX_STEP: f32 = 10.0;

pub struct InitialLoader {
    progress: f32,
    signal: ReadySignal,
}

impl InitialLoader {
    pub fn new(signal: ReadySignal) -> Self {
        Self {
            progress: 0.0,
            signal,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= 100.0
    }

    /// Add `step` percent; returns true once loading is complete
    pub fn advance(&mut self, step: f32) -> bool {
        if self.is_complete() {
            return true;
        }

        self.progress = (self.progress + step.max(0.0)).min(100.0);
        if self.is_complete() && self.signal.fire() {
            info!("initial load complete");
        }
        self.is_complete()
    }

    /// Tick until complete, then fire the ready signal
    pub async fn run(mut self) {
        let mut ticker = interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let step = rand::thread_rng().gen_range(MIN_STEP..MAX_STEP);
            if self.advance(step) {
                break;
            }
        }
    }
}
