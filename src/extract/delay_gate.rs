//! Pacing for extraction requests.
//!
//! A [`DelayGate`] is shared by all extraction tasks of a run. The first
//! acquisition proceeds immediately; every later acquisition sleeps for the
//! configured delay while holding the gate, so consecutive starts are spaced
//! at least `delay` apart regardless of how many tasks are waiting.

use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Serializing delay gate.
#[derive(Debug)]
pub struct DelayGate {
    delay: Duration,
    /// `false` until the first acquisition has passed.
    started: Mutex<bool>,
}

impl DelayGate {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: Mutex::new(false),
        }
    }

    /// A gate that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Waits for this task's turn.
    #[instrument(skip(self), fields(delay_ms = self.delay.as_millis()))]
    pub async fn acquire(&self) {
        let mut started = self.started.lock().await;
        if *started {
            if !self.delay.is_zero() {
                debug!("applying extraction delay");
                tokio::time::sleep(self.delay).await;
            }
        } else {
            debug!("first extraction - no delay");
            *started = true;
        }
    }
}
