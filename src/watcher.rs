//! Polling consumer of the correlation store
//!
//! A payment attempt generates its reference before the server confirms
//! anything, and the confirmation may arrive before, during or after the
//! initiating call resolves. [`PaymentWatcher`] covers that gap by polling
//! the store until the reference shows up, the window expires, or the caller
//! cancels.

use crate::correlation::PaymentCorrelationStore;
use std::time::Duration;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default interval between store checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);

/// Default time after which a payment is considered abandoned
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(30 * 60);

/// How a wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Reference was observed after `elapsed`
    Confirmed { elapsed: Duration },
    /// Expiry window passed without a confirmation
    Expired,
    /// Caller cancelled the wait
    Cancelled,
}

impl WatchOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, WatchOutcome::Confirmed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct PaymentWatcher {
    store: PaymentCorrelationStore,
    poll_interval: Duration,
    expiry: Duration,
}

impl PaymentWatcher {
    pub fn new(store: PaymentCorrelationStore) -> Self {
        Self {
            store,
            poll_interval: DEFAULT_POLL_INTERVAL,
            expiry: DEFAULT_EXPIRY,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Wait until `reference` is confirmed, the expiry passes, or `cancel` fires
    ///
    /// The store is checked immediately, then once per poll interval. Both
    /// timers are dropped when this returns.
    pub async fn wait_for(&self, reference: &str, cancel: CancellationToken) -> WatchOutcome {
        let started = Instant::now();
        let deadline = sleep(self.expiry);
        tokio::pin!(deadline);

        // interval() panics on a zero period
        let mut ticker = interval(self.poll_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Stopped watching payment {}: cancelled", reference);
                    return WatchOutcome::Cancelled;
                }
                _ = &mut deadline => {
                    tracing::warn!(
                        "Payment {} not confirmed within {:?}",
                        reference,
                        self.expiry
                    );
                    return WatchOutcome::Expired;
                }
                _ = ticker.tick() => {
                    if self.store.has(reference).await {
                        let elapsed = started.elapsed();
                        tracing::info!("Payment {} confirmed after {:?}", reference, elapsed);
                        return WatchOutcome::Confirmed { elapsed };
                    }
                }
            }
        }
    }
}
