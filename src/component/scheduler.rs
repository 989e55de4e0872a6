//! Periodic speed test scheduling
//!
//! Idle -> Running -> Sleeping -> Running ... -> Stopped. The rest period is the
//! regular interval after a success and the retry interval after a failure.
//! Only the sleep races against cancellation; a running cycle always finishes.

use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::component::{CancellationSignal, Component, Outcome};
use crate::config::Config;
use crate::formatting::format_bitrate;
use crate::speedtest::ThroughputProber;
use crate::store::ResultStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Sleeping,
    Stopped,
}

pub struct MeasurementScheduler {
    interval: Duration,
    retry_interval: Duration,
    prober: ThroughputProber,
    store: Arc<ResultStore>,
    state: Mutex<SchedulerState>,
}

impl MeasurementScheduler {
    pub fn new(config: &Config, prober: ThroughputProber, store: Arc<ResultStore>) -> Self {
        Self {
            interval: config.interval,
            retry_interval: config.retry_interval,
            prober,
            store,
            state: Mutex::new(SchedulerState::Idle),
        }
    }

    pub fn store(&self) -> Arc<ResultStore> {
        Arc::clone(&self.store)
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SchedulerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Runs one cycle, publishes its outcome and returns how long to rest
    async fn run_cycle(&self) -> Duration {
        self.set_state(SchedulerState::Running);

        match self.prober.run().await {
            Ok(result) => {
                info!(
                    "test finished: Ping: {:.2}ms - DL: {} - UL: {}",
                    result.latency_ms,
                    format_bitrate(result.download),
                    format_bitrate(result.upload)
                );
                self.store.publish_success(result);
                debug!("next test scheduled in {}", humantime::format_duration(self.interval));
                self.interval
            }
            Err(e) => {
                self.store.publish_failure(&e);
                warn!(
                    "test has failed, retrying in {}: {}",
                    humantime::format_duration(self.retry_interval),
                    e
                );
                self.retry_interval
            }
        }
    }
}

#[async_trait]
impl Component for MeasurementScheduler {
    fn name(&self) -> &str {
        "speedtest"
    }

    async fn run(&self, cancel: CancellationSignal) -> Outcome {
        debug!("starting the speedtest component");

        // A broken interface at startup is misconfiguration, not a transient failure
        if let Err(e) = self.prober.read_counters() {
            self.set_state(SchedulerState::Stopped);
            return Outcome::Failed(anyhow::Error::new(e).context(format!(
                "unable to use the {:?} network interface",
                self.prober.interface()
            )));
        }
        debug!(
            "using the {:?} network interface as public interface",
            self.prober.interface()
        );
        debug!(
            "executing a test every {} (retry interval is {})",
            humantime::format_duration(self.interval),
            humantime::format_duration(self.retry_interval)
        );

        loop {
            let rest = self.run_cycle().await;

            self.set_state(SchedulerState::Sleeping);
            tokio::select! {
                _ = tokio::time::sleep(rest) => {}
                _ = cancel.cancelled() => {
                    debug!("speedtest component interrupted while sleeping");
                    self.set_state(SchedulerState::Stopped);
                    return Outcome::Interrupted;
                }
            }
        }
    }
}
