//! One full measurement cycle
//!
//! Target discovery, latency, download and upload run in order through the
//! provider. Each transfer phase is bracketed by two interface counter reads so
//! the rate can be recomputed independently of what the provider reports.

use chrono::Utc;
use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::collectors::{InterfaceCounterReader, InterfaceCounters};
use crate::errors::{CycleError, InterfaceError, ProbeError};
use crate::formatting::format_speed;
use crate::speedtest::SpeedTestResult;
use crate::speedtest::provider::SpeedTestProvider;

/// Rate in bytes per second between two cumulative counter readings
///
/// Returns `None` when the elapsed time is not strictly positive or when the
/// counter went backwards (interface reset during the phase).
pub fn independent_rate(before: u64, after: u64, elapsed_secs: f64) -> Option<f64> {
    if !(elapsed_secs > 0.0) || !elapsed_secs.is_finite() {
        return None;
    }
    let delta = after.checked_sub(before)?;
    Some(delta as f64 / elapsed_secs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Download,
    Upload,
}

impl Phase {
    fn counter(self, counters: &InterfaceCounters) -> u64 {
        match self {
            Phase::Download => counters.bytes_received,
            Phase::Upload => counters.bytes_sent,
        }
    }

    fn failure(self, err: anyhow::Error) -> ProbeError {
        match self {
            Phase::Download => ProbeError::DownloadFailed(format!("{:#}", err)),
            Phase::Upload => ProbeError::UploadFailed(format!("{:#}", err)),
        }
    }
}

/// Rates measured during one transfer phase
#[derive(Debug, Clone, Copy, PartialEq)]
struct PhaseRates {
    reported: f64,
    independent: Option<f64>,
}

pub struct ThroughputProber {
    interface: String,
    counters: Arc<dyn InterfaceCounterReader>,
    provider: Arc<dyn SpeedTestProvider>,
}

impl ThroughputProber {
    pub fn new(
        interface: impl Into<String>,
        counters: Arc<dyn InterfaceCounterReader>,
        provider: Arc<dyn SpeedTestProvider>,
    ) -> Self {
        Self {
            interface: interface.into(),
            counters,
            provider,
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Reads the configured interface counters
    pub fn read_counters(&self) -> Result<InterfaceCounters, InterfaceError> {
        self.counters.read(&self.interface)
    }

    /// Runs one full cycle; no partial result is produced on failure
    pub async fn run(&self) -> Result<SpeedTestResult, CycleError> {
        // Fail before any test traffic when the interface is gone
        self.read_counters()?;

        debug!("fetching the user info");
        let user = self
            .provider
            .user_info()
            .await
            .map_err(|e| ProbeError::UserInfo(format!("{:#}", e)))?;
        debug!(
            "found user info: {} ({}) [{:?}, {:?}]",
            user.ip, user.isp, user.latitude, user.longitude
        );

        debug!("searching the best server");
        let target = self
            .provider
            .discover_best_target()
            .await
            .map_err(|e| ProbeError::ServerList(format!("{:#}", e)))?
            .ok_or(ProbeError::NoServerAvailable)?;
        debug!(
            "selected server {} [{}] at {}",
            target.label(),
            target.id,
            target.url
        );

        debug!("executing the ping test");
        let latency = self
            .provider
            .latency(&target)
            .await
            .map_err(|e| ProbeError::LatencyProbeFailed(format!("{:#}", e)))?;

        debug!("executing the download test");
        let download = self
            .measure(Phase::Download, || self.provider.download(&target))
            .await?;

        debug!("executing the upload test");
        let upload = self
            .measure(Phase::Upload, || self.provider.upload(&target))
            .await?;

        Ok(SpeedTestResult::new(
            Utc::now(),
            latency.as_secs_f64() * 1000.0,
            target.label(),
            download.reported,
            upload.reported,
            download.independent,
            upload.independent,
        ))
    }

    /// Runs a transfer probe between two counter reads on a monotonic clock
    async fn measure<F, Fut>(&self, phase: Phase, probe: F) -> Result<PhaseRates, CycleError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<f64>>,
    {
        let before = self.read_counters()?;
        let started = Instant::now();

        let reported = probe().await.map_err(|e| phase.failure(e))?;

        let elapsed = started.elapsed();
        let after = self.read_counters()?;

        let independent = independent_rate(
            phase.counter(&before),
            phase.counter(&after),
            elapsed.as_secs_f64(),
        );

        match independent {
            Some(rate) => debug!(
                "{:?} phase on '{}': reported {}, interface {} over {:.3}s",
                phase,
                self.interface,
                format_speed(reported),
                format_speed(rate),
                elapsed.as_secs_f64()
            ),
            None => warn!(
                "{:?} phase on '{}': interface rate undefined (before={}, after={}, elapsed={:.6}s)",
                phase,
                self.interface,
                phase.counter(&before),
                phase.counter(&after),
                elapsed.as_secs_f64()
            ),
        }

        Ok(PhaseRates {
            reported,
            independent,
        })
    }
}
