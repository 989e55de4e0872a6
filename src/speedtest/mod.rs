//! Speed test measurement
//!
//! - `provider`: the contract of the external speed test service
//! - `speedtest_net`: the speedtest.net implementation of that contract
//! - `prober`: one full measurement cycle with independently derived rates

pub mod prober;
pub mod provider;
pub mod speedtest_net;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::formatting::format_bitrate;

pub use prober::{ThroughputProber, independent_rate};
pub use provider::{SpeedTestProvider, Target, UserInfo};
pub use speedtest_net::SpeedtestNetProvider;

/// Outcome of one completed measurement cycle
///
/// All rates are in bytes per second. `download`/`upload` are the figures
/// reported by the provider, `interface_download`/`interface_upload` are
/// derived from the interface counters and are `None` when undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedTestResult {
    pub timestamp: DateTime<Utc>,
    pub latency_ms: f64,
    pub server: String,

    pub download: f64,
    pub download_string: String,

    pub upload: f64,
    pub upload_string: String,

    pub interface_download: Option<f64>,
    pub interface_upload: Option<f64>,
}

impl SpeedTestResult {
    pub fn new(
        timestamp: DateTime<Utc>,
        latency_ms: f64,
        server: String,
        download: f64,
        upload: f64,
        interface_download: Option<f64>,
        interface_upload: Option<f64>,
    ) -> Self {
        Self {
            timestamp,
            latency_ms,
            server,
            download,
            download_string: format_bitrate(download),
            upload,
            upload_string: format_bitrate(upload),
            interface_download,
            interface_upload,
        }
    }
}
