use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Identity of the measuring host as seen by the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserInfo {
    pub ip: String,
    pub isp: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A speedtest server selected for a cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub id: String,
    pub name: String,
    pub sponsor: String,
    pub country: String,
    /// Upload endpoint; the other endpoints live next to it
    pub url: String,
    pub distance_km: Option<f64>,
}

impl Target {
    pub fn label(&self) -> String {
        if self.sponsor.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.sponsor, self.name)
        }
    }
}

/// External speed test capability used by the prober
///
/// Server ranking is the provider's business. Download and upload return the
/// provider's own rate measurement in bytes per second.
#[async_trait]
pub trait SpeedTestProvider: Send + Sync {
    async fn user_info(&self) -> Result<UserInfo>;

    /// Returns the best target, or `None` when the directory has no candidate
    async fn discover_best_target(&self) -> Result<Option<Target>>;

    async fn latency(&self, target: &Target) -> Result<Duration>;

    async fn download(&self, target: &Target) -> Result<f64>;

    async fn upload(&self, target: &Target) -> Result<f64>;
}
