//! Test doubles shared by the integration tests

#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use speedwatch::collectors::{InterfaceCounterReader, InterfaceCounters};
use speedwatch::errors::InterfaceError;
use speedwatch::speedtest::{SpeedTestProvider, Target, UserInfo};

/// Counters that grow by a fixed step on every read
///
/// After `available_reads` successful reads the interface disappears.
pub struct FakeCounters {
    reads: AtomicUsize,
    step: u64,
    available_reads: Option<usize>,
}

impl FakeCounters {
    pub fn growing(step: u64) -> Self {
        Self {
            reads: AtomicUsize::new(0),
            step,
            available_reads: None,
        }
    }

    pub fn missing() -> Self {
        Self::vanishing_after(0)
    }

    pub fn vanishing_after(reads: usize) -> Self {
        Self {
            reads: AtomicUsize::new(0),
            step: 1_000,
            available_reads: Some(reads),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl InterfaceCounterReader for FakeCounters {
    fn read(&self, interface_name: &str) -> Result<InterfaceCounters, InterfaceError> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.available_reads {
            if n >= limit {
                return Err(InterfaceError::NotFound {
                    name: interface_name.to_string(),
                    available: vec!["lo".to_string()],
                });
            }
        }
        let total = (n as u64 + 1) * self.step;
        Ok(InterfaceCounters {
            bytes_sent: total,
            bytes_received: total,
        })
    }

    fn list(&self) -> Result<Vec<(String, InterfaceCounters)>, InterfaceError> {
        Ok(vec![("eth0".to_string(), self.read("eth0")?)])
    }
}

/// Provider whose cycles succeed or fail according to a script
///
/// Once the script is exhausted every cycle succeeds.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<bool>>,
    cycle_starts: Mutex<Vec<Instant>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    /// `true` entries are successful cycles, `false` entries failed ones
    pub fn new(script: Vec<bool>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            cycle_starts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always_succeeding() -> Self {
        Self::new(Vec::new())
    }

    pub fn cycle_starts(&self) -> Vec<Instant> {
        self.cycle_starts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn target() -> Target {
    Target {
        id: "42".to_string(),
        name: "Testville".to_string(),
        sponsor: "Fake ISP".to_string(),
        country: "Nowhere".to_string(),
        url: "http://speedtest.invalid/upload.php".to_string(),
        distance_km: Some(1.0),
    }
}

#[async_trait]
impl SpeedTestProvider for ScriptedProvider {
    async fn user_info(&self) -> Result<UserInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.cycle_starts.lock().unwrap().push(Instant::now());
        Ok(UserInfo {
            ip: "192.0.2.1".to_string(),
            isp: "Fake ISP".to_string(),
            latitude: None,
            longitude: None,
        })
    }

    async fn discover_best_target(&self) -> Result<Option<Target>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let succeed = self.script.lock().unwrap().pop_front().unwrap_or(true);
        Ok(succeed.then(target))
    }

    async fn latency(&self, _target: &Target) -> Result<Duration> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Duration::from_millis(8))
    }

    async fn download(&self, _target: &Target) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(2_000_000.0)
    }

    async fn upload(&self, _target: &Target) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(500_000.0)
    }
}

/// Provider that fails every call, for checking that no traffic is issued
pub struct UnreachableProvider {
    pub calls: AtomicUsize,
}

impl UnreachableProvider {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SpeedTestProvider for UnreachableProvider {
    async fn user_info(&self) -> Result<UserInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("network unreachable"))
    }

    async fn discover_best_target(&self) -> Result<Option<Target>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("network unreachable"))
    }

    async fn latency(&self, _target: &Target) -> Result<Duration> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("network unreachable"))
    }

    async fn download(&self, _target: &Target) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("network unreachable"))
    }

    async fn upload(&self, _target: &Target) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("network unreachable"))
    }
}

/// Polls `condition` until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
