//! Read-only query operations over the result store
//!
//! Both are pure reads of one snapshot. A failed cycle is reported in-band
//! through the `error` field; the caller's HTTP layer maps them to 200.

use serde::Serialize;

use crate::speedtest::SpeedTestResult;
use crate::store::{HealthStatus, ResultStore};

/// Body of `GET /speedtest/health`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthOut {
    pub status: HealthStatus,
    pub error: Option<String>,
}

/// Body of `GET /speedtest/result`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestResultOut {
    pub result: Option<SpeedTestResult>,
}

pub fn health(store: &ResultStore) -> HealthOut {
    let snapshot = store.snapshot();
    HealthOut {
        status: snapshot.health,
        error: snapshot.error,
    }
}

pub fn latest_result(store: &ResultStore) -> LatestResultOut {
    LatestResultOut {
        result: store.snapshot().result.map(|result| (*result).clone()),
    }
}
