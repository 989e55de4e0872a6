//! Latest measurement and health, shared between the scheduler and the readers
//!
//! Health, result and error live behind one lock so a reader can never observe
//! a combination coming from two different cycles.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

use crate::speedtest::SpeedTestResult;

/// Component health as reported to the query handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

#[derive(Debug, Clone, Default)]
enum StoreState {
    #[default]
    Pending,
    Succeeded(Arc<SpeedTestResult>),
    Failed(String),
}

/// Atomically observed copy of the store
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub health: HealthStatus,
    pub result: Option<Arc<SpeedTestResult>>,
    pub error: Option<String>,
}

/// Holder of the latest cycle outcome; each publish replaces the previous one
#[derive(Debug, Default)]
pub struct ResultStore {
    state: RwLock<StoreState>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_success(&self, result: SpeedTestResult) {
        self.replace(StoreState::Succeeded(Arc::new(result)));
    }

    pub fn publish_failure(&self, error: &dyn std::error::Error) {
        self.replace(StoreState::Failed(error.to_string()));
    }

    pub fn snapshot(&self) -> Snapshot {
        // Clone under the lock, build the snapshot outside of it
        let state = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match state {
            StoreState::Pending => Snapshot {
                health: HealthStatus::Unknown,
                result: None,
                error: None,
            },
            StoreState::Succeeded(result) => Snapshot {
                health: HealthStatus::Ok,
                result: Some(result),
                error: None,
            },
            // OK here means "the component is alive", the failure is in `error`
            StoreState::Failed(error) => Snapshot {
                health: HealthStatus::Ok,
                result: None,
                error: Some(error),
            },
        }
    }

    fn replace(&self, next: StoreState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }
}
