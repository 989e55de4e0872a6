//! Cumulative interface byte counters
//!
//! The prober brackets each transfer phase with two counter reads and divides the
//! delta by the elapsed time. Counters are read live on every call; nothing is
//! cached between reads.

use log::trace;
use serde::Serialize;
use sysinfo::Networks;

use crate::errors::InterfaceError;

/// Cumulative totals for one interface since it came up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InterfaceCounters {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Source of per-interface byte counters
pub trait InterfaceCounterReader: Send + Sync {
    /// Reads the current counters of the named interface
    fn read(&self, interface_name: &str) -> Result<InterfaceCounters, InterfaceError>;

    /// Reads the counters of every interface known to the host, sorted by name
    fn list(&self) -> Result<Vec<(String, InterfaceCounters)>, InterfaceError>;
}

/// Reads counters through `sysinfo`
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoCounterReader;

impl SysinfoCounterReader {
    pub fn new() -> Self {
        Self
    }
}

impl InterfaceCounterReader for SysinfoCounterReader {
    fn read(&self, interface_name: &str) -> Result<InterfaceCounters, InterfaceError> {
        let interfaces = self.list()?;

        match interfaces.iter().find(|(name, _)| name == interface_name) {
            Some((_, counters)) => {
                trace!(
                    "interface '{}': tx={} bytes, rx={} bytes",
                    interface_name, counters.bytes_sent, counters.bytes_received
                );
                Ok(*counters)
            }
            None => Err(InterfaceError::NotFound {
                name: interface_name.to_string(),
                available: interfaces.into_iter().map(|(name, _)| name).collect(),
            }),
        }
    }

    fn list(&self) -> Result<Vec<(String, InterfaceCounters)>, InterfaceError> {
        // A fresh list picks up interfaces that appeared since the last call
        let networks = Networks::new_with_refreshed_list();

        if networks.is_empty() {
            return Err(InterfaceError::CountersUnavailable {
                reason: "no network interfaces reported by the system".to_string(),
            });
        }

        let mut interfaces: Vec<(String, InterfaceCounters)> = networks
            .iter()
            .map(|(name, data)| {
                (
                    name.to_string(),
                    InterfaceCounters {
                        bytes_sent: data.total_transmitted(),
                        bytes_received: data.total_received(),
                    },
                )
            })
            .collect();
        interfaces.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(interfaces)
    }
}
