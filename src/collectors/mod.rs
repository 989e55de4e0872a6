pub mod interface_counters;

pub use interface_counters::{InterfaceCounterReader, InterfaceCounters, SysinfoCounterReader};
