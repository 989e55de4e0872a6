//! Periodic network throughput and latency monitoring
//!
//! A [`component::MeasurementScheduler`] drives the [`speedtest::ThroughputProber`]
//! on a fixed period and publishes every outcome to a [`store::ResultStore`],
//! which the [`handlers`] read without blocking the scheduler.

pub mod collectors;
pub mod component;
pub mod config;
pub mod errors;
pub mod formatting;
pub mod handlers;
pub mod speedtest;
pub mod store;
