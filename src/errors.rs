//! Error types for the speedtest monitor
//!
//! The taxonomy mirrors how each failure is handled: configuration errors abort
//! startup, interface and probe errors end a single measurement cycle and are
//! published to the result store, and nothing else ever leaves the scheduler loop.

use thiserror::Error;

/// Invalid or unreadable configuration, fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The underlying configuration source could not be read or deserialized
    #[error("unable to load the configuration: {0}")]
    Source(#[from] config::ConfigError),

    #[error("invalid {field} format {value:?}: {reason}")]
    InvalidDuration {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("{field} must be a positive duration")]
    NonPositiveDuration { field: &'static str },

    #[error("invalid {field} format {value:?}")]
    InvalidCoordinate { field: &'static str, value: String },

    #[error("{field} {value} is out of range [{min}, {max}]")]
    CoordinateOutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Only one of latitude/longitude was provided
    #[error("latitude and longitude must be set together")]
    PartialCoordinates,

    #[error("the interface name must not be empty")]
    EmptyInterface,
}

/// The configured network interface cannot be read
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InterfaceError {
    #[error("interface {name:?} not found (available: {})", .available.join(", "))]
    NotFound {
        name: String,
        available: Vec<String>,
    },

    #[error("unable to get the I/O counters: {reason}")]
    CountersUnavailable { reason: String },
}

/// A step of the measurement cycle failed
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProbeError {
    #[error("unable to fetch user info: {0}")]
    UserInfo(String),

    #[error("unable to fetch servers list: {0}")]
    ServerList(String),

    #[error("no server available to execute a test")]
    NoServerAvailable,

    #[error("error while executing the ping test: {0}")]
    LatencyProbeFailed(String),

    #[error("error while executing the download test: {0}")]
    DownloadFailed(String),

    #[error("error while executing the upload test: {0}")]
    UploadFailed(String),
}

/// Why one measurement cycle did not produce a result
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CycleError {
    #[error(transparent)]
    Interface(#[from] InterfaceError),

    #[error(transparent)]
    Probe(#[from] ProbeError),
}
