//! Configuration for the speedtest monitor
//!
//! Values come from an optional configuration file, overridden by `SPEEDTEST_*`
//! environment variables. Every value is optional and falls back to a default.
//! The resulting [`Config`] is validated once and never mutated afterwards.

use log::debug;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::errors::ConfigError;

pub const ENV_PREFIX: &str = "SPEEDTEST";

pub const DEFAULT_INTERFACE: &str = "eth0";
pub const DEFAULT_INTERVAL: &str = "15m";
pub const DEFAULT_RETRY_INTERVAL: &str = "5m";

/// A geographic hint used to rank speedtest servers by distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoHint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Validated, immutable monitor configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Name of the uplink interface whose counters back the independent rates
    pub interface: String,
    /// Rest period after a successful cycle
    pub interval: Duration,
    /// Rest period after a failed cycle
    pub retry_interval: Duration,
    pub location: Option<GeoHint>,
}

/// Raw values as read from the sources, before parsing
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    interface: Option<String>,
    interval: Option<String>,
    retry_interval: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE.to_string(),
            interval: Duration::from_secs(15 * 60),
            retry_interval: Duration::from_secs(5 * 60),
            location: None,
        }
    }
}

impl Config {
    /// Loads the configuration from an optional file and the environment
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_file {
            debug!("loading the configuration from the file {:?}", path);
            builder = builder.add_source(config::File::from(path));
        }

        debug!(
            "loading the configuration from the {}_* environment variables",
            ENV_PREFIX
        );
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));

        Self::from_source(builder.build()?)
    }

    /// Parses and validates an already assembled configuration source
    pub fn from_source(source: config::Config) -> Result<Self, ConfigError> {
        let raw: RawConfig = source.try_deserialize()?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let interface = raw
            .interface
            .unwrap_or_else(|| DEFAULT_INTERFACE.to_string());
        if interface.trim().is_empty() {
            return Err(ConfigError::EmptyInterface);
        }

        let interval = parse_interval(
            "interval",
            raw.interval.as_deref().unwrap_or(DEFAULT_INTERVAL),
        )?;
        let retry_interval = parse_interval(
            "retry interval",
            raw.retry_interval
                .as_deref()
                .unwrap_or(DEFAULT_RETRY_INTERVAL),
        )?;

        let latitude = parse_coordinate("latitude", raw.latitude.as_deref(), 90.0)?;
        let longitude = parse_coordinate("longitude", raw.longitude.as_deref(), 180.0)?;

        let location = match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoHint {
                latitude,
                longitude,
            }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialCoordinates),
        };

        Ok(Self {
            interface,
            interval,
            retry_interval,
            location,
        })
    }
}

fn parse_interval(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let duration =
        humantime::parse_duration(value.trim()).map_err(|e| ConfigError::InvalidDuration {
            field,
            value: value.to_string(),
            reason: e.to_string(),
        })?;

    if duration.is_zero() {
        return Err(ConfigError::NonPositiveDuration { field });
    }

    Ok(duration)
}

/// Empty strings count as "not set"
fn parse_coordinate(
    field: &'static str,
    value: Option<&str>,
    bound: f64,
) -> Result<Option<f64>, ConfigError> {
    let value = match value.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(value) => value,
    };

    let parsed: f64 = value.parse().map_err(|_| ConfigError::InvalidCoordinate {
        field,
        value: value.to_string(),
    })?;

    if !parsed.is_finite() || parsed < -bound || parsed > bound {
        return Err(ConfigError::CoordinateOutOfRange {
            field,
            value: parsed,
            min: -bound,
            max: bound,
        });
    }

    Ok(Some(parsed))
}
