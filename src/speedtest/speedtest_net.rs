//! speedtest.net provider
//!
//! Servers come from the public speedtest.net JSON server directory. Latency,
//! download and upload use the classic endpoints every speedtest.net server
//! exposes next to its `upload.php`.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use log::{debug, trace};
use rand::RngCore;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::{Duration, Instant};

use crate::config::GeoHint;
use crate::speedtest::provider::{SpeedTestProvider, Target, UserInfo};

const SERVERS_URL: &str = "https://www.speedtest.net/api/js/servers";
const IDENTITY_URL: &str = "https://speed.cloudflare.com/meta";

const SERVER_LIMIT: usize = 10;
const PING_COUNT: usize = 5;
const CONCURRENCY: usize = 4;
const DOWNLOAD_SIZES: &[u32] = &[350, 500, 750, 1000, 1500, 2000, 2500, 3000];
const UPLOAD_CHUNK_SIZE: usize = 1_000_000;
const UPLOAD_CHUNKS: usize = 16;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Directory values are sometimes strings, sometimes numbers
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Loose {
    Number(f64),
    Text(String),
}

impl Loose {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Loose::Number(value) => Some(*value),
            Loose::Text(text) => text.trim().parse().ok(),
        }
    }

    fn to_text(&self) -> String {
        match self {
            Loose::Number(value) => value.to_string(),
            Loose::Text(text) => text.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServerEntry {
    url: String,
    id: Loose,
    #[serde(default)]
    name: String,
    #[serde(default)]
    sponsor: String,
    #[serde(default)]
    country: String,
    lat: Option<Loose>,
    lon: Option<Loose>,
    distance: Option<Loose>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityResponse {
    #[serde(default)]
    client_ip: String,
    #[serde(default)]
    as_organization: String,
    latitude: Option<Loose>,
    longitude: Option<Loose>,
}

/// Great-circle distance in kilometres
fn haversine_km(from: GeoHint, to_latitude: f64, to_longitude: f64) -> f64 {
    let (lat1, lat2) = (from.latitude.to_radians(), to_latitude.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (to_longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Turns directory entries into targets, nearest first
///
/// With a location hint the distance is recomputed from the server coordinates,
/// otherwise the directory's own distance is trusted. Unknown distances go last.
fn rank_targets(entries: Vec<ServerEntry>, location: Option<GeoHint>) -> Vec<Target> {
    let mut targets: Vec<Target> = entries
        .into_iter()
        .map(|entry| {
            let computed = match (location, &entry.lat, &entry.lon) {
                (Some(hint), Some(lat), Some(lon)) => lat
                    .as_f64()
                    .zip(lon.as_f64())
                    .map(|(lat, lon)| haversine_km(hint, lat, lon)),
                _ => None,
            };

            Target {
                id: entry.id.to_text(),
                name: entry.name,
                sponsor: entry.sponsor,
                country: entry.country,
                url: entry.url,
                distance_km: computed.or_else(|| entry.distance.as_ref().and_then(Loose::as_f64)),
            }
        })
        .collect();

    targets.sort_by(|a, b| match (a.distance_km, b.distance_km) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    targets
}

/// Resolves a file sitting next to the target's upload endpoint
fn sibling_url(target: &Target, file: &str) -> Result<Url> {
    let base = Url::parse(&target.url)
        .with_context(|| format!("invalid server url {:?}", target.url))?;
    base.join(file)
        .with_context(|| format!("unable to build the {} url", file))
}

fn rate(bytes: u64, elapsed: Duration) -> Result<f64> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return Err(anyhow!("transfer finished in no measurable time"));
    }
    Ok(bytes as f64 / secs)
}

pub struct SpeedtestNetProvider {
    client: Client,
    location: Option<GeoHint>,
    servers_url: String,
    identity_url: String,
}

impl SpeedtestNetProvider {
    pub fn new(location: Option<GeoHint>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("speedwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("unable to build the HTTP client")?;

        Ok(Self {
            client,
            location,
            servers_url: SERVERS_URL.to_string(),
            identity_url: IDENTITY_URL.to_string(),
        })
    }

    fn servers_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("engine", "js".to_string()),
            ("https_functional", "true".to_string()),
            ("limit", SERVER_LIMIT.to_string()),
        ];
        if let Some(hint) = self.location {
            query.push(("lat", hint.latitude.to_string()));
            query.push(("lon", hint.longitude.to_string()));
        }
        query
    }

    /// Downloads one URL and returns the number of body bytes received
    async fn fetch_count(&self, url: Url) -> Result<u64> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {}", url))?
            .error_for_status()?;

        let mut body = response.bytes_stream();
        let mut received = 0u64;
        while let Some(chunk) = body.next().await {
            received += chunk?.len() as u64;
        }

        trace!("downloaded {} bytes from {}", received, url);
        Ok(received)
    }

    async fn send_chunk(&self, url: Url, chunk: Vec<u8>) -> Result<u64> {
        let len = chunk.len() as u64;
        self.client
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(chunk)
            .send()
            .await
            .with_context(|| format!("POST {}", url))?
            .error_for_status()?;
        Ok(len)
    }
}

fn random_payload(size: usize) -> Vec<u8> {
    let mut payload = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut payload);
    payload
}

#[async_trait]
impl SpeedTestProvider for SpeedtestNetProvider {
    async fn user_info(&self) -> Result<UserInfo> {
        let identity: IdentityResponse = self
            .client
            .get(&self.identity_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("unexpected identity response")?;

        Ok(UserInfo {
            ip: identity.client_ip,
            isp: identity.as_organization,
            latitude: identity.latitude.as_ref().and_then(Loose::as_f64),
            longitude: identity.longitude.as_ref().and_then(Loose::as_f64),
        })
    }

    async fn discover_best_target(&self) -> Result<Option<Target>> {
        let entries: Vec<ServerEntry> = self
            .client
            .get(&self.servers_url)
            .query(&self.servers_query())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("unexpected servers list response")?;

        debug!("servers directory returned {} candidates", entries.len());
        Ok(rank_targets(entries, self.location).into_iter().next())
    }

    async fn latency(&self, target: &Target) -> Result<Duration> {
        let url = sibling_url(target, "latency.txt")?;
        let mut total = Duration::ZERO;

        for attempt in 0..PING_COUNT {
            let started = Instant::now();
            self.client
                .get(url.clone())
                .query(&[("x", attempt.to_string())])
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            total += started.elapsed();
        }

        Ok(total / PING_COUNT as u32)
    }

    async fn download(&self, target: &Target) -> Result<f64> {
        let urls = DOWNLOAD_SIZES
            .iter()
            .map(|size| sibling_url(target, &format!("random{size}x{size}.jpg")))
            .collect::<Result<Vec<_>>>()?;

        let started = Instant::now();
        let received = stream::iter(urls)
            .map(|url| self.fetch_count(url))
            .buffer_unordered(CONCURRENCY)
            .try_fold(0u64, |total, bytes| async move { Ok(total + bytes) })
            .await?;

        rate(received, started.elapsed())
    }

    async fn upload(&self, target: &Target) -> Result<f64> {
        let url = Url::parse(&target.url)
            .with_context(|| format!("invalid server url {:?}", target.url))?;
        let payload = random_payload(UPLOAD_CHUNK_SIZE);

        let started = Instant::now();
        let sent = stream::iter(0..UPLOAD_CHUNKS)
            .map(|_| self.send_chunk(url.clone(), payload.clone()))
            .buffer_unordered(CONCURRENCY)
            .try_fold(0u64, |total, bytes| async move { Ok(total + bytes) })
            .await?;

        rate(sent, started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECTORY: &str = r#"[
        {"url":"http://far.example.net:8080/speedtest/upload.php","lat":"51.5074","lon":"-0.1278",
         "distance":12,"name":"London","country":"United Kingdom","sponsor":"Far ISP","id":"101"},
        {"url":"http://near.example.net:8080/speedtest/upload.php","lat":"48.8566","lon":"2.3522",
         "distance":40,"name":"Paris","country":"France","sponsor":"Near ISP","id":202},
        {"url":"http://nowhere.example.net/upload.php","name":"Nowhere","id":"303"}
    ]"#;

    fn entries() -> Vec<ServerEntry> {
        serde_json::from_str(DIRECTORY).unwrap()
    }

    #[test]
    fn test_directory_order_without_hint() {
        let targets = rank_targets(entries(), None);
        let ids: Vec<&str> = targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["101", "202", "303"]);
        assert_eq!(targets[0].distance_km, Some(12.0));
        assert_eq!(targets[2].distance_km, None);
    }

    #[test]
    fn test_hint_reranks_by_great_circle_distance() {
        let paris = GeoHint {
            latitude: 48.85,
            longitude: 2.35,
        };
        let targets = rank_targets(entries(), Some(paris));

        assert_eq!(targets[0].id, "202");
        assert!(targets[0].distance_km.unwrap() < 1.0);
        assert_eq!(targets[1].id, "101");
        let london = targets[1].distance_km.unwrap();
        assert!((london - 343.0).abs() < 5.0, "got {}", london);
    }

    #[test]
    fn test_empty_directory_has_no_target() {
        assert!(rank_targets(Vec::new(), None).is_empty());
    }

    #[test]
    fn test_sibling_urls() {
        let target = rank_targets(entries(), None).remove(0);
        assert_eq!(
            sibling_url(&target, "latency.txt").unwrap().as_str(),
            "http://far.example.net:8080/speedtest/latency.txt"
        );
        assert_eq!(
            sibling_url(&target, "random350x350.jpg").unwrap().as_str(),
            "http://far.example.net:8080/speedtest/random350x350.jpg"
        );
    }

    #[test]
    fn test_rate_requires_elapsed_time() {
        assert_eq!(rate(1_000, Duration::from_millis(500)).unwrap(), 2_000.0);
        assert!(rate(1_000, Duration::ZERO).is_err());
    }

    #[test]
    fn test_identity_response_parsing() {
        let identity: IdentityResponse = serde_json::from_str(
            r#"{"clientIp":"203.0.113.7","asOrganization":"Example","latitude":"48.85","longitude":2.35}"#,
        )
        .unwrap();
        assert_eq!(identity.client_ip, "203.0.113.7");
        assert_eq!(identity.latitude.as_ref().and_then(Loose::as_f64), Some(48.85));
        assert_eq!(identity.longitude.as_ref().and_then(Loose::as_f64), Some(2.35));
    }

    #[test]
    fn test_servers_query_carries_location() {
        let provider = SpeedtestNetProvider::new(Some(GeoHint {
            latitude: 1.5,
            longitude: -2.5,
        }))
        .unwrap();
        let query = provider.servers_query();
        assert!(query.contains(&("lat", "1.5".to_string())));
        assert!(query.contains(&("lon", "-2.5".to_string())));
    }

    #[test]
    fn test_random_payload_size() {
        assert_eq!(random_payload(1024).len(), 1024);
    }
}
