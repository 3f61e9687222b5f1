//! # Hazard-Region Proxy
//!
//! Proxies per-region tsunami hazard GeoJSON from thinkhazard.org. The
//! region name → ADM1 code index comes from the GFDRR methods CSV and is
//! memoized behind an explicit TTL cache with an injectable clock and an
//! explicit `invalidate()` — no implicit process-wide state.
//!
//! The upstream is abstracted behind `RegionSource`, so tests run against
//! fixtures instead of the network.

use async_trait::async_trait;
use metrics::counter;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

const ADM1_CSV_URL: &str =
    "https://raw.githubusercontent.com/GFDRR/thinkhazardmethods/master/source/download/ADM1_TH.csv";

#[derive(Debug, Error)]
pub enum RegionError {
    #[error("failed to fetch region data from upstream: {0}")]
    Fetch(String),
    #[error("region index unavailable")]
    IndexUnavailable,
}

/// Upstream supplying the region index CSV and per-code GeoJSON bodies.
#[async_trait]
pub trait RegionSource: Send + Sync {
    async fn fetch_index(&self) -> Result<String, RegionError>;
    async fn fetch_geojson(&self, code: &str) -> Result<String, RegionError>;
    fn name(&self) -> &'static str;
}

pub struct HttpRegionSource {
    client: reqwest::Client,
    index_url: String,
}

impl HttpRegionSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            index_url: ADM1_CSV_URL.to_string(),
        }
    }

    fn geojson_url(code: &str) -> String {
        format!("https://thinkhazard.org/en/report/{code}/TS.geojson")
    }

    async fn get_text(&self, url: &str) -> Result<String, RegionError> {
        self.client
            .get(url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RegionError::Fetch(e.to_string()))?
            .text()
            .await
            .map_err(|e| RegionError::Fetch(e.to_string()))
    }
}

impl Default for HttpRegionSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegionSource for HttpRegionSource {
    async fn fetch_index(&self) -> Result<String, RegionError> {
        self.get_text(&self.index_url).await
    }

    async fn fetch_geojson(&self, code: &str) -> Result<String, RegionError> {
        self.get_text(&Self::geojson_url(code)).await
    }

    fn name(&self) -> &'static str {
        "thinkhazard"
    }
}

/// Injectable time source so TTL expiry is testable without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct CachedIndex {
    map: HashMap<String, String>,
    fetched_at: Instant,
}

/// Memoized region lookup service.
pub struct RegionProxy {
    source: Box<dyn RegionSource>,
    clock: Box<dyn Clock>,
    ttl: Duration,
    index: RwLock<Option<CachedIndex>>,
}

impl RegionProxy {
    pub fn new(source: Box<dyn RegionSource>, clock: Box<dyn Clock>, ttl: Duration) -> Self {
        Self {
            source,
            clock,
            ttl,
            index: RwLock::new(None),
        }
    }

    /// Fetch the hazard GeoJSON for a region by name.
    /// `Ok(None)` means the name is not in the index — a normal outcome.
    pub async fn geojson_for(&self, region: &str) -> Result<Option<String>, RegionError> {
        let key = normalize_region_key(region);
        let code = match self.lookup_code(&key).await? {
            Some(code) => code,
            None => return Ok(None),
        };
        self.source.fetch_geojson(&code).await.map(Some)
    }

    /// Drop the cached index; the next lookup refetches it.
    pub async fn invalidate(&self) {
        *self.index.write().await = None;
        info!(source = self.source.name(), "region index invalidated");
    }

    async fn lookup_code(&self, key: &str) -> Result<Option<String>, RegionError> {
        {
            let guard = self.index.read().await;
            if let Some(cached) = guard.as_ref() {
                if self.clock.now().duration_since(cached.fetched_at) < self.ttl {
                    counter!("region_index_cache_hits_total").increment(1);
                    return Ok(cached.map.get(key).cloned());
                }
            }
        }

        counter!("region_index_cache_misses_total").increment(1);
        let text = self.source.fetch_index().await?;
        let map = parse_region_index(&text);
        if map.is_empty() {
            warn!(source = self.source.name(), "region index came back empty");
            return Err(RegionError::IndexUnavailable);
        }

        let code = map.get(key).cloned();
        *self.index.write().await = Some(CachedIndex {
            map,
            fetched_at: self.clock.now(),
        });
        Ok(code)
    }
}

/// Parse the semicolon-delimited ADM1 CSV into lowercase name → code.
fn parse_region_index(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let mut fields = line.split(';');
        let code = fields.next().unwrap_or_default().trim();
        let name = fields.next().unwrap_or_default().trim();
        if code.is_empty() || name.is_empty() || code == "ADM1_CODE" {
            continue;
        }
        map.insert(name.to_lowercase(), code.to_string());
    }
    map
}

/// Normalize a queried region name the same way index keys are built.
fn normalize_region_key(name: &str) -> String {
    name.replace('-', " ").trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_parsing_skips_header_and_blank_fields() {
        let csv = "\
ADM1_CODE;ADM1_NAME;ADM0_CODE;ADM0_NAME
1690;Tokyo;115;Japan
;Nameless;1;X
42;;1;X
77;Crescent City;244;USA
";
        let map = parse_region_index(csv);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("tokyo").map(String::as_str), Some("1690"));
        assert_eq!(map.get("crescent city").map(String::as_str), Some("77"));
    }

    #[test]
    fn region_keys_fold_dashes_and_case() {
        assert_eq!(normalize_region_key("Crescent-City "), "crescent city");
    }
}
