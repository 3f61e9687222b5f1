// tests/region_proxy.rs
//
// Cache behavior of the region proxy against a fixture upstream:
// index fetched once per TTL window, refetched after expiry, and
// refetched immediately after an explicit invalidate().

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tsunami_hazard_analyzer::regions::{Clock, RegionError, RegionProxy, RegionSource};

struct CountingSource {
    index_fetches: Arc<AtomicUsize>,
}

#[async_trait]
impl RegionSource for CountingSource {
    async fn fetch_index(&self) -> Result<String, RegionError> {
        self.index_fetches.fetch_add(1, Ordering::SeqCst);
        Ok("ADM1_CODE;ADM1_NAME;ADM0_CODE;ADM0_NAME\n1690;Tokyo;115;Japan\n".to_string())
    }

    async fn fetch_geojson(&self, code: &str) -> Result<String, RegionError> {
        Ok(format!("{{\"code\":\"{code}\"}}"))
    }

    fn name(&self) -> &'static str {
        "counting-fixture"
    }
}

struct FailingSource;

#[async_trait]
impl RegionSource for FailingSource {
    async fn fetch_index(&self) -> Result<String, RegionError> {
        Err(RegionError::Fetch("connection refused".into()))
    }

    async fn fetch_geojson(&self, _code: &str) -> Result<String, RegionError> {
        Err(RegionError::Fetch("connection refused".into()))
    }

    fn name(&self) -> &'static str {
        "failing-fixture"
    }
}

/// Clock whose "now" only moves when the test says so.
#[derive(Clone)]
struct ManualClock(Arc<Mutex<Instant>>);

impl ManualClock {
    fn start() -> Self {
        Self(Arc::new(Mutex::new(Instant::now())))
    }

    fn advance(&self, by: Duration) {
        let mut now = self.0.lock().expect("clock lock");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.0.lock().expect("clock lock")
    }
}

fn proxy_with(
    clock: ManualClock,
    ttl: Duration,
) -> (RegionProxy, Arc<AtomicUsize>) {
    let fetches = Arc::new(AtomicUsize::new(0));
    let source = CountingSource {
        index_fetches: fetches.clone(),
    };
    let proxy = RegionProxy::new(Box::new(source), Box::new(clock), ttl);
    (proxy, fetches)
}

#[tokio::test]
async fn index_is_fetched_once_within_the_ttl_window() {
    let clock = ManualClock::start();
    let (proxy, fetches) = proxy_with(clock.clone(), Duration::from_secs(3600));

    let geojson = proxy.geojson_for("Tokyo").await.expect("lookup");
    assert_eq!(geojson.as_deref(), Some("{\"code\":\"1690\"}"));
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    // Further lookups inside the window reuse the cached index,
    // including misses.
    clock.advance(Duration::from_secs(1800));
    assert!(proxy.geojson_for("tokyo").await.expect("lookup").is_some());
    assert!(proxy.geojson_for("nowhere").await.expect("lookup").is_none());
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn index_is_refetched_after_the_ttl_expires() {
    let clock = ManualClock::start();
    let (proxy, fetches) = proxy_with(clock.clone(), Duration::from_secs(3600));

    proxy.geojson_for("Tokyo").await.expect("lookup");
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    clock.advance(Duration::from_secs(3601));
    proxy.geojson_for("Tokyo").await.expect("lookup");
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn invalidate_forces_an_immediate_refetch() {
    let clock = ManualClock::start();
    let (proxy, fetches) = proxy_with(clock, Duration::from_secs(3600));

    proxy.geojson_for("Tokyo").await.expect("lookup");
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    proxy.invalidate().await;
    proxy.geojson_for("Tokyo").await.expect("lookup");
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn upstream_failure_surfaces_as_fetch_error() {
    let clock = ManualClock::start();
    let proxy = RegionProxy::new(
        Box::new(FailingSource),
        Box::new(clock),
        Duration::from_secs(3600),
    );

    let err = proxy.geojson_for("Tokyo").await.unwrap_err();
    assert!(matches!(err, RegionError::Fetch(_)));
}
