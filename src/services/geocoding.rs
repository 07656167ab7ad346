//! Geocoding abstraction layer with safety features
//!
//! This module provides a safe geocoding architecture that:
//! - Never risks getting blocked by external services
//! - Uses MockGeocoder for development (deterministic, no network)
//! - Uses NominatimGeocoder for production (strict rate limiting, circuit breaker)
//!
//! On top of a provider sits the `GeocodingResolver`, which adds the cache,
//! a per-call timeout, bounded retries and concurrent batch resolution.
//!
//! Configuration via GEOCODER_BACKEND env variable:
//! - "mock" → MockGeocoder
//! - "nominatim" → NominatimGeocoder

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::geocoding_cache::{normalize_address, GeocodeCache};
use super::nominatim::NominatimClient;
use super::retry::{retry_with_backoff, RetryConfig};
use crate::config::Config;
use crate::types::{Coordinates, ErrorCode, ErrorDetail, Stop};

/// Geocoding failure for a single address
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeocodeError {
    #[error("address not found")]
    NotFound,

    #[error("geocoding request timed out")]
    Timeout,

    /// Temporary provider trouble: connection failure, HTTP 429 or 5xx
    #[error("geocoding service unavailable: {0}")]
    Unavailable(String),

    #[error("geocoding service error: {0}")]
    Provider(String),
}

impl GeocodeError {
    /// Whether another attempt may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, GeocodeError::Timeout | GeocodeError::Unavailable(_))
    }

    fn is_provider_error(&self) -> bool {
        matches!(self, GeocodeError::Unavailable(_) | GeocodeError::Provider(_))
    }
}

/// Geocoder trait - abstraction for all geocoding implementations
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Geocode a free-text address to coordinates
    /// Returns None if the address cannot be geocoded
    async fn geocode(&self, address: &str) -> Result<Option<GeocodingResult>, GeocodeError>;

    /// Wait until the provider accepts another call. Callers invoke this
    /// before `geocode`; the wait is not part of the request timeout.
    async fn wait_turn(&self) {}

    /// Get the name of this geocoder implementation
    fn name(&self) -> &'static str;
}

/// Result of geocoding operation
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodingResult {
    /// Latitude and longitude
    pub coordinates: Coordinates,
    /// Confidence score 0.0-1.0
    pub confidence: f64,
    /// Display name returned by geocoder
    pub display_name: String,
}

/// Geocoder implementation selected by GEOCODER_BACKEND
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeocoderBackend {
    Mock,
    Nominatim,
}

impl FromStr for GeocoderBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(GeocoderBackend::Mock),
            "nominatim" => Ok(GeocoderBackend::Nominatim),
            other => Err(format!("unknown geocoder backend '{}' (expected mock or nominatim)", other)),
        }
    }
}

// ==========================================================================
// MockGeocoder Implementation
// ==========================================================================

/// Mock geocoder for development - returns deterministic fake coordinates
pub struct MockGeocoder;

impl MockGeocoder {
    pub fn new() -> Self {
        Self
    }

    /// Generate deterministic coordinates from the normalized address hash.
    /// Coordinates fall inside Manhattan so every mock stop is road-reachable.
    fn hash_to_coordinates(address: &str) -> Coordinates {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        normalize_address(address)
            .unwrap_or_default()
            .hash(&mut hasher);
        let hash = hasher.finish();

        const LAT_MIN: f64 = 40.70;
        const LAT_MAX: f64 = 40.80;
        const LNG_MIN: f64 = -74.01;
        const LNG_MAX: f64 = -73.93;

        let lat_normalized = ((hash >> 32) as f64) / (u32::MAX as f64);
        let lng_normalized = ((hash & 0xFFFF_FFFF) as f64) / (u32::MAX as f64);

        Coordinates::new(
            LAT_MIN + lat_normalized * (LAT_MAX - LAT_MIN),
            LNG_MIN + lng_normalized * (LNG_MAX - LNG_MIN),
        )
    }
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodingResult>, GeocodeError> {
        Ok(Some(GeocodingResult {
            coordinates: Self::hash_to_coordinates(address),
            confidence: 0.95,
            display_name: address.to_string(),
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ==========================================================================
// RateLimiter Implementation
// ==========================================================================

/// Rate limiter that enforces a minimum interval between calls.
///
/// The lock is held while sleeping so concurrent callers are released one
/// interval apart instead of all at once.
pub struct RateLimiter {
    last_call: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_call: Mutex::new(None),
            min_interval,
        }
    }

    /// Wait until it's safe to make another call
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}

// ==========================================================================
// CircuitBreaker Implementation
// ==========================================================================

/// Circuit breaker to prevent hammering a failing service
pub struct CircuitBreaker {
    failure_count: AtomicU32,
    threshold: u32,
    last_failure: parking_lot::Mutex<Option<Instant>>,
    recovery_time: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, recovery_time: Duration) -> Self {
        Self {
            failure_count: AtomicU32::new(0),
            threshold: threshold.max(1),
            last_failure: parking_lot::Mutex::new(None),
            recovery_time,
        }
    }

    /// Check if circuit is open (blocking calls).
    ///
    /// Once the recovery window has passed, the first caller is admitted as
    /// the half-open trial and the window restarts, so concurrent callers stay
    /// blocked until that trial records its outcome.
    pub fn is_open(&self) -> bool {
        if self.failure_count.load(Ordering::Relaxed) < self.threshold {
            return false;
        }
        let mut last_failure = self.last_failure.lock();
        match *last_failure {
            Some(last_time) if last_time.elapsed() >= self.recovery_time => {
                *last_failure = Some(Instant::now());
                false
            }
            _ => true,
        }
    }

    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        *self.last_failure.lock() = Some(Instant::now());
    }

    /// Record a success (resets failure count)
    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
    }
}

// ==========================================================================
// NominatimGeocoder Implementation
// ==========================================================================

const DEFAULT_CIRCUIT_BREAKER_THRESHOLD: u32 = 5;

const DEFAULT_CIRCUIT_BREAKER_RECOVERY_SECS: u64 = 60;

/// Rate-limited Nominatim geocoder with circuit breaker protection
pub struct NominatimGeocoder {
    client: NominatimClient,
    rate_limiter: RateLimiter,
    pub(crate) circuit_breaker: CircuitBreaker,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, rate_limit_interval: Duration, timeout: Duration) -> anyhow::Result<Self> {
        Self::with_config(
            base_url,
            rate_limit_interval,
            timeout,
            DEFAULT_CIRCUIT_BREAKER_THRESHOLD,
            Duration::from_secs(DEFAULT_CIRCUIT_BREAKER_RECOVERY_SECS),
        )
    }

    pub fn with_config(
        base_url: &str,
        rate_limit_interval: Duration,
        timeout: Duration,
        circuit_breaker_threshold: u32,
        circuit_breaker_recovery: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            client: NominatimClient::new(base_url, timeout)?,
            rate_limiter: RateLimiter::new(rate_limit_interval),
            circuit_breaker: CircuitBreaker::new(circuit_breaker_threshold, circuit_breaker_recovery),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodingResult>, GeocodeError> {
        if self.circuit_breaker.is_open() {
            warn!("Circuit breaker is open, rejecting geocoding request");
            return Err(GeocodeError::Unavailable("circuit breaker open".to_string()));
        }

        match self.client.geocode(address).await {
            Ok(place) => {
                // No result found is not a failure
                self.circuit_breaker.record_success();
                Ok(place.map(|p| GeocodingResult {
                    coordinates: p.coordinates,
                    confidence: p.confidence,
                    display_name: p.display_name,
                }))
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                error!("Geocoding '{}' failed: {}", address, e);
                Err(e)
            }
        }
    }

    async fn wait_turn(&self) {
        self.rate_limiter.wait().await;
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

// ==========================================================================
// Factory function
// ==========================================================================

/// Create the geocoder selected in configuration
pub fn create_geocoder(config: &Config) -> anyhow::Result<Arc<dyn Geocoder>> {
    match config.geocoder_backend {
        GeocoderBackend::Mock => {
            info!("Using MockGeocoder");
            Ok(Arc::new(MockGeocoder::new()))
        }
        GeocoderBackend::Nominatim => {
            info!("Using NominatimGeocoder at {}", config.nominatim_url);
            Ok(Arc::new(NominatimGeocoder::new(
                &config.nominatim_url,
                config.geocoding_rate_limit,
                config.geocoding_timeout,
            )?))
        }
    }
}

// ==========================================================================
// GeocodingResolver
// ==========================================================================

/// One stop whose address could not be resolved
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeFailure {
    pub index: usize,
    pub address: String,
    pub error: GeocodeError,
}

impl GeocodeFailure {
    pub fn detail(&self) -> ErrorDetail {
        let message = match &self.error {
            GeocodeError::NotFound => format!("Could not geocode address: {}", self.address),
            other => format!("Could not geocode address '{}': {}", self.address, other),
        };
        ErrorDetail::new(format!("stops[{}].address", self.index), message).with_value(self.address.clone())
    }
}

/// Error code summarizing a set of geocoding failures
pub fn failure_code(failures: &[GeocodeFailure]) -> ErrorCode {
    if failures.is_empty() {
        return ErrorCode::GeocodingFailed;
    }
    if failures.iter().all(|f| f.error == GeocodeError::Timeout) {
        ErrorCode::GeocodingTimeout
    } else if failures.iter().all(|f| f.error.is_provider_error()) {
        ErrorCode::GeocodingServiceError
    } else {
        ErrorCode::GeocodingFailed
    }
}

/// Cache-first address resolution with timeout and bounded retries
pub struct GeocodingResolver {
    geocoder: Arc<dyn Geocoder>,
    cache: Arc<GeocodeCache>,
    retry: RetryConfig,
    timeout: Duration,
}

impl GeocodingResolver {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        cache: Arc<GeocodeCache>,
        retry: RetryConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            geocoder,
            cache,
            retry,
            timeout,
        }
    }

    pub fn cache(&self) -> &Arc<GeocodeCache> {
        &self.cache
    }

    pub fn backend_name(&self) -> &'static str {
        self.geocoder.name()
    }

    /// Resolve one address. Only successful lookups are cached.
    pub async fn resolve(&self, address: &str) -> Result<GeocodingResult, GeocodeError> {
        if let Some(hit) = self.cache.get(address) {
            return Ok(hit);
        }

        let result = retry_with_backoff(&self.retry, "Geocoding", GeocodeError::is_transient, || async {
            self.geocoder.wait_turn().await;
            match tokio::time::timeout(self.timeout, self.geocoder.geocode(address)).await {
                Ok(Ok(Some(result))) => Ok(result),
                Ok(Ok(None)) => Err(GeocodeError::NotFound),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(GeocodeError::Timeout),
            }
        })
        .await?;

        let coords = result.coordinates;
        if !Coordinates::is_valid_latitude(coords.lat) || !Coordinates::is_valid_longitude(coords.lng) {
            return Err(GeocodeError::Provider(format!(
                "coordinates out of range ({}, {})",
                coords.lat, coords.lng
            )));
        }

        debug!("Geocoded '{}' -> ({}, {})", address, coords.lat, coords.lng);
        Ok(self.cache.insert(address, result))
    }

    /// Fill in coordinates for every stop that needs geocoding.
    ///
    /// Distinct normalized addresses are looked up concurrently, once each.
    /// Returns the number of stops geocoded, or every failure ordered by
    /// stop index.
    pub async fn resolve_stops(&self, stops: &mut [Stop]) -> Result<usize, Vec<GeocodeFailure>> {
        let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
        let mut by_key: HashMap<String, usize> = HashMap::new();

        for (index, stop) in stops.iter().enumerate() {
            if !stop.needs_geocoding() {
                continue;
            }
            let Some(address) = stop.address() else {
                continue;
            };
            let key = normalize_address(address).unwrap_or_else(|| address.to_string());
            match by_key.get(&key) {
                Some(&group) => groups[group].1.push(index),
                None => {
                    by_key.insert(key, groups.len());
                    groups.push((address.to_string(), vec![index]));
                }
            }
        }

        if groups.is_empty() {
            return Ok(0);
        }

        info!(
            "Geocoding {} distinct addresses with {}",
            groups.len(),
            self.geocoder.name()
        );

        let results = join_all(groups.iter().map(|(address, _)| self.resolve(address))).await;

        let mut geocoded = 0;
        let mut failures = Vec::new();
        for ((address, indices), result) in groups.into_iter().zip(results) {
            match result {
                Ok(found) => {
                    for index in indices {
                        stops[index].set_geocoded_coordinates(found.coordinates, Some(found.confidence));
                        geocoded += 1;
                    }
                }
                Err(e) => {
                    warn!("Failed to geocode '{}': {}", address, e);
                    for index in indices {
                        let original = stops[index].address().unwrap_or(&address).to_string();
                        failures.push(GeocodeFailure {
                            index,
                            address: original,
                            error: e.clone(),
                        });
                    }
                }
            }
        }

        if failures.is_empty() {
            Ok(geocoded)
        } else {
            failures.sort_by_key(|f| f.index);
            Err(failures)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::StaticGeocoder;

    fn resolver(geocoder: Arc<StaticGeocoder>, attempts: u32) -> GeocodingResolver {
        GeocodingResolver::new(
            geocoder,
            Arc::new(GeocodeCache::with_ttl_days(100, 30)),
            RetryConfig::immediate(attempts),
            Duration::from_secs(1),
        )
    }

    // ==========================================================================
    // MockGeocoder Tests
    // ==========================================================================

    #[tokio::test]
    async fn mock_geocoder_returns_deterministic_coordinates() {
        let geocoder = MockGeocoder::new();

        let first = geocoder.geocode("350 5th Ave, New York").await.unwrap().unwrap();
        let second = geocoder.geocode("350  Fifth Avenue New York").await.unwrap();
        let again = geocoder.geocode("350 5th Ave, New York").await.unwrap().unwrap();

        assert_eq!(first.coordinates, again.coordinates);
        assert!(second.is_some());
    }

    #[tokio::test]
    async fn mock_geocoder_returns_coordinates_within_bounds() {
        let geocoder = MockGeocoder::new();

        for address in ["1 Main St", "2 Broadway", "3 Park Ave", "4 Wall St"] {
            let result = geocoder.geocode(address).await.unwrap().unwrap();
            assert!((40.70..=40.80).contains(&result.coordinates.lat), "{}", address);
            assert!((-74.01..=-73.93).contains(&result.coordinates.lng), "{}", address);
            assert!(result.confidence >= 0.9);
        }
        assert_eq!(geocoder.name(), "mock");
    }

    #[test]
    fn geocoder_backend_parses_names() {
        assert_eq!("Mock".parse::<GeocoderBackend>(), Ok(GeocoderBackend::Mock));
        assert_eq!("nominatim".parse::<GeocoderBackend>(), Ok(GeocoderBackend::Nominatim));
        assert!("google".parse::<GeocoderBackend>().is_err());
    }

    // ==========================================================================
    // RateLimiter Tests
    // ==========================================================================

    #[tokio::test]
    async fn rate_limiter_enforces_minimum_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        let start = Instant::now();

        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(50), "First call should be immediate");

        limiter.wait().await;
        assert!(
            start.elapsed() >= Duration::from_millis(100),
            "Second call should wait at least 100ms, took {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn rate_limiter_spaces_concurrent_callers() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        let start = Instant::now();

        futures::join!(limiter.wait(), limiter.wait(), limiter.wait());

        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    // ==========================================================================
    // CircuitBreaker Tests
    // ==========================================================================

    #[test]
    fn circuit_breaker_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        assert!(!breaker.is_open());

        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open(), "Should not open after 2 failures");

        breaker.record_failure();
        assert!(breaker.is_open(), "Should open after 3 failures");
    }

    #[test]
    fn circuit_breaker_resets_on_success() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();

        assert!(!breaker.is_open(), "Should not be open, count was reset");
    }

    #[tokio::test]
    async fn circuit_breaker_closes_after_recovery_time() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(50));
        breaker.record_failure();
        assert!(breaker.is_open());

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!breaker.is_open(), "Circuit breaker should close after recovery time");
    }

    #[tokio::test]
    async fn circuit_breaker_admits_single_trial_when_half_open() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(50));
        breaker.record_failure();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!breaker.is_open(), "First caller is the trial");
        assert!(breaker.is_open(), "Others wait for the trial outcome");
        assert!(breaker.is_open());

        breaker.record_success();
        assert!(!breaker.is_open());
        assert!(!breaker.is_open());
    }

    #[tokio::test]
    async fn circuit_breaker_reopens_when_trial_fails() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(50));
        breaker.record_failure();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!breaker.is_open());
        breaker.record_failure();

        assert!(breaker.is_open());
    }

    #[tokio::test]
    async fn nominatim_geocoder_rejects_when_circuit_breaker_open() {
        let geocoder = NominatimGeocoder::with_config(
            "http://127.0.0.1:9",
            Duration::from_millis(10),
            Duration::from_secs(1),
            1,
            Duration::from_secs(300),
        )
        .unwrap();

        geocoder.circuit_breaker.record_failure();

        let err = geocoder.geocode("Test").await.unwrap_err();
        assert!(err.to_string().contains("circuit breaker"));
        assert!(err.is_transient());
    }

    // ==========================================================================
    // GeocodingResolver Tests
    // ==========================================================================

    #[tokio::test]
    async fn resolver_serves_repeat_lookups_from_cache() {
        let geocoder = Arc::new(StaticGeocoder::new().with_address("1 Main Street", 40.0, -74.0));
        let resolver = resolver(geocoder.clone(), 3);

        let first = resolver.resolve("1 Main Street").await.unwrap();
        let second = resolver.resolve("  1 MAIN st ").await.unwrap();

        assert_eq!(first.coordinates, second.coordinates);
        assert_eq!(geocoder.calls(), 1);
        assert_eq!(resolver.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn resolver_does_not_cache_or_retry_not_found() {
        let geocoder = Arc::new(StaticGeocoder::new());
        let resolver = resolver(geocoder.clone(), 3);

        assert_eq!(resolver.resolve("Nowhere").await, Err(GeocodeError::NotFound));
        assert_eq!(geocoder.calls(), 1);
        assert!(resolver.cache().is_empty());

        assert_eq!(resolver.resolve("Nowhere").await, Err(GeocodeError::NotFound));
        assert_eq!(geocoder.calls(), 2);
    }

    #[tokio::test]
    async fn resolver_retries_transient_failures() {
        let geocoder = Arc::new(
            StaticGeocoder::new()
                .with_address("A", 1.0, 1.0)
                .failing_first(2, GeocodeError::Unavailable("HTTP 503".to_string())),
        );
        let resolver = resolver(geocoder.clone(), 3);

        let result = resolver.resolve("A").await.unwrap();
        assert_eq!(result.coordinates, Coordinates::new(1.0, 1.0));
        assert_eq!(geocoder.calls(), 3);
    }

    #[tokio::test]
    async fn resolver_rejects_out_of_range_provider_coordinates() {
        let geocoder = Arc::new(StaticGeocoder::new().with_address("Bad", 123.0, 0.0));
        let resolver = resolver(geocoder, 1);

        assert!(matches!(resolver.resolve("Bad").await, Err(GeocodeError::Provider(_))));
        assert!(resolver.cache().is_empty());
    }

    struct QueuedGeocoder;

    #[async_trait]
    impl Geocoder for QueuedGeocoder {
        async fn geocode(&self, _address: &str) -> Result<Option<GeocodingResult>, GeocodeError> {
            Ok(Some(GeocodingResult {
                coordinates: Coordinates::new(1.0, 2.0),
                confidence: 1.0,
                display_name: "queued".to_string(),
            }))
        }

        async fn wait_turn(&self) {
            tokio::time::sleep(Duration::from_millis(150)).await;
        }

        fn name(&self) -> &'static str {
            "queued"
        }
    }

    #[tokio::test]
    async fn resolver_timeout_excludes_rate_limit_wait() {
        let resolver = GeocodingResolver::new(
            Arc::new(QueuedGeocoder),
            Arc::new(GeocodeCache::with_ttl_days(10, 1)),
            RetryConfig::immediate(1),
            Duration::from_millis(50),
        );

        let result = resolver.resolve("Somewhere").await.unwrap();
        assert_eq!(result.coordinates, Coordinates::new(1.0, 2.0));
    }

    /// Answers after a fixed delay; addresses starting with "Nowhere" fail at once
    struct SlowGeocoder {
        delay: Duration,
    }

    #[async_trait]
    impl Geocoder for SlowGeocoder {
        async fn geocode(&self, address: &str) -> Result<Option<GeocodingResult>, GeocodeError> {
            if address.starts_with("Nowhere") {
                return Err(GeocodeError::Provider("rejected".to_string()));
            }
            tokio::time::sleep(self.delay).await;
            Ok(Some(GeocodingResult {
                coordinates: Coordinates::new(3.0, 4.0),
                confidence: 0.7,
                display_name: address.to_string(),
            }))
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    fn slow_resolver() -> GeocodingResolver {
        GeocodingResolver::new(
            Arc::new(SlowGeocoder {
                delay: Duration::from_millis(100),
            }),
            Arc::new(GeocodeCache::with_ttl_days(10, 1)),
            RetryConfig::immediate(1),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn resolve_stops_looks_up_addresses_concurrently() {
        let resolver = slow_resolver();
        let mut stops = vec![
            Stop::from_address("1 First St"),
            Stop::from_address("2 Second St"),
            Stop::from_address("3 Third St"),
        ];

        let started = Instant::now();
        let geocoded = resolver.resolve_stops(&mut stops).await.unwrap();

        assert_eq!(geocoded, 3);
        assert!(
            started.elapsed() < Duration::from_millis(250),
            "three 100ms lookups took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn resolve_stops_completes_slow_lookups_next_to_failures() {
        let resolver = slow_resolver();
        let mut stops = vec![Stop::from_address("Nowhere"), Stop::from_address("1 First St")];

        let failures = resolver.resolve_stops(&mut stops).await.unwrap_err();

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 0);
        assert!(stops[1].geocoded);
        assert_eq!(stops[1].coordinates(), Some(Coordinates::new(3.0, 4.0)));
        assert_eq!(resolver.cache().len(), 1);
    }

    #[tokio::test]
    async fn resolve_stops_fills_coordinates_and_dedupes_addresses() {
        let geocoder = Arc::new(
            StaticGeocoder::new()
                .with_address("A Street", 1.0, 1.0)
                .with_address("B", 2.0, 2.0),
        );
        let resolver = resolver(geocoder.clone(), 1);
        let mut stops = vec![
            Stop::from_address("A Street"),
            Stop::from_coordinates(5.0, 5.0),
            Stop::from_address("a st"),
            Stop::from_address("B"),
        ];

        let geocoded = resolver.resolve_stops(&mut stops).await.unwrap();

        assert_eq!(geocoded, 3);
        assert_eq!(geocoder.calls(), 2);
        assert_eq!(stops[0].coordinates(), Some(Coordinates::new(1.0, 1.0)));
        assert_eq!(stops[2].coordinates(), Some(Coordinates::new(1.0, 1.0)));
        assert_eq!(stops[2].original_address.as_deref(), Some("a st"));
        assert!(!stops[1].geocoded);
        assert!(stops.iter().filter(|s| s.geocoded).count() == 3);
    }

    #[tokio::test]
    async fn resolve_stops_reports_every_failure() {
        let geocoder = Arc::new(StaticGeocoder::new().with_address("A", 1.0, 1.0));
        let resolver = resolver(geocoder, 1);
        let mut stops = vec![
            Stop::from_address("Nowhere 1"),
            Stop::from_address("A"),
            Stop::from_address("Nowhere 2"),
        ];

        let failures = resolver.resolve_stops(&mut stops).await.unwrap_err();

        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].index, 0);
        assert_eq!(failures[1].address, "Nowhere 2");
        assert_eq!(failure_code(&failures), ErrorCode::GeocodingFailed);

        let detail = failures[1].detail();
        assert_eq!(detail.field.as_deref(), Some("stops[2].address"));
        assert_eq!(detail.value, Some(serde_json::json!("Nowhere 2")));
    }

    #[test]
    fn failure_code_distinguishes_timeouts_and_provider_errors() {
        let failure = |error| GeocodeFailure {
            index: 0,
            address: "A".to_string(),
            error,
        };

        assert_eq!(
            failure_code(&[failure(GeocodeError::Timeout), failure(GeocodeError::Timeout)]),
            ErrorCode::GeocodingTimeout
        );
        assert_eq!(
            failure_code(&[
                failure(GeocodeError::Provider("x".into())),
                failure(GeocodeError::Unavailable("y".into()))
            ]),
            ErrorCode::GeocodingServiceError
        );
        assert_eq!(
            failure_code(&[failure(GeocodeError::Timeout), failure(GeocodeError::NotFound)]),
            ErrorCode::GeocodingFailed
        );
    }
}
