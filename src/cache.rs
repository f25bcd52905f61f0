//! Per-sensor measurement cache.
//!
//! The cache owns one bounded [`MeasurementSeries`] per sensor. Series are
//! generated lazily on the first fetch and then live for as long as the
//! cache does; there is no expiry or invalidation.
//!
//! Each entry is a per-key [`OnceCell`], so concurrent first fetches for the
//! same sensor generate the series exactly once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::OnceCell;
use tracing::debug;

use dispwatch_types::{
    Measurement, MeasurementResponse, MeasurementSeries, SensorCatalog, DEFAULT_SERIES_CAPACITY,
};

use crate::generator::{self, GeneratorParams};

/// Simulated round-trip time of a fetch.
pub const DEFAULT_FETCH_LATENCY: Duration = Duration::from_millis(400);

type Slot = Arc<OnceCell<Mutex<MeasurementSeries>>>;

/// Cache of measurement series keyed by sensor id.
///
/// # Example
///
/// ```
/// use dispwatch::MeasurementCache;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let cache = MeasurementCache::builder()
///     .latency(Duration::ZERO)
///     .seed(7)
///     .build();
///
/// let series = cache.fetch("SEN-002").await;
/// assert_eq!(series.len(), 100);
///
/// let next = cache.append("SEN-002").unwrap();
/// assert_eq!(cache.last_value("SEN-002"), next.disp_mm);
/// # });
/// ```
pub struct MeasurementCache {
    catalog: SensorCatalog,
    entries: Mutex<HashMap<String, Slot>>,
    rng: Mutex<StdRng>,
    params: GeneratorParams,
    latency: Duration,
    capacity: usize,
}

impl MeasurementCache {
    /// Create a cache with the built-in catalog and default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for configuring the cache.
    pub fn builder() -> MeasurementCacheBuilder {
        MeasurementCacheBuilder::new()
    }

    pub fn catalog(&self) -> &SensorCatalog {
        &self.catalog
    }

    pub fn params(&self) -> &GeneratorParams {
        &self.params
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Fetch the series for a sensor, generating it on first access.
    ///
    /// Every call waits for the configured latency before answering.
    /// Later calls return the stored series unchanged.
    pub async fn fetch(&self, sensor_id: &str) -> Vec<Measurement> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let slot = self.slot(sensor_id);
        if slot.initialized() {
            debug!(sensor = sensor_id, "cache hit");
        }
        let series = slot
            .get_or_init(|| async { Mutex::new(self.generate(sensor_id)) })
            .await;
        let points = series.lock().to_vec();
        points
    }

    /// Fetch wrapped in the API response shape.
    pub async fn fetch_response(&self, sensor_id: &str) -> MeasurementResponse {
        MeasurementResponse {
            sensor_id: sensor_id.to_string(),
            measurements: self.fetch(sensor_id).await,
        }
    }

    /// Append one synthetic reading to a cached series.
    ///
    /// Returns `None` without creating an entry if the sensor has not been
    /// fetched yet (or its first fetch is still in flight).
    pub fn append(&self, sensor_id: &str) -> Option<Measurement> {
        let slot = self.entries.lock().get(sensor_id).cloned()?;
        let mut series = slot.get()?.lock();
        let last = series.last()?.clone();

        let threshold = self.catalog.threshold_for(sensor_id);
        let next = {
            let mut rng = self.rng.lock();
            generator::next_measurement(&last, threshold, &self.params, &mut *rng)
        };

        let evicted = series.push(next.clone());
        debug!(
            sensor = sensor_id,
            disp_mm = next.disp_mm,
            evicted,
            "appended measurement"
        );
        Some(next)
    }

    /// Displacement of the most recent cached reading, or 0 if there is none.
    pub fn last_value(&self, sensor_id: &str) -> f64 {
        self.with_series(sensor_id, |s| s.last().map(|m| m.disp_mm))
            .flatten()
            .unwrap_or(0.0)
    }

    /// A copy of the cached series, without the fetch latency.
    pub fn series(&self, sensor_id: &str) -> Option<MeasurementSeries> {
        self.with_series(sensor_id, MeasurementSeries::clone)
    }

    /// Number of cached points for a sensor, or 0 if none.
    pub fn series_len(&self, sensor_id: &str) -> usize {
        self.with_series(sensor_id, MeasurementSeries::len).unwrap_or(0)
    }

    /// Whether a series has been generated for `sensor_id`.
    pub fn contains(&self, sensor_id: &str) -> bool {
        self.with_series(sensor_id, |_| ()).is_some()
    }

    /// Number of sensors with a generated series.
    pub fn len(&self) -> usize {
        self.entries.lock().values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_series<T>(&self, sensor_id: &str, f: impl FnOnce(&MeasurementSeries) -> T) -> Option<T> {
        let slot = self.entries.lock().get(sensor_id).cloned()?;
        let series = slot.get()?.lock();
        Some(f(&series))
    }

    fn slot(&self, sensor_id: &str) -> Slot {
        self.entries
            .lock()
            .entry(sensor_id.to_string())
            .or_default()
            .clone()
    }

    fn generate(&self, sensor_id: &str) -> MeasurementSeries {
        let threshold = self.catalog.threshold_for(sensor_id);
        let points = {
            let mut rng = self.rng.lock();
            generator::generate_series(threshold, Utc::now(), &self.params, &mut *rng)
        };
        debug!(
            sensor = sensor_id,
            threshold,
            points = points.len(),
            "cache miss, generated series"
        );
        MeasurementSeries::from_measurements(points, self.capacity)
    }
}

impl Default for MeasurementCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MeasurementCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementCache")
            .field("sensors", &self.len())
            .field("latency", &self.latency)
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Builder for configuring a [`MeasurementCache`].
#[derive(Debug, Default)]
pub struct MeasurementCacheBuilder {
    catalog: Option<SensorCatalog>,
    params: Option<GeneratorParams>,
    latency: Option<Duration>,
    capacity: Option<usize>,
    seed: Option<u64>,
}

impl MeasurementCacheBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sensors and thresholds. Defaults to the built-in catalog.
    pub fn catalog(mut self, catalog: SensorCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn params(mut self, params: GeneratorParams) -> Self {
        self.params = Some(params);
        self
    }

    /// Simulated fetch latency. Defaults to 400ms.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Maximum points kept per sensor. Defaults to 100.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Seed the random source for reproducible series.
    ///
    /// Without a seed the source is seeded from the OS.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the cache.
    pub fn build(self) -> MeasurementCache {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        MeasurementCache {
            catalog: self.catalog.unwrap_or_default(),
            entries: Mutex::new(HashMap::new()),
            rng: Mutex::new(rng),
            params: self.params.unwrap_or_default(),
            latency: self.latency.unwrap_or(DEFAULT_FETCH_LATENCY),
            capacity: self.capacity.unwrap_or(DEFAULT_SERIES_CAPACITY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn instant_cache() -> MeasurementCache {
        MeasurementCache::builder()
            .latency(Duration::ZERO)
            .seed(11)
            .build()
    }

    #[tokio::test]
    async fn fetch_is_idempotent() {
        let cache = instant_cache();

        let first = cache.fetch("SEN-001").await;
        let second = cache.fetch("SEN-001").await;

        assert_eq!(first.len(), 100);
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn fetch_uses_catalog_threshold() {
        let cache = instant_cache();

        let series = cache.fetch("SEN-002").await;

        assert_eq!(series.len(), 100);
        for m in &series {
            assert!((1.4 - 1e-9..=3.8 + 1e-9).contains(&m.disp_mm), "{}", m.disp_mm);
        }
    }

    #[tokio::test]
    async fn unknown_sensor_uses_default_threshold() {
        let cache = instant_cache();

        let series = cache.fetch("SEN-404").await;

        assert_eq!(series.len(), 100);
        for m in &series {
            assert!((2.1 - 1e-9..=5.7 + 1e-9).contains(&m.disp_mm), "{}", m.disp_mm);
        }
    }

    #[tokio::test]
    async fn append_on_full_series_evicts_oldest() {
        let cache = instant_cache();
        let before = cache.fetch("SEN-002").await;

        let appended = cache.append("SEN-002").unwrap();
        let after = cache.series("SEN-002").unwrap();

        assert_eq!(after.len(), 100);
        assert_eq!(
            appended.timestamp,
            before.last().unwrap().timestamp + ChronoDuration::minutes(45)
        );
        assert_eq!(after.last(), Some(&appended));
        assert_eq!(after.first(), Some(&before[1]));
        assert!((1.4 - 1e-9..=3.8 + 1e-9).contains(&appended.disp_mm));
    }

    #[tokio::test]
    async fn append_on_unknown_sensor_is_absent() {
        let cache = instant_cache();

        assert!(cache.append("SEN-001").is_none());
        assert!(!cache.contains("SEN-001"));
        assert!(cache.is_empty());
        assert!(cache.entries.lock().is_empty());
    }

    #[tokio::test]
    async fn last_value_tracks_newest_point() {
        let cache = instant_cache();
        assert_eq!(cache.last_value("SEN-003"), 0.0);

        let series = cache.fetch("SEN-003").await;
        assert_eq!(cache.last_value("SEN-003"), series.last().unwrap().disp_mm);

        let next = cache.append("SEN-003").unwrap();
        assert_eq!(cache.last_value("SEN-003"), next.disp_mm);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_waits_for_latency() {
        let cache = MeasurementCache::builder().seed(1).build();
        let start = tokio::time::Instant::now();

        cache.fetch("SEN-001").await;
        cache.fetch("SEN-001").await;

        assert!(start.elapsed() >= DEFAULT_FETCH_LATENCY * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_first_fetches_generate_once() {
        let cache = Arc::new(MeasurementCache::builder().seed(5).build());

        let a = tokio::spawn({
            let cache = cache.clone();
            async move { cache.fetch("SEN-001").await }
        });
        let b = tokio::spawn({
            let cache = cache.clone();
            async move { cache.fetch("SEN-001").await }
        });

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn fetch_response_carries_sensor_id() {
        let cache = instant_cache();
        let response = cache.fetch_response("SEN-003").await;
        assert_eq!(response.sensor_id, "SEN-003");
        assert_eq!(response.measurements.len(), 100);
    }

    #[tokio::test]
    async fn smaller_capacity_trims_backfill() {
        let cache = MeasurementCache::builder()
            .latency(Duration::ZERO)
            .capacity(10)
            .seed(2)
            .build();

        let series = cache.fetch("SEN-001").await;
        assert_eq!(series.len(), 10);

        cache.append("SEN-001");
        assert_eq!(cache.series("SEN-001").unwrap().len(), 10);
        assert_eq!(cache.series_len("SEN-001"), 10);
        assert_eq!(cache.series_len("SEN-002"), 0);
    }
}
