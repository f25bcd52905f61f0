//! Presentation state of the dashboard.
//!
//! The dashboard keeps its own copy of each sensor's last value and the
//! readings appended by the most recent update. It reads from the shared
//! [`MeasurementCache`] but never owns the series.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use dispwatch_types::{Measurement, MeasurementSeries, Sensor, SensorCatalog, SensorStatus};

use crate::aggregate;
use crate::cache::MeasurementCache;
use crate::scheduler::{self, Advance, LiveHandle};

/// Default period between live updates.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// Snapshot of the values shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    /// Last displacement per sensor.
    pub last_values: BTreeMap<String, f64>,
    /// Readings appended by the most recent update.
    pub latest_measurements: BTreeMap<String, Measurement>,
    /// Number of updates applied so far.
    pub revision: u64,
}

/// Dashboard state plus the live update controls.
///
/// Construct it once, share it through an [`Arc`], and drop it at shutdown;
/// dropping stops any live updates.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use dispwatch::{Dashboard, MeasurementCache};
///
/// # tokio_test::block_on(async {
/// let cache = MeasurementCache::builder().latency(Duration::ZERO).seed(3).build();
/// let dashboard = Arc::new(Dashboard::new(Arc::new(cache)));
///
/// dashboard.initialize().await;
/// dashboard.trigger_manual_update();
///
/// assert_eq!(dashboard.revision(), 1);
/// assert_eq!(dashboard.latest_measurements().len(), 3);
/// # });
/// ```
pub struct Dashboard {
    cache: Arc<MeasurementCache>,
    state: RwLock<DashboardState>,
    live: Mutex<Option<LiveHandle>>,
    interval: Duration,
    revision_tx: watch::Sender<u64>,
}

impl Dashboard {
    /// Create a dashboard over `cache` with the default 10 second period.
    pub fn new(cache: Arc<MeasurementCache>) -> Self {
        Self::with_interval(cache, DEFAULT_UPDATE_INTERVAL)
    }

    pub fn with_interval(cache: Arc<MeasurementCache>, interval: Duration) -> Self {
        let (revision_tx, _) = watch::channel(0);
        Self {
            cache,
            state: RwLock::new(DashboardState::default()),
            live: Mutex::new(None),
            interval,
            revision_tx,
        }
    }

    pub fn cache(&self) -> &Arc<MeasurementCache> {
        &self.cache
    }

    pub fn sensors(&self) -> &SensorCatalog {
        self.cache.catalog()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Load the last value of every known sensor, fetching as needed.
    pub async fn initialize(&self) {
        let values = aggregate::all_last_values(&self.cache).await;
        info!(sensors = values.len(), "dashboard initialized");
        self.state.write().last_values = values;
    }

    /// Apply one update: append a reading to every cached sensor and
    /// refresh the affected last values.
    ///
    /// Returns the appended readings.
    pub fn apply_update(&self) -> BTreeMap<String, Measurement> {
        let appended = aggregate::append_to_all(&self.cache);

        let revision = {
            let mut state = self.state.write();
            for id in appended.keys() {
                let value = self.cache.last_value(id);
                state.last_values.insert(id.clone(), value);
            }
            state.latest_measurements = appended.clone();
            state.revision += 1;
            state.revision
        };

        for (id, m) in &appended {
            let threshold = self.cache.catalog().threshold_for(id);
            if m.disp_mm > threshold {
                warn!(sensor = %id, disp_mm = m.disp_mm, threshold, "sensor in alarm");
            }
        }
        info!(revision, sensors = appended.len(), "applied live update");

        self.revision_tx.send_replace(revision);
        appended
    }

    /// Run one update immediately, whether or not live updates are on.
    ///
    /// The live schedule is left untouched.
    pub fn trigger_manual_update(&self) -> BTreeMap<String, Measurement> {
        debug!("manual update triggered");
        self.apply_update()
    }

    /// Start live updates.
    ///
    /// Returns `false` if they were already running. Must be called from
    /// within a tokio runtime.
    pub fn start_live_updates(self: &Arc<Self>) -> bool {
        let mut live = self.live.lock();
        if live.is_some() {
            return false;
        }
        *live = Some(scheduler::spawn_live_updates(
            Arc::downgrade(self),
            self.interval,
        ));
        info!(interval = ?self.interval, "live updates started");
        true
    }

    /// Stop live updates.
    ///
    /// Returns `false` if they were not running.
    pub fn stop_live_updates(&self) -> bool {
        let Some(handle) = self.live.lock().take() else {
            return false;
        };
        handle.stop();
        info!("live updates stopped");
        true
    }

    pub fn is_live(&self) -> bool {
        self.live.lock().is_some()
    }

    /// Subscribe to update notifications; the value is the revision.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }

    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    /// Status of `sensor` given its last value. No value counts as OK.
    pub fn status_for(&self, sensor: &Sensor) -> SensorStatus {
        status_of(self.state.read().last_values.get(&sensor.id), sensor.threshold)
    }

    /// Status by id; unknown sensors use the default threshold.
    pub fn status_for_id(&self, sensor_id: &str) -> SensorStatus {
        let threshold = self.sensors().threshold_for(sensor_id);
        status_of(self.state.read().last_values.get(sensor_id), threshold)
    }

    /// Last value shown for a sensor, or 0 if none has been recorded.
    pub fn last_value_for(&self, sensor_id: &str) -> f64 {
        self.state
            .read()
            .last_values
            .get(sensor_id)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn last_values(&self) -> BTreeMap<String, f64> {
        self.state.read().last_values.clone()
    }

    pub fn latest_measurements(&self) -> BTreeMap<String, Measurement> {
        self.state.read().latest_measurements.clone()
    }

    pub fn state(&self) -> DashboardState {
        self.state.read().clone()
    }

    /// The cached series for a sensor, for charting.
    pub fn series_for(&self, sensor_id: &str) -> Option<MeasurementSeries> {
        self.cache.series(sensor_id)
    }

    /// Per-sensor rows with status counts.
    pub fn summary(&self) -> DashboardSummary {
        let state = self.state.read();
        let sensors: Vec<SensorSummary> = self
            .sensors()
            .iter()
            .map(|sensor| {
                let last = state.last_values.get(&sensor.id);
                SensorSummary {
                    id: sensor.id.clone(),
                    name: sensor.name.clone(),
                    location: sensor.location.clone(),
                    threshold: sensor.threshold,
                    last_value: last.copied().unwrap_or(0.0),
                    status: status_of(last, sensor.threshold),
                    points: self.cache.series_len(&sensor.id),
                }
            })
            .collect();

        let alarm = sensors.iter().filter(|s| s.status == SensorStatus::Alarm).count();
        DashboardSummary {
            ok: sensors.len() - alarm,
            alarm,
            live: self.is_live(),
            revision: state.revision,
            sensors,
        }
    }
}

fn status_of(last_value: Option<&f64>, threshold: f64) -> SensorStatus {
    match last_value {
        Some(&value) => SensorStatus::from_reading(value, threshold),
        None => SensorStatus::Ok,
    }
}

impl Advance for Dashboard {
    fn advance(&self) {
        self.apply_update();
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        if let Some(handle) = self.live.get_mut().take() {
            handle.stop();
        }
    }
}

impl fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dashboard")
            .field("cache", &self.cache)
            .field("interval", &self.interval)
            .field("live", &self.is_live())
            .field("revision", &self.revision())
            .finish()
    }
}

/// One sensor row of the dashboard summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSummary {
    pub id: String,
    pub name: String,
    pub location: String,
    pub threshold: f64,
    pub last_value: f64,
    pub status: SensorStatus,
    /// Points currently cached for the sensor.
    pub points: usize,
}

/// Status of all sensors at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub sensors: Vec<SensorSummary>,
    pub ok: usize,
    pub alarm: usize,
    pub live: bool,
    pub revision: u64,
}

impl fmt::Display for DashboardSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ok | {} alarm | revision {} | live {}",
            self.ok,
            self.alarm,
            self.revision,
            if self.live { "on" } else { "off" }
        )?;
        for s in &self.sensors {
            writeln!(
                f,
                "  {:<8} {:<16} {:>7.2} mm / {:>5.2} mm  {:<5}  {}",
                s.id,
                s.name,
                s.last_value,
                s.threshold,
                s.status.symbol(),
                s.location
            )?;
        }
        Ok(())
    }
}
