//! Layered settings: optional TOML file, then `DISPWATCH_*` environment
//! variables.
//!
//! ```toml
//! update_interval_secs = 10
//! fetch_latency_ms = 400
//! seed = 42
//!
//! [[sensors]]
//! id = "SEN-001"
//! name = "North Abutment"
//! location = "Bridge A, pier 1"
//! threshold = 3.5
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use dispwatch_types::{builtin_sensors, Sensor, SensorCatalog, DEFAULT_THRESHOLD};

use crate::cache::MeasurementCache;
use crate::dashboard::Dashboard;
use crate::error::{DispwatchError, Result};
use crate::generator::GeneratorParams;

/// Environment variable prefix, e.g. `DISPWATCH_FETCH_LATENCY_MS`.
pub const ENV_PREFIX: &str = "DISPWATCH";

/// One day.
pub const MAX_UPDATE_INTERVAL_SECS: u64 = 86_400;
/// One minute.
pub const MAX_FETCH_LATENCY_MS: u64 = 60_000;
pub const MAX_WINDOW: usize = 10_000;
/// One day.
pub const MAX_STEP_MINUTES: i64 = 1_440;
/// One year.
pub const MAX_BACKFILL_HOURS: i64 = 8_760;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between live updates.
    pub update_interval_secs: u64,
    /// Simulated fetch latency in milliseconds.
    pub fetch_latency_ms: u64,
    /// Points generated and retained per sensor.
    pub window: usize,
    /// Minutes between consecutive readings.
    pub step_minutes: i64,
    /// Hours before now at which a backfilled series starts.
    pub backfill_hours: i64,
    pub spike_probability: f64,
    pub live_spike_probability: f64,
    /// Threshold for sensors missing from `sensors`.
    pub default_threshold: f64,
    /// Seed for reproducible readings; random when unset.
    pub seed: Option<u64>,
    pub sensors: Vec<Sensor>,
}

impl Default for Settings {
    fn default() -> Self {
        let params = GeneratorParams::default();
        Self {
            update_interval_secs: 10,
            fetch_latency_ms: 400,
            window: params.points,
            step_minutes: params.step.num_minutes(),
            backfill_hours: params.backfill.num_hours(),
            spike_probability: params.spike_probability,
            live_spike_probability: params.live_spike_probability,
            default_threshold: DEFAULT_THRESHOLD,
            seed: None,
            sensors: builtin_sensors(),
        }
    }
}

impl Settings {
    /// Load settings from an optional file and the environment, then
    /// validate them.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the dashboard cannot run with.
    pub fn validate(&self) -> Result<()> {
        check_range(
            "update_interval_secs",
            self.update_interval_secs,
            1,
            MAX_UPDATE_INTERVAL_SECS,
        )?;
        check_range("fetch_latency_ms", self.fetch_latency_ms, 0, MAX_FETCH_LATENCY_MS)?;
        check_range("window", self.window, 1, MAX_WINDOW)?;
        check_range("step_minutes", self.step_minutes, 1, MAX_STEP_MINUTES)?;
        check_range("backfill_hours", self.backfill_hours, 0, MAX_BACKFILL_HOURS)?;
        for (name, p) in [
            ("spike_probability", self.spike_probability),
            ("live_spike_probability", self.live_spike_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(invalid(format!("{name} must be within [0, 1], got {p}")));
            }
        }
        check_threshold("default_threshold", self.default_threshold)?;

        let mut seen = HashSet::new();
        for sensor in &self.sensors {
            if sensor.id.trim().is_empty() {
                return Err(invalid("sensor id must not be empty"));
            }
            if !seen.insert(sensor.id.as_str()) {
                return Err(invalid(format!("duplicate sensor id {}", sensor.id)));
            }
            check_threshold(&sensor.id, sensor.threshold)?;
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn fetch_latency(&self) -> Duration {
        Duration::from_millis(self.fetch_latency_ms)
    }

    pub fn generator_params(&self) -> GeneratorParams {
        GeneratorParams {
            points: self.window,
            step: chrono::Duration::minutes(self.step_minutes),
            backfill: chrono::Duration::hours(self.backfill_hours),
            spike_probability: self.spike_probability,
            live_spike_probability: self.live_spike_probability,
            ..GeneratorParams::default()
        }
    }

    pub fn catalog(&self) -> SensorCatalog {
        SensorCatalog::new(self.sensors.clone()).with_default_threshold(self.default_threshold)
    }

    pub fn build_cache(&self) -> MeasurementCache {
        let mut builder = MeasurementCache::builder()
            .catalog(self.catalog())
            .params(self.generator_params())
            .latency(self.fetch_latency())
            .capacity(self.window);
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        builder.build()
    }

    pub fn build_dashboard(&self) -> Arc<Dashboard> {
        Arc::new(Dashboard::with_interval(
            Arc::new(self.build_cache()),
            self.update_interval(),
        ))
    }
}

fn invalid(msg: impl Into<String>) -> DispwatchError {
    DispwatchError::InvalidSetting(msg.into())
}

fn check_range<T>(name: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        return Err(invalid(format!("{name} must be within [{min}, {max}], got {value}")));
    }
    Ok(())
}

fn check_threshold(name: &str, threshold: f64) -> Result<()> {
    if threshold.is_finite() && threshold > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name}: threshold must be positive, got {threshold}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn toml_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "{}", content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn defaults_are_ten_second_updates_over_100_points() {
        let settings = Settings::default();
        assert_eq!(settings.update_interval(), Duration::from_secs(10));
        assert_eq!(settings.fetch_latency(), Duration::from_millis(400));
        assert_eq!(settings.window, 100);
        assert_eq!(settings.step_minutes, 45);
        assert_eq!(settings.backfill_hours, 72);
        assert_eq!(settings.generator_params(), GeneratorParams::default());
        assert_eq!(settings.catalog(), SensorCatalog::default());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn load_reads_toml_file() {
        let file = toml_file(
            r#"
            update_interval_secs = 2
            fetch_latency_ms = 0
            seed = 99

            [[sensors]]
            id = "SEN-101"
            name = "Quay Wall"
            location = "Dock 4"
            threshold = 1.5
            "#,
        );

        let settings = Settings::load(Some(file.path())).unwrap();

        assert_eq!(settings.update_interval_secs, 2);
        assert_eq!(settings.fetch_latency_ms, 0);
        assert_eq!(settings.seed, Some(99));
        assert_eq!(settings.window, 100);
        assert_eq!(settings.sensors.len(), 1);
        assert_eq!(settings.catalog().threshold_for("SEN-101"), 1.5);
        assert_eq!(settings.catalog().threshold_for("SEN-001"), DEFAULT_THRESHOLD);
    }

    #[test]
    fn load_rejects_invalid_file() {
        let file = toml_file("update_interval_secs = 0\n");
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, DispwatchError::InvalidSetting(_)));
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/dispwatch.toml"))).unwrap_err();
        assert!(matches!(err, DispwatchError::Config(_)));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cases: Vec<Box<dyn Fn(&mut Settings)>> = vec![
            Box::new(|s: &mut Settings| s.window = 0),
            Box::new(|s: &mut Settings| s.step_minutes = 0),
            Box::new(|s: &mut Settings| s.spike_probability = 1.5),
            Box::new(|s: &mut Settings| s.live_spike_probability = -0.1),
            Box::new(|s: &mut Settings| s.default_threshold = f64::NAN),
            Box::new(|s: &mut Settings| s.sensors[0].threshold = 0.0),
            Box::new(|s: &mut Settings| s.sensors[1].id = "SEN-001".to_string()),
            Box::new(|s: &mut Settings| s.step_minutes = i64::MAX),
            Box::new(|s: &mut Settings| s.step_minutes = MAX_STEP_MINUTES + 1),
            Box::new(|s: &mut Settings| s.backfill_hours = i64::MAX),
            Box::new(|s: &mut Settings| s.backfill_hours = -1),
            Box::new(|s: &mut Settings| s.update_interval_secs = u64::MAX),
            Box::new(|s: &mut Settings| s.fetch_latency_ms = u64::MAX),
            Box::new(|s: &mut Settings| s.window = MAX_WINDOW + 1),
        ];

        for mutate in cases {
            let mut settings = Settings::default();
            mutate(&mut settings);
            assert!(settings.validate().is_err(), "{:?}", settings);
        }
    }

    #[test]
    fn upper_limits_are_accepted_and_usable() {
        let settings = Settings {
            update_interval_secs: MAX_UPDATE_INTERVAL_SECS,
            fetch_latency_ms: MAX_FETCH_LATENCY_MS,
            window: MAX_WINDOW,
            step_minutes: MAX_STEP_MINUTES,
            backfill_hours: MAX_BACKFILL_HOURS,
            ..Settings::default()
        };

        assert!(settings.validate().is_ok());
        let params = settings.generator_params();
        assert_eq!(params.step, chrono::Duration::days(1));
        assert_eq!(params.backfill, chrono::Duration::days(365));
        assert_eq!(settings.update_interval(), Duration::from_secs(86_400));
    }

    #[test]
    fn load_rejects_step_beyond_one_day() {
        let file = toml_file("step_minutes = 9223372036854775807\n");
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, DispwatchError::InvalidSetting(_)));
    }

    #[tokio::test]
    async fn build_dashboard_uses_settings() {
        let settings = Settings {
            fetch_latency_ms: 0,
            update_interval_secs: 3,
            window: 12,
            seed: Some(4),
            ..Settings::default()
        };

        let dashboard = settings.build_dashboard();
        dashboard.initialize().await;

        assert_eq!(dashboard.interval(), Duration::from_secs(3));
        assert_eq!(dashboard.series_for("SEN-001").unwrap().len(), 12);
    }
}
