//! # dispwatch
//!
//! Core of a displacement-sensor dashboard: per-sensor measurement caching,
//! periodic live updates and threshold-based alarm status.
//!
//! Readings are synthetic. A generator backfills a series the first time a
//! sensor is fetched, and every live update appends one reading per sensor
//! while keeping each series bounded.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ┌───────────┐  advance   ┌───────────┐                      │
//! │  │ scheduler │───────────▶│ dashboard │◀── status_for / summary
//! │  │ (interval)│            │  (state)  │                      │
//! │  └───────────┘            └─────┬─────┘                      │
//! │                                 │ aggregate                  │
//! │                                 ▼                            │
//! │                           ┌───────────┐  miss  ┌───────────┐ │
//! │                           │   cache   │───────▶│ generator │ │
//! │                           └───────────┘        └───────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`generator`]**: Synthetic readings from a threshold and a seedable RNG
//! - **[`cache`]**: [`MeasurementCache`], one bounded series per sensor
//! - **[`aggregate`]**: Last values and appends across all known sensors
//! - **[`scheduler`]**: Background task firing an [`Advance`] target on a period
//! - **[`dashboard`]**: [`Dashboard`] presentation state and live update controls
//! - **[`config`]**: [`Settings`] loaded from TOML and the environment
//! - **[`export`]**: JSON export of the dashboard state
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use dispwatch::{Dashboard, MeasurementCache, SensorStatus};
//!
//! # tokio_test::block_on(async {
//! let cache = MeasurementCache::builder()
//!     .latency(Duration::ZERO)
//!     .seed(42)
//!     .build();
//! let dashboard = Arc::new(Dashboard::new(Arc::new(cache)));
//!
//! dashboard.initialize().await;
//! let sensor = dashboard.sensors().get("SEN-001").unwrap().clone();
//! let status = dashboard.status_for(&sensor);
//! assert!(matches!(status, SensorStatus::Ok | SensorStatus::Alarm));
//! # });
//! ```

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod generator;
pub mod scheduler;

pub use cache::{MeasurementCache, MeasurementCacheBuilder};
pub use config::Settings;
pub use dashboard::{Dashboard, DashboardState, DashboardSummary, SensorSummary};
pub use error::{DispwatchError, Result};
pub use generator::GeneratorParams;
pub use scheduler::{Advance, LiveHandle};

pub use dispwatch_types::{
    Measurement, MeasurementResponse, MeasurementSeries, Sensor, SensorCatalog, SensorStatus,
};
