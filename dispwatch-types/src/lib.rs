//! # dispwatch-types
//!
//! Core types for displacement sensor monitoring. This crate defines the
//! shared data model used by the dispwatch cache, scheduler and dashboard:
//! sensors with alarm thresholds, timestamped displacement readings, and the
//! bounded series that holds the most recent readings of one sensor.
//!
//! ## Features
//!
//! - `serde`: JSON/etc. serialization via serde. Timestamps serialize as
//!   ISO-8601 strings with millisecond precision (`2024-05-01T10:15:00.000Z`).
//!
//! ## Example
//!
//! ```rust
//! use dispwatch_types::{Measurement, MeasurementSeries, SensorCatalog, SensorStatus};
//! use chrono::{TimeZone, Utc};
//!
//! let catalog = SensorCatalog::default();
//! let sensor = catalog.get("SEN-002").unwrap();
//!
//! let mut series = MeasurementSeries::new(2);
//! let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
//! series.push(Measurement::new(t0, 1.5));
//! series.push(Measurement::new(t0, 1.8));
//! series.push(Measurement::new(t0, 2.4)); // evicts the oldest point
//!
//! assert_eq!(series.len(), 2);
//! assert_eq!(sensor.status_for(series.last().unwrap().disp_mm), SensorStatus::Alarm);
//! ```

mod measurement;
mod sensor;

pub use measurement::*;
pub use sensor::*;
