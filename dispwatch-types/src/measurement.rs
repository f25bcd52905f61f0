//! Measurements and bounded measurement series.

use std::collections::VecDeque;

use chrono::{DateTime, SecondsFormat, Utc};

/// Default number of points retained per sensor.
pub const DEFAULT_SERIES_CAPACITY: usize = 100;

/// One timestamped displacement reading.
///
/// Displacement is expressed in millimetres and is already rounded to two
/// decimal places by whoever produced it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Measurement {
    /// When the reading was taken.
    #[cfg_attr(feature = "serde", serde(with = "iso_millis"))]
    pub timestamp: DateTime<Utc>,
    /// Displacement in millimetres.
    pub disp_mm: f64,
}

impl Measurement {
    /// Create a new measurement.
    pub fn new(timestamp: DateTime<Utc>, disp_mm: f64) -> Self {
        Self { timestamp, disp_mm }
    }

    /// The timestamp as an ISO-8601 string with millisecond precision.
    pub fn iso_timestamp(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Ordered readings for a single sensor, oldest first.
///
/// The series never holds more than `capacity` points; pushing beyond the
/// cap evicts from the front. Deserialized series go through the same
/// trimming as [`MeasurementSeries::from_measurements`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "SeriesRepr"))]
pub struct MeasurementSeries {
    points: VecDeque<Measurement>,
    capacity: usize,
}

impl Default for MeasurementSeries {
    fn default() -> Self {
        Self::new(DEFAULT_SERIES_CAPACITY)
    }
}

impl MeasurementSeries {
    /// Create an empty series holding at most `capacity` points.
    ///
    /// A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Build a series from readings in timestamp order.
    ///
    /// If there are more readings than `capacity`, only the newest are kept.
    pub fn from_measurements<I>(measurements: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = Measurement>,
    {
        let mut series = Self::new(capacity);
        for m in measurements {
            series.push(m);
        }
        series
    }

    /// Append a reading, evicting the oldest ones while over capacity.
    ///
    /// Returns the number of evicted points.
    pub fn push(&mut self, measurement: Measurement) -> usize {
        self.points.push_back(measurement);
        let mut evicted = 0;
        while self.points.len() > self.capacity {
            self.points.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// The most recent reading.
    pub fn last(&self) -> Option<&Measurement> {
        self.points.back()
    }

    /// The oldest retained reading.
    pub fn first(&self) -> Option<&Measurement> {
        self.points.front()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate readings oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        self.points.iter()
    }

    /// Copy the readings out, oldest first.
    pub fn to_vec(&self) -> Vec<Measurement> {
        self.points.iter().cloned().collect()
    }

    /// `(timestamp, value)` pairs in order, the shape chart consumers expect.
    pub fn points(&self) -> Vec<(DateTime<Utc>, f64)> {
        self.points.iter().map(|m| (m.timestamp, m.disp_mm)).collect()
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct SeriesRepr {
    points: Vec<Measurement>,
    capacity: usize,
}

#[cfg(feature = "serde")]
impl From<SeriesRepr> for MeasurementSeries {
    fn from(repr: SeriesRepr) -> Self {
        Self::from_measurements(repr.points, repr.capacity)
    }
}

/// Readings for one sensor as returned by a fetch.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MeasurementResponse {
    pub sensor_id: String,
    pub measurements: Vec<Measurement>,
}

#[cfg(feature = "serde")]
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
