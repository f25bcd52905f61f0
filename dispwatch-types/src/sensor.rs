//! Sensors, their alarm status and the catalog of known sensors.

use std::fmt;

/// Threshold used for sensor ids that are not in the catalog.
pub const DEFAULT_THRESHOLD: f64 = 3.0;

/// A monitored physical point.
///
/// Reference data: the dashboard core never mutates sensors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sensor {
    pub id: String,
    pub name: String,
    pub location: String,
    /// Displacement (mm) above which the sensor is in alarm. Expected to be
    /// positive.
    pub threshold: f64,
}

impl Sensor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        location: impl Into<String>,
        threshold: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: location.into(),
            threshold,
        }
    }

    /// Status of this sensor for a given displacement reading.
    pub fn status_for(&self, disp_mm: f64) -> SensorStatus {
        SensorStatus::from_reading(disp_mm, self.threshold)
    }
}

/// Alarm status of a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum SensorStatus {
    Ok,
    Alarm,
}

impl SensorStatus {
    /// Alarm iff the reading is strictly above the threshold.
    pub fn from_reading(disp_mm: f64, threshold: f64) -> Self {
        if disp_mm > threshold {
            SensorStatus::Alarm
        } else {
            SensorStatus::Ok
        }
    }

    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            SensorStatus::Ok => "OK",
            SensorStatus::Alarm => "ALARM",
        }
    }
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// The fixed set of sensors the dashboard knows about.
///
/// Lookups for unknown ids fall back to `default_threshold` instead of
/// failing.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorCatalog {
    sensors: Vec<Sensor>,
    default_threshold: f64,
}

impl Default for SensorCatalog {
    fn default() -> Self {
        Self::new(builtin_sensors())
    }
}

impl SensorCatalog {
    /// Create a catalog; sensor order is preserved.
    pub fn new(sensors: Vec<Sensor>) -> Self {
        Self {
            sensors,
            default_threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Override the fallback threshold for unknown ids.
    pub fn with_default_threshold(mut self, threshold: f64) -> Self {
        self.default_threshold = threshold;
        self
    }

    pub fn get(&self, id: &str) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Threshold for `id`, or the default for unknown sensors.
    pub fn threshold_for(&self, id: &str) -> f64 {
        self.get(id).map_or(self.default_threshold, |s| s.threshold)
    }

    pub fn default_threshold(&self) -> f64 {
        self.default_threshold
    }

    /// Known sensor ids in catalog order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sensors.iter().map(|s| s.id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sensor> {
        self.sensors.iter()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

/// The three reference sensors.
pub fn builtin_sensors() -> Vec<Sensor> {
    vec![
        Sensor::new("SEN-001", "North Abutment", "Bridge A, pier 1", 3.5),
        Sensor::new("SEN-002", "Retaining Wall", "Cutting B, chainage 120", 2.0),
        Sensor::new("SEN-003", "Tunnel Portal", "Tunnel C, east portal", 4.0),
    ]
}
