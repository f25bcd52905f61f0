//! JSON export of the current dashboard state.

use std::io::Write;
use std::path::Path;

use serde_json::{json, Map, Value};

use crate::dashboard::Dashboard;
use crate::error::Result;

/// Build the export document: summary counts, per-sensor status with the
/// cached series, and the readings from the latest update.
pub fn build_export(dashboard: &Dashboard) -> Result<Value> {
    let summary = dashboard.summary();
    let mut export = Map::new();

    export.insert(
        "summary".to_string(),
        json!({
            "total_sensors": summary.sensors.len(),
            "ok": summary.ok,
            "alarm": summary.alarm,
            "revision": summary.revision,
            "live": summary.live,
        }),
    );

    let sensors = summary
        .sensors
        .iter()
        .map(|row| -> Result<Value> {
            let mut sensor = serde_json::to_value(row)?;
            let measurements = match dashboard.series_for(&row.id) {
                Some(series) => serde_json::to_value(series.to_vec())?,
                None => Value::Array(Vec::new()),
            };
            if let Value::Object(ref mut fields) = sensor {
                fields.insert("measurements".to_string(), measurements);
            }
            Ok(sensor)
        })
        .collect::<Result<Vec<Value>>>()?;
    export.insert("sensors".to_string(), Value::Array(sensors));

    export.insert(
        "latest_measurements".to_string(),
        serde_json::to_value(dashboard.latest_measurements())?,
    );

    Ok(Value::Object(export))
}

/// Write the export document to `path` as pretty-printed JSON.
pub fn write_export(dashboard: &Dashboard, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&build_export(dashboard)?)?;
    let mut file = std::fs::File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}
