//! Queries across all known sensors.

use std::collections::BTreeMap;

use dispwatch_types::Measurement;

use crate::cache::MeasurementCache;

/// Last value of every catalog sensor, fetching any that are not cached yet.
///
/// Sensors are fetched one after another; each read happens after its own
/// fetch completes.
pub async fn all_last_values(cache: &MeasurementCache) -> BTreeMap<String, f64> {
    let ids: Vec<String> = cache.catalog().ids().map(str::to_string).collect();
    let mut values = BTreeMap::new();

    for id in ids {
        cache.fetch(&id).await;
        let value = cache.last_value(&id);
        values.insert(id, value);
    }

    values
}

/// Append one reading to every catalog sensor.
///
/// Sensors without a cached series are left out of the result.
pub fn append_to_all(cache: &MeasurementCache) -> BTreeMap<String, Measurement> {
    cache
        .catalog()
        .ids()
        .filter_map(|id| cache.append(id).map(|m| (id.to_string(), m)))
        .collect()
}
