//! Synthetic displacement readings.
//!
//! Stands in for a device API: backfills a series for a sensor and produces
//! the next reading of an existing series. All functions are pure given the
//! random source, so a seeded RNG gives reproducible output.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use dispwatch_types::{Measurement, DEFAULT_SERIES_CAPACITY};

/// Constants driving the synthetic readings.
///
/// Each value is `base * t + U(0, variation * t) + spike`, where `t` is the
/// sensor threshold and `spike` is `spike_factor * t` with the given
/// probability.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorParams {
    /// Number of points in a backfilled series.
    pub points: usize,
    /// Spacing between consecutive readings.
    pub step: Duration,
    /// How far before "now" the backfilled series starts.
    pub backfill: Duration,
    pub base_factor: f64,
    pub variation_factor: f64,
    pub spike_factor: f64,
    /// Spike probability while backfilling.
    pub spike_probability: f64,
    /// Spike probability for live appends.
    pub live_spike_probability: f64,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            points: DEFAULT_SERIES_CAPACITY,
            step: Duration::minutes(45),
            backfill: Duration::days(3),
            base_factor: 0.7,
            variation_factor: 0.8,
            spike_factor: 0.4,
            spike_probability: 0.1,
            live_spike_probability: 0.08,
        }
    }
}

impl GeneratorParams {
    /// Lowest value a reading can take for `threshold`.
    pub fn min_value(&self, threshold: f64) -> f64 {
        self.base_factor * threshold
    }

    /// Highest value a reading can take for `threshold`.
    pub fn max_value(&self, threshold: f64) -> f64 {
        (self.base_factor + self.variation_factor + self.spike_factor) * threshold
    }
}

/// Backfill a series for a sensor with the given threshold.
///
/// Produces `params.points` readings spaced `params.step` apart, the first
/// one `params.backfill` before `now`.
pub fn generate_series<R>(
    threshold: f64,
    now: DateTime<Utc>,
    params: &GeneratorParams,
    rng: &mut R,
) -> Vec<Measurement>
where
    R: Rng + ?Sized,
{
    let start = now - params.backfill;
    (0..params.points)
        .map(|i| {
            let timestamp = start + params.step * i as i32;
            let value = synthetic_value(threshold, params.spike_probability, params, rng);
            Measurement::new(timestamp, value)
        })
        .collect()
}

/// The reading that follows `last`, one step later.
pub fn next_measurement<R>(
    last: &Measurement,
    threshold: f64,
    params: &GeneratorParams,
    rng: &mut R,
) -> Measurement
where
    R: Rng + ?Sized,
{
    let value = synthetic_value(threshold, params.live_spike_probability, params, rng);
    Measurement::new(last.timestamp + params.step, value)
}

/// A single synthetic reading, rounded to two decimals.
pub fn synthetic_value<R>(
    threshold: f64,
    spike_probability: f64,
    params: &GeneratorParams,
    rng: &mut R,
) -> f64
where
    R: Rng + ?Sized,
{
    let base = threshold * params.base_factor;
    let variation = rng.gen::<f64>() * threshold * params.variation_factor;
    let spike = if rng.gen::<f64>() < spike_probability {
        threshold * params.spike_factor
    } else {
        0.0
    };
    round2(base + variation + spike)
}

/// Round half away from zero to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 4, 12, 0, 0).unwrap()
    }

    fn is_two_decimals(v: f64) -> bool {
        ((v * 100.0).round() - v * 100.0).abs() < 1e-6
    }

    #[test]
    fn generates_exactly_one_hundred_points_in_range() {
        let params = GeneratorParams::default();
        let mut rng = StdRng::seed_from_u64(7);

        for threshold in [0.5, 2.0, 3.5, 4.0, 10.0] {
            let series = generate_series(threshold, now(), &params, &mut rng);
            assert_eq!(series.len(), 100);
            for m in &series {
                assert!(m.disp_mm >= 0.7 * threshold - 1e-9, "{} too low", m.disp_mm);
                assert!(m.disp_mm <= 1.9 * threshold + 1e-9, "{} too high", m.disp_mm);
                assert!(is_two_decimals(m.disp_mm));
            }
        }
    }

    #[test]
    fn timestamps_step_by_forty_five_minutes() {
        let params = GeneratorParams::default();
        let mut rng = StdRng::seed_from_u64(1);
        let series = generate_series(3.0, now(), &params, &mut rng);

        assert_eq!(series[0].timestamp, now() - Duration::days(3));
        for pair in series.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::minutes(45));
        }
    }

    #[test]
    fn same_seed_same_series() {
        let params = GeneratorParams::default();
        let a = generate_series(2.0, now(), &params, &mut StdRng::seed_from_u64(42));
        let b = generate_series(2.0, now(), &params, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn spikes_follow_probability() {
        let params = GeneratorParams {
            variation_factor: 0.0,
            ..GeneratorParams::default()
        };
        let mut rng = StdRng::seed_from_u64(3);

        let never = synthetic_value(2.0, 0.0, &params, &mut rng);
        assert_eq!(never, 1.4);

        let always = synthetic_value(2.0, 1.0, &params, &mut rng);
        assert_eq!(always, 2.2);
    }

    #[test]
    fn next_measurement_advances_one_step() {
        let params = GeneratorParams::default();
        let mut rng = StdRng::seed_from_u64(9);
        let last = Measurement::new(now(), 1.0);

        let next = next_measurement(&last, 3.5, &params, &mut rng);

        assert_eq!(next.timestamp, now() + Duration::minutes(45));
        assert!(next.disp_mm >= params.min_value(3.5) - 1e-9);
        assert!(next.disp_mm <= params.max_value(3.5) + 1e-9);
    }

    #[test]
    fn round2_rounds_half_away_from_zero() {
        assert_eq!(round2(1.005_000_1), 1.01);
        assert_eq!(round2(2.344), 2.34);
        assert_eq!(round2(2.346), 2.35);
    }
}
