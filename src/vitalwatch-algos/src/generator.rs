use std::f64::consts::{PI, TAU};

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;
use vitalwatch_types::{HealthRecord, HealthSeries, Metric};

use crate::{
    AnalysisError, Result,
    config::{validate_probability, validate_span},
};

/// Synthetic wearable telemetry.
///
/// Every metric is a circadian base curve plus gaussian noise. Metrics are
/// chained rather than drawn independently: activity drives heart rate,
/// heart rate drives stress, temperature and oxygen, and the previous
/// record's stress drags down the current sleep quality. With probability
/// `anomaly_probability` a record is overwritten with an extreme but
/// physiologically possible reading.
pub struct SignalGenerator {
    rng: StdRng,
    anomaly_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnomalyKind {
    RestingTachycardia,
    Bradycardia,
    Desaturation,
    Fever,
    AcuteStress,
}

impl AnomalyKind {
    const ALL: [AnomalyKind; 5] = [
        AnomalyKind::RestingTachycardia,
        AnomalyKind::Bradycardia,
        AnomalyKind::Desaturation,
        AnomalyKind::Fever,
        AnomalyKind::AcuteStress,
    ];
}

impl SignalGenerator {
    pub const DEFAULT_ANOMALY_PROBABILITY: f64 = 0.05;

    /// Seeded generators are fully reproducible; without a seed the OS
    /// entropy source is used.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            rng,
            anomaly_probability: Self::DEFAULT_ANOMALY_PROBABILITY,
        }
    }

    pub fn with_anomaly_probability(mut self, probability: f64) -> Result<Self> {
        validate_probability(probability)?;
        self.anomaly_probability = probability;
        Ok(self)
    }

    pub fn generate(
        &mut self,
        start: NaiveDateTime,
        num_days: i64,
        interval: TimeDelta,
    ) -> Result<HealthSeries> {
        validate_span(num_days, interval)?;

        let span_ms = TimeDelta::days(num_days).num_milliseconds();
        let count = (span_ms / interval.num_milliseconds()) as usize;

        let mut series = HealthSeries::with_capacity(count);
        let mut previous = None;
        let mut timestamp = start;
        for _ in 0..count {
            let record = self.next_record(timestamp, previous.as_ref());
            series.push(record);
            previous = Some(record);
            timestamp += interval;
        }

        debug!(
            "generated {} records from {} every {}s ({} injected)",
            series.len(),
            start,
            interval.num_seconds(),
            series.iter().filter(|r| r.is_injected_anomaly).count()
        );
        Ok(series)
    }

    /// Appends `count` records after the last one, at the same spacing the
    /// caller polls with. Existing records are left untouched.
    pub fn extend(
        &mut self,
        series: &mut HealthSeries,
        count: usize,
        interval: TimeDelta,
    ) -> Result<()> {
        if interval < TimeDelta::seconds(1) {
            return Err(AnalysisError::invalid("interval must be at least one second"));
        }
        let Some(mut previous) = series.last().copied() else {
            return Err(AnalysisError::invalid("cannot extend an empty series"));
        };

        for _ in 0..count {
            let record = self.next_record(previous.timestamp + interval, Some(&previous));
            series.push(record);
            previous = record;
        }
        Ok(())
    }

    fn next_record(
        &mut self,
        timestamp: NaiveDateTime,
        previous: Option<&HealthRecord>,
    ) -> HealthRecord {
        let hour = f64::from(timestamp.num_seconds_from_midnight()) / 3600.0;

        let activity_level = self.activity(hour);
        let heart_rate = bounded(
            Metric::HeartRate,
            66.0 + 8.0 * circadian(hour, 9.0) + activity_level / 80.0 + self.noise(3.0),
        );
        let stress_level = bounded(
            Metric::StressLevel,
            35.0 + 12.0 * circadian(hour, 10.0) + 0.4 * (heart_rate - 66.0) + self.noise(6.0),
        );

        let prior_stress = previous.map_or(stress_level, |p| p.stress_level);
        let sleep_quality = bounded(
            Metric::SleepQuality,
            72.0 + 12.0 * (TAU * (hour - 3.0) / 24.0).cos() - 0.4 * (prior_stress - 35.0)
                + self.noise(5.0),
        );

        let blood_oxygen = bounded(
            Metric::BloodOxygen,
            97.6 - 0.03 * (heart_rate - 66.0).max(0.0) + self.noise(0.6),
        );
        let body_temperature = bounded(
            Metric::BodyTemperature,
            36.65 + 0.3 * circadian(hour, 11.0) + 0.01 * (heart_rate - 66.0) + self.noise(0.12),
        );

        let mut record = HealthRecord {
            timestamp,
            heart_rate,
            blood_oxygen,
            activity_level,
            sleep_quality,
            stress_level,
            body_temperature,
            is_injected_anomaly: false,
        };

        if self.rng.random_bool(self.anomaly_probability) {
            let kind = AnomalyKind::ALL[self.rng.random_range(0..AnomalyKind::ALL.len())];
            self.inject(&mut record, kind);
        }

        record
    }

    /// Near zero overnight, one hump across the waking day peaking mid-afternoon.
    fn activity(&mut self, hour: f64) -> f64 {
        const WAKE: f64 = 6.5;
        const SLEEP: f64 = 22.5;

        let value = if (WAKE..SLEEP).contains(&hour) {
            150.0 + 750.0 * (PI * (hour - WAKE) / (SLEEP - WAKE)).sin() + self.noise(100.0)
        } else {
            20.0 + self.noise(15.0)
        };
        bounded(Metric::ActivityLevel, value)
    }

    fn inject(&mut self, record: &mut HealthRecord, kind: AnomalyKind) {
        match kind {
            AnomalyKind::RestingTachycardia => {
                record.heart_rate = self.rng.random_range(150.0..=175.0);
                record.activity_level = self.rng.random_range(0.0..=60.0);
            }
            AnomalyKind::Bradycardia => {
                record.heart_rate = self.rng.random_range(40.0..=46.0);
            }
            AnomalyKind::Desaturation => {
                record.blood_oxygen = self.rng.random_range(85.0..=89.0);
            }
            AnomalyKind::Fever => {
                record.body_temperature = self.rng.random_range(38.4..=39.0);
                record.heart_rate = bounded(Metric::HeartRate, record.heart_rate + 20.0);
            }
            AnomalyKind::AcuteStress => {
                record.stress_level = self.rng.random_range(92.0..=100.0);
                record.sleep_quality = self.rng.random_range(0.0..=15.0);
            }
        }
        record.is_injected_anomaly = true;
        trace!("injected {kind:?} at {}", record.timestamp);
    }

    fn noise(&mut self, std_dev: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        z * std_dev
    }
}

/// Unit sinusoid over 24h, rising through zero at `rising_hour` and peaking
/// six hours later.
fn circadian(hour: f64, rising_hour: f64) -> f64 {
    (TAU * (hour - rising_hour) / 24.0).sin()
}

fn bounded(metric: Metric, value: f64) -> f64 {
    let (low, high) = metric.bounds();
    value.clamp(low, high)
}
