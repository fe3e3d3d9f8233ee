use std::ops::Deref;

use chrono::NaiveDateTime;

use crate::Metric;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub timestamp: NaiveDateTime,
    pub heart_rate: f64,
    pub blood_oxygen: f64,
    pub activity_level: f64,
    pub sleep_quality: f64,
    pub stress_level: f64,
    pub body_temperature: f64,
    /// Ground truth from the generator. Never used as a detector feature.
    pub is_injected_anomaly: bool,
}

impl HealthRecord {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::HeartRate => self.heart_rate,
            Metric::BloodOxygen => self.blood_oxygen,
            Metric::ActivityLevel => self.activity_level,
            Metric::SleepQuality => self.sleep_quality,
            Metric::StressLevel => self.stress_level,
            Metric::BodyTemperature => self.body_temperature,
        }
    }

    /// Raw metric values in [`Metric::ALL`] order.
    pub fn features(&self) -> [f64; Metric::COUNT] {
        Metric::ALL.map(|metric| self.get(metric))
    }

    /// First metric found outside its physiological bounds, if any.
    pub fn out_of_bounds(&self) -> Option<Metric> {
        Metric::ALL
            .into_iter()
            .find(|&metric| !metric.contains(self.get(metric)))
    }
}

/// Chronologically ordered records of one analysis cycle.
///
/// Records are appended at the end and dropped from the front; nothing hands
/// out mutable access to a record already in the series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HealthSeries(Vec<HealthRecord>);

impl HealthSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, record: HealthRecord) {
        self.0.push(record);
    }

    pub fn into_records(self) -> Vec<HealthRecord> {
        self.0
    }

    /// Drops the oldest records so at most `count` remain.
    pub fn retain_last(&mut self, count: usize) {
        let excess = self.0.len().saturating_sub(count);
        self.0.drain(..excess);
    }

    pub fn values(&self, metric: Metric) -> Vec<f64> {
        self.0.iter().map(|r| r.get(metric)).collect()
    }
}

/// Index of the first record whose timestamp is not strictly later than the
/// one before it.
pub fn out_of_order(records: &[HealthRecord]) -> Option<usize> {
    records
        .windows(2)
        .position(|w| w[0].timestamp >= w[1].timestamp)
        .map(|i| i + 1)
}

impl Deref for HealthSeries {
    type Target = [HealthRecord];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<HealthRecord>> for HealthSeries {
    fn from(records: Vec<HealthRecord>) -> Self {
        Self(records)
    }
}

impl FromIterator<HealthRecord> for HealthSeries {
    fn from_iter<T: IntoIterator<Item = HealthRecord>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
