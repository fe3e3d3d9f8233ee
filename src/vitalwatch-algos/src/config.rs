//! Per-metric configuration shared by every stage of the pipeline.
//!
//! Ideal bands, weights and detector knobs are defined here and nowhere else.
//! Every default is illustrative, not medical guidance.

use std::str::FromStr;

use chrono::TimeDelta;
use vitalwatch_types::Metric;

use crate::{AnalysisError, Result};

/// Scoring band of one metric: 100 inside `[ideal_low, ideal_high]`,
/// falling linearly to 0 at `floor` and `ceiling`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricBand {
    pub floor: f64,
    pub ideal_low: f64,
    pub ideal_high: f64,
    pub ceiling: f64,
}

impl MetricBand {
    pub const fn new(floor: f64, ideal_low: f64, ideal_high: f64, ceiling: f64) -> Self {
        Self {
            floor,
            ideal_low,
            ideal_high,
            ceiling,
        }
    }

    fn validate(&self, metric: Metric) -> Result<()> {
        let values = [self.floor, self.ideal_low, self.ideal_high, self.ceiling];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::invalid(format!(
                "band for {metric} contains a non-finite value"
            )));
        }
        if !values.is_sorted() {
            return Err(AnalysisError::invalid(format!(
                "band for {metric} must satisfy floor <= ideal_low <= ideal_high <= ceiling"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricBands {
    pub heart_rate: MetricBand,
    pub blood_oxygen: MetricBand,
    pub activity_level: MetricBand,
    pub sleep_quality: MetricBand,
    pub stress_level: MetricBand,
    pub body_temperature: MetricBand,
}

impl Default for MetricBands {
    fn default() -> Self {
        Self {
            heart_rate: MetricBand::new(40.0, 60.0, 80.0, 180.0),
            blood_oxygen: MetricBand::new(85.0, 95.0, 100.0, 100.0),
            activity_level: MetricBand::new(0.0, 1_000.0, 10_000.0, 10_000.0),
            sleep_quality: MetricBand::new(0.0, 70.0, 100.0, 100.0),
            stress_level: MetricBand::new(0.0, 0.0, 30.0, 100.0),
            body_temperature: MetricBand::new(35.5, 36.1, 37.2, 39.0),
        }
    }
}

impl MetricBands {
    pub fn get(&self, metric: Metric) -> &MetricBand {
        match metric {
            Metric::HeartRate => &self.heart_rate,
            Metric::BloodOxygen => &self.blood_oxygen,
            Metric::ActivityLevel => &self.activity_level,
            Metric::SleepQuality => &self.sleep_quality,
            Metric::StressLevel => &self.stress_level,
            Metric::BodyTemperature => &self.body_temperature,
        }
    }

    pub fn validate(&self) -> Result<()> {
        Metric::ALL
            .into_iter()
            .try_for_each(|metric| self.get(metric).validate(metric))
    }
}

/// Weight of each sub-score in the overall score. Metrics missing from a
/// deserialised mapping weigh 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    #[serde(default)]
    pub heart_rate: f64,
    #[serde(default)]
    pub blood_oxygen: f64,
    #[serde(default)]
    pub activity_level: f64,
    #[serde(default)]
    pub sleep_quality: f64,
    #[serde(default)]
    pub stress_level: f64,
    #[serde(default)]
    pub body_temperature: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            heart_rate: 0.20,
            blood_oxygen: 0.20,
            activity_level: 0.15,
            sleep_quality: 0.20,
            stress_level: 0.15,
            body_temperature: 0.10,
        }
    }
}

impl ScoringWeights {
    pub const SUM_TOLERANCE: f64 = 1e-6;

    pub fn zero() -> Self {
        Self {
            heart_rate: 0.0,
            blood_oxygen: 0.0,
            activity_level: 0.0,
            sleep_quality: 0.0,
            stress_level: 0.0,
            body_temperature: 0.0,
        }
    }

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

    pub fn set(&mut self, metric: Metric, weight: f64) {
        let slot = match metric {
            Metric::HeartRate => &mut self.heart_rate,
            Metric::BloodOxygen => &mut self.blood_oxygen,
            Metric::ActivityLevel => &mut self.activity_level,
            Metric::SleepQuality => &mut self.sleep_quality,
            Metric::StressLevel => &mut self.stress_level,
            Metric::BodyTemperature => &mut self.body_temperature,
        };
        *slot = weight;
    }

    pub fn sum(&self) -> f64 {
        Metric::ALL.iter().map(|&m| self.get(m)).sum()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(metric) = Metric::ALL
            .into_iter()
            .find(|&m| !self.get(m).is_finite() || self.get(m) < 0.0)
        {
            return Err(AnalysisError::invalid(format!(
                "weight for {metric} must be a finite, non-negative number"
            )));
        }

        let sum = self.sum();
        if (sum - 1.0).abs() > Self::SUM_TOLERANCE {
            return Err(AnalysisError::invalid(format!(
                "weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }

    fn parse_metric(name: &str) -> Result<Metric> {
        match name {
            "hr" => Ok(Metric::HeartRate),
            "spo2" => Ok(Metric::BloodOxygen),
            "activity" | "steps" => Ok(Metric::ActivityLevel),
            "sleep" => Ok(Metric::SleepQuality),
            "stress" => Ok(Metric::StressLevel),
            "temp" | "temperature" => Ok(Metric::BodyTemperature),
            other => Metric::from_str(other)
                .map_err(|_| AnalysisError::invalid(format!("unknown metric `{other}`"))),
        }
    }
}

/// Parses `metric=weight` pairs separated by commas, e.g.
/// `heart_rate=0.5,spo2=0.5`. Unlisted metrics weigh 0. The sum is not
/// checked here; see [`ScoringWeights::validate`].
impl FromStr for ScoringWeights {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut weights = Self::zero();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| AnalysisError::invalid(format!("expected metric=weight, got `{pair}`")))?;
            let metric = Self::parse_metric(name.trim())?;
            let weight = value
                .trim()
                .parse::<f64>()
                .map_err(|e| AnalysisError::invalid(format!("weight for {metric}: {e}")))?;
            weights.set(metric, weight);
        }
        Ok(weights)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub trees: usize,
    pub sample_size: usize,
    pub seed: u64,
    /// Neighbouring records used for attribution z-scores.
    pub rolling_window: usize,
    pub z_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            trees: 100,
            sample_size: 256,
            seed: 42,
            rolling_window: 24,
            z_threshold: 2.0,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.trees == 0 {
            return Err(AnalysisError::invalid("detector needs at least one tree"));
        }
        if self.sample_size < 2 {
            return Err(AnalysisError::invalid("detector sample size must be at least 2"));
        }
        if self.rolling_window < 2 {
            return Err(AnalysisError::invalid("rolling window must be at least 2"));
        }
        if !self.z_threshold.is_finite() || self.z_threshold <= 0.0 {
            return Err(AnalysisError::invalid("z threshold must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub num_days: i64,
    #[serde(rename = "interval_seconds", with = "seconds")]
    pub interval: TimeDelta,
    pub seed: Option<u64>,
    pub contamination: f64,
    pub anomaly_probability: f64,
    pub weights: ScoringWeights,
    pub bands: MetricBands,
    pub detector: DetectorConfig,
    /// Trailing records the insight rules aggregate over.
    pub recent_window: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            num_days: 30,
            interval: TimeDelta::hours(1),
            seed: None,
            contamination: 0.05,
            anomaly_probability: 0.05,
            weights: ScoringWeights::default(),
            bands: MetricBands::default(),
            detector: DetectorConfig::default(),
            recent_window: 24,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        validate_span(self.num_days, self.interval)?;
        validate_contamination(self.contamination)?;
        validate_probability(self.anomaly_probability)?;
        if self.recent_window == 0 {
            return Err(AnalysisError::invalid("recent window must not be empty"));
        }
        self.weights.validate()?;
        self.bands.validate()?;
        self.detector.validate()
    }
}

pub(crate) fn validate_span(num_days: i64, interval: TimeDelta) -> Result<()> {
    if num_days <= 0 {
        return Err(AnalysisError::invalid(format!(
            "num_days must be positive, got {num_days}"
        )));
    }
    if interval < TimeDelta::seconds(1) {
        return Err(AnalysisError::invalid("interval must be at least one second"));
    }
    let span = TimeDelta::try_days(num_days)
        .ok_or_else(|| AnalysisError::invalid(format!("num_days {num_days} is out of range")))?;
    if interval > span {
        return Err(AnalysisError::invalid(format!(
            "interval of {}s is longer than {num_days} day(s)",
            interval.num_seconds()
        )));
    }
    Ok(())
}

pub(crate) fn validate_contamination(contamination: f64) -> Result<()> {
    if contamination.is_finite() && contamination > 0.0 && contamination <= 1.0 {
        Ok(())
    } else {
        Err(AnalysisError::invalid(format!(
            "contamination must be in (0, 1], got {contamination}"
        )))
    }
}

pub(crate) fn validate_probability(probability: f64) -> Result<()> {
    if (0.0..=1.0).contains(&probability) {
        Ok(())
    } else {
        Err(AnalysisError::invalid(format!(
            "anomaly probability must be in [0, 1], got {probability}"
        )))
    }
}

mod seconds {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(delta: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(delta.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let seconds = i64::deserialize(deserializer)?;
        TimeDelta::try_seconds(seconds).ok_or_else(|| D::Error::custom("interval out of range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(AnalysisConfig::default().validate(), Ok(()));
    }

    #[test]
    fn default_weights_sum_to_one() {
        assert!((ScoringWeights::default().sum() - 1.0).abs() < ScoringWeights::SUM_TOLERANCE);
    }

    #[test]
    fn rejects_non_positive_days() {
        for days in [0, -3] {
            let config = AnalysisConfig {
                num_days: days,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(AnalysisError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn rejects_bad_contamination() {
        for contamination in [0.0, -0.1, 1.5, f64::NAN] {
            let config = AnalysisConfig {
                contamination,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{contamination} accepted");
        }
        let config = AnalysisConfig {
            contamination: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let weights: ScoringWeights = "hr=0.5,spo2=0.4".parse().unwrap();
        assert!(matches!(
            weights.validate(),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn rejects_negative_weight() {
        let weights: ScoringWeights = "hr=1.5,spo2=-0.5".parse().unwrap();
        assert!(weights.validate().is_err());
    }

    #[test]
    fn parses_weights_with_aliases() {
        let weights: ScoringWeights = "hr=0.5, blood_oxygen=0.5".parse().unwrap();
        assert_eq!(weights.get(Metric::HeartRate), 0.5);
        assert_eq!(weights.get(Metric::BloodOxygen), 0.5);
        assert_eq!(weights.get(Metric::StressLevel), 0.0);
        assert!(weights.validate().is_ok());

        assert!("pulse=1.0".parse::<ScoringWeights>().is_err());
        assert!("hr".parse::<ScoringWeights>().is_err());
        assert!("hr=abc".parse::<ScoringWeights>().is_err());
    }

    #[test]
    fn rejects_unordered_band() {
        let mut bands = MetricBands::default();
        bands.heart_rate = MetricBand::new(60.0, 40.0, 80.0, 180.0);
        assert!(bands.validate().is_err());
    }

    #[test]
    fn rejects_interval_longer_than_span() {
        let config = AnalysisConfig {
            num_days: 1,
            interval: TimeDelta::hours(25),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AnalysisConfig {
            interval: TimeDelta::zero(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserialises_partial_json() {
        let config: AnalysisConfig = serde_json::from_str(
            r#"{"num_days": 2, "interval_seconds": 1800,
                "weights": {"heart_rate": 0.5, "blood_oxygen": 0.5}}"#,
        )
        .unwrap();
        assert_eq!(config.num_days, 2);
        assert_eq!(config.interval, TimeDelta::minutes(30));
        assert_eq!(config.weights.get(Metric::SleepQuality), 0.0);
        assert_eq!(config.contamination, 0.05);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_bands_keep_other_defaults() {
        let config: AnalysisConfig = serde_json::from_str(
            r#"{"bands": {"heart_rate":
                {"floor": 45.0, "ideal_low": 55.0, "ideal_high": 75.0, "ceiling": 170.0}}}"#,
        )
        .unwrap();
        let defaults = MetricBands::default();

        assert_eq!(
            config.bands.heart_rate,
            MetricBand::new(45.0, 55.0, 75.0, 170.0)
        );
        assert_eq!(config.bands.sleep_quality, defaults.sleep_quality);
        assert_eq!(config.bands.body_temperature, defaults.body_temperature);
        assert!(config.validate().is_ok());
    }
}
