use std::collections::BTreeMap;

use rand::{SeedableRng, rngs::StdRng};
use vitalwatch_types::{AnomalyResult, HealthRecord, Metric};

use crate::{
    AnalysisError, Result,
    config::{DetectorConfig, validate_contamination},
    helpers::stats::{mean, std_dev},
};

mod isolation_forest;
use isolation_forest::IsolationForest;

/// Batch outlier detection over a whole series.
///
/// A fresh isolation forest is fitted on the raw metrics of every call and
/// dropped before returning, so no state carries over between series.
pub struct AnomalyDetector {
    contamination: f64,
    config: DetectorConfig,
}

impl AnomalyDetector {
    pub const DEFAULT_CONTAMINATION: f64 = 0.05;
    /// Below this the forest cannot estimate density in any useful way.
    pub const MIN_RECORDS: usize = 10;

    pub fn new(contamination: f64, config: DetectorConfig) -> Result<Self> {
        validate_contamination(contamination)?;
        config.validate()?;
        Ok(Self {
            contamination,
            config,
        })
    }

    pub fn fit_and_score(&self, series: &[HealthRecord]) -> Result<Vec<AnomalyResult>> {
        if series.len() < Self::MIN_RECORDS {
            return Err(AnalysisError::InsufficientData {
                required: Self::MIN_RECORDS,
                actual: series.len(),
            });
        }

        let features = series.iter().map(HealthRecord::features).collect::<Vec<_>>();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let forest =
            IsolationForest::fit(&features, self.config.trees, self.config.sample_size, &mut rng);
        debug!("fitted {} isolation trees on {} records", forest.len(), features.len());

        let raw = features
            .iter()
            .map(|point| forest.score_samples(point))
            .collect::<Vec<_>>();

        // rank by score, ties broken by position
        let mut order = (0..raw.len()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| raw[a].total_cmp(&raw[b]).then(a.cmp(&b)));

        let flagged_count = self.flagged_count(raw.len());
        let offset = Self::offset(&raw, &order, flagged_count);

        let mut flagged = vec![false; raw.len()];
        for &i in &order[..flagged_count] {
            flagged[i] = true;
        }

        let results = raw
            .iter()
            .zip(flagged)
            .enumerate()
            .map(|(i, (&score, is_anomaly))| AnomalyResult {
                is_anomaly,
                anomaly_score: score - offset,
                contributing_metrics: if is_anomaly {
                    self.attribute(series, i)
                } else {
                    BTreeMap::new()
                },
            })
            .collect::<Vec<_>>();

        info!(
            "flagged {} of {} records as anomalous (offset {:.4})",
            flagged_count,
            series.len(),
            offset
        );
        Ok(results)
    }

    fn flagged_count(&self, len: usize) -> usize {
        ((self.contamination * len as f64).round() as usize).min(len)
    }

    /// Threshold halfway between the last flagged and the first unflagged score.
    fn offset(raw: &[f64], order: &[usize], flagged_count: usize) -> f64 {
        match flagged_count {
            0 => raw[order[0]],
            n if n == order.len() => raw[order[n - 1]],
            n => (raw[order[n - 1]] + raw[order[n]]) / 2.0,
        }
    }

    /// Z-score of every metric of `series[index]` against its neighbours:
    /// the preceding `rolling_window` records, or the first `rolling_window`
    /// other records near the start of the series.
    fn attribute(&self, series: &[HealthRecord], index: usize) -> BTreeMap<Metric, f64> {
        let window = self.config.rolling_window;
        let start = index.saturating_sub(window);
        let end = (start + window + 1).min(series.len());
        let neighbours = (start..end)
            .filter(|&j| j != index)
            .map(|j| &series[j])
            .collect::<Vec<_>>();

        let record = &series[index];
        Metric::ALL
            .into_iter()
            .filter_map(|metric| {
                let values = neighbours.iter().map(|r| r.get(metric)).collect::<Vec<_>>();
                let mean = mean(&values);
                let sd = std_dev(&values, mean);
                if sd < 1e-9 {
                    return None;
                }
                let z = (record.get(metric) - mean) / sd;
                (z.abs() > self.config.z_threshold).then_some((metric, z))
            })
            .collect()
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self {
            contamination: Self::DEFAULT_CONTAMINATION,
            config: DetectorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    use super::*;
    use crate::SignalGenerator;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn series(seed: u64, days: i64, probability: f64) -> Vec<HealthRecord> {
        SignalGenerator::new(Some(seed))
            .with_anomaly_probability(probability)
            .unwrap()
            .generate(t0(), days, TimeDelta::hours(1))
            .unwrap()
            .into_records()
    }

    #[test]
    fn short_series_is_insufficient() {
        let records = series(42, 1, 0.0)[..5].to_vec();
        assert_eq!(
            AnomalyDetector::default().fit_and_score(&records),
            Err(AnalysisError::InsufficientData {
                required: 10,
                actual: 5
            })
        );
    }

    #[test]
    fn rejects_bad_contamination() {
        for contamination in [0.0, 1.01, -0.5] {
            assert!(matches!(
                AnomalyDetector::new(contamination, DetectorConfig::default()),
                Err(AnalysisError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn clean_series_flags_contamination_fraction() {
        let records = series(8, 30, 0.0);
        let results = AnomalyDetector::default().fit_and_score(&records).unwrap();

        assert_eq!(results.len(), records.len());
        let flagged = results.iter().filter(|r| r.is_anomaly).count();
        // round(0.05 * 720)
        assert_eq!(flagged, 36);

        for result in &results {
            if result.is_anomaly {
                assert!(result.anomaly_score <= 0.0);
            } else {
                assert!(result.anomaly_score >= 0.0);
                assert!(result.contributing_metrics.is_empty());
            }
        }
    }

    #[test]
    fn injected_anomalies_are_flagged_more_often() {
        let records = series(21, 30, 0.05);
        let results = AnomalyDetector::default().fit_and_score(&records).unwrap();

        let rate = |injected: bool| {
            let subset = records
                .iter()
                .zip(&results)
                .filter(|(r, _)| r.is_injected_anomaly == injected)
                .collect::<Vec<_>>();
            let hits = subset.iter().filter(|(_, a)| a.is_anomaly).count();
            hits as f64 / subset.len() as f64
        };

        let injected_rate = rate(true);
        let normal_rate = rate(false);
        assert!(
            injected_rate > 3.0 * normal_rate,
            "injected {injected_rate:.3} vs normal {normal_rate:.3}"
        );
    }

    #[test]
    fn spike_is_attributed_to_heart_rate() {
        let mut records = series(4, 10, 0.0);
        // 03:00 on day 5, normally the lowest heart rate of the day
        let index = 4 * 24 + 3;
        records[index].heart_rate = 170.0;

        let results = AnomalyDetector::default().fit_and_score(&records).unwrap();
        let spike = &results[index];
        assert!(spike.is_anomaly);
        assert!(spike.contributing_metrics[&Metric::HeartRate] > 2.0);
        assert_eq!(spike.strongest_metric(), Some(Metric::HeartRate));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let records = series(13, 5, 0.05);
        let detector = AnomalyDetector::default();
        assert_eq!(
            detector.fit_and_score(&records).unwrap(),
            detector.fit_and_score(&records).unwrap()
        );
    }

    #[test]
    fn full_contamination_flags_everything() {
        let records = series(2, 1, 0.0);
        let detector = AnomalyDetector::new(1.0, DetectorConfig::default()).unwrap();
        let results = detector.fit_and_score(&records).unwrap();
        assert!(results.iter().all(|r| r.is_anomaly));
    }
}
