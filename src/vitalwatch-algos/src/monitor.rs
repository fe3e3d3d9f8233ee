use chrono::NaiveDateTime;
use vitalwatch_types::{
    AnomalyResult, HealthRecord, HealthRow, HealthSeries, HealthStatus, Insight, ScoreResult,
    out_of_order, table,
};

use crate::{
    AnalysisError, AnomalyDetector, InsightEngine, Normalizer, Result, ScoreAggregator,
    SeriesSummary, SignalGenerator, config::AnalysisConfig,
};

/// Runs the whole pipeline with one validated configuration.
pub struct HealthMonitor {
    config: AnalysisConfig,
    normalizer: Normalizer,
    aggregator: ScoreAggregator,
    detector: AnomalyDetector,
    insights: InsightEngine,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub scores: Vec<ScoreResult>,
    pub anomalies: Vec<AnomalyResult>,
    pub insights: Vec<Insight>,
    pub summary: SeriesSummary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub excellent: usize,
    pub good: usize,
    pub needs_attention: usize,
}

impl HealthMonitor {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            normalizer: Normalizer::new(config.bands),
            aggregator: ScoreAggregator::new(config.weights)?,
            detector: AnomalyDetector::new(config.contamination, config.detector)?,
            insights: InsightEngine::new(config.recent_window)?,
            config,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Generator configured with the seed and anomaly rate of this monitor.
    /// Keep it around to extend a series with the same random stream.
    pub fn generator(&self) -> Result<SignalGenerator> {
        SignalGenerator::new(self.config.seed)
            .with_anomaly_probability(self.config.anomaly_probability)
    }

    pub fn generate(&self, start: NaiveDateTime) -> Result<HealthSeries> {
        self.generator()?
            .generate(start, self.config.num_days, self.config.interval)
    }

    pub fn score_series(&self, series: &[HealthRecord]) -> Result<Vec<ScoreResult>> {
        validate_series(series)?;
        Ok(self.scores(series))
    }

    pub fn analyze(&self, series: &[HealthRecord]) -> Result<HealthReport> {
        validate_series(series)?;

        let anomalies = self.detector.fit_and_score(series)?;
        let scores = self.scores(series);
        let insights = self.insights.derive(series, &scores, &anomalies)?;
        let summary = SeriesSummary::new(series, &anomalies)?;

        info!(
            "analyzed {} records: {} anomalies, {} insights",
            series.len(),
            anomalies.iter().filter(|a| a.is_anomaly).count(),
            insights.len()
        );
        Ok(HealthReport {
            scores,
            anomalies,
            insights,
            summary,
        })
    }

    fn scores(&self, series: &[HealthRecord]) -> Vec<ScoreResult> {
        let scores = series
            .iter()
            .map(|record| self.aggregator.score(&self.normalizer.normalize(record)))
            .collect::<Vec<_>>();
        debug!("scored {} records", scores.len());
        scores
    }
}

impl HealthReport {
    pub fn rows(&self, series: &[HealthRecord]) -> Vec<HealthRow> {
        table::rows(series, &self.scores, &self.anomalies)
    }

    pub fn status_counts(&self) -> StatusCounts {
        self.scores
            .iter()
            .fold(StatusCounts::default(), |mut counts, score| {
                match score.status {
                    HealthStatus::Excellent => counts.excellent += 1,
                    HealthStatus::Good => counts.good += 1,
                    HealthStatus::NeedsAttention => counts.needs_attention += 1,
                }
                counts
            })
    }
}

/// Records must be strictly chronological and inside physiological bounds.
fn validate_series(series: &[HealthRecord]) -> Result<()> {
    if let Some(i) = out_of_order(series) {
        return Err(AnalysisError::invalid(format!(
            "records out of order: {} is followed by {}",
            series[i - 1].timestamp,
            series[i].timestamp
        )));
    }

    for record in series {
        if let Some(metric) = record.out_of_bounds() {
            let (min, max) = metric.bounds();
            return Err(AnalysisError::invalid(format!(
                "{} of {} at {} is outside {min}..={max}",
                metric.label(),
                record.get(metric),
                record.timestamp
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeDelta};
    use vitalwatch_types::{Metric, Severity};

    use super::*;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn seeded(seed: u64, num_days: i64) -> AnalysisConfig {
        AnalysisConfig {
            seed: Some(seed),
            num_days,
            ..Default::default()
        }
    }

    #[test]
    fn rejects_invalid_config_up_front() {
        let config = AnalysisConfig {
            num_days: 0,
            ..Default::default()
        };
        assert!(matches!(
            HealthMonitor::new(config),
            Err(AnalysisError::InvalidParameter(_))
        ));

        let mut config = AnalysisConfig::default();
        config.weights.heart_rate = 0.9;
        assert!(HealthMonitor::new(config).is_err());
    }

    #[test]
    fn one_day_of_hourly_records() {
        let monitor = HealthMonitor::new(seeded(42, 1)).unwrap();
        let series = monitor.generate(t0()).unwrap();

        assert_eq!(series.len(), 24);
        assert_eq!(series[0].timestamp, t0());
        assert_eq!(series[23].timestamp, t0() + TimeDelta::hours(23));
    }

    #[test]
    fn seeded_monitors_agree() {
        let a = HealthMonitor::new(seeded(7, 5)).unwrap();
        let b = HealthMonitor::new(seeded(7, 5)).unwrap();
        let series = a.generate(t0()).unwrap();
        assert_eq!(series, b.generate(t0()).unwrap());
        assert_eq!(a.analyze(&series).unwrap(), b.analyze(&series).unwrap());
    }

    #[test]
    fn full_pipeline_is_aligned() {
        let monitor = HealthMonitor::new(seeded(42, 30)).unwrap();
        let series = monitor.generate(t0()).unwrap();
        let report = monitor.analyze(&series).unwrap();

        assert_eq!(report.scores.len(), series.len());
        assert_eq!(report.anomalies.len(), series.len());
        assert!(
            report
                .scores
                .iter()
                .all(|s| (0.0..=100.0).contains(&s.overall_score))
        );

        let flagged = report.anomalies.iter().filter(|a| a.is_anomaly).count();
        assert_eq!(flagged, 36);
        let anomaly_insights = report
            .insights
            .iter()
            .filter(|i| i.message.starts_with("Unusual"))
            .count();
        assert_eq!(anomaly_insights, flagged);

        let counts = report.status_counts();
        assert_eq!(
            counts.excellent + counts.good + counts.needs_attention,
            series.len()
        );
        assert_eq!(report.summary.latest, series[series.len() - 1]);

        let rows = report.rows(&series);
        assert_eq!(rows.len(), series.len());
        assert_eq!(rows[0].overall_score, Some(report.scores[0].overall_score));
    }

    #[test]
    fn short_series_aborts_without_anomalies() {
        let monitor = HealthMonitor::new(seeded(42, 1)).unwrap();
        let series = monitor.generate(t0()).unwrap();
        let short = &series[..5];

        assert_eq!(
            monitor.analyze(short),
            Err(AnalysisError::InsufficientData {
                required: 10,
                actual: 5
            })
        );
        // scoring alone still works
        assert_eq!(monitor.score_series(short).unwrap().len(), 5);
    }

    #[test]
    fn rejects_out_of_bounds_records() {
        let monitor = HealthMonitor::new(seeded(1, 1)).unwrap();
        let mut series = monitor.generate(t0()).unwrap().into_records();
        series[3].blood_oxygen = 70.0;

        let err = monitor.analyze(&series).unwrap_err();
        assert!(matches!(&err, AnalysisError::InvalidParameter(msg) if msg.contains("blood oxygen")));
        assert!(monitor.score_series(&series).is_err());
    }

    #[test]
    fn rejects_unordered_records() {
        let monitor = HealthMonitor::new(seeded(1, 1)).unwrap();
        let mut series = monitor.generate(t0()).unwrap().into_records();
        series.swap(2, 3);
        let err = monitor.analyze(&series).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::InvalidParameter(format!(
                "records out of order: {} is followed by {}",
                t0() + TimeDelta::hours(3),
                t0() + TimeDelta::hours(2)
            ))
        );

        // repeated timestamps are not strictly later either
        series.swap(2, 3);
        series[5].timestamp = series[4].timestamp;
        assert!(monitor.score_series(&series).is_err());
    }

    #[test]
    fn low_oxygen_becomes_critical_insight() {
        let monitor = HealthMonitor::new(seeded(3, 2)).unwrap();
        let mut series = monitor.generate(t0()).unwrap().into_records();
        let len = series.len();
        for record in &mut series[len - 24..] {
            record.blood_oxygen = 89.0;
        }

        let report = monitor.analyze(&series).unwrap();
        let first = &report.insights[0];
        assert_eq!(first.severity, Severity::Critical);
        assert_eq!(first.related_metric, Some(Metric::BloodOxygen));
    }

    #[test]
    fn extended_series_stays_analyzable() {
        let monitor = HealthMonitor::new(seeded(11, 2)).unwrap();
        let mut generator = monitor.generator().unwrap();
        let mut series = generator
            .generate(t0(), monitor.config().num_days, monitor.config().interval)
            .unwrap();
        generator
            .extend(&mut series, 3, monitor.config().interval)
            .unwrap();

        assert_eq!(series.len(), 51);
        assert_eq!(monitor.analyze(&series).unwrap().scores.len(), 51);
    }
}
