use chrono::NaiveDateTime;
use vitalwatch_types::{AnomalyResult, HealthRecord, Insight, Metric, ScoreResult, Severity};

use crate::{AnalysisError, Result, helpers::stats::mean};

/// What a rule aggregates over the recent window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Metric(Metric),
    OverallScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Above,
    Below,
}

/// One row of the decision table. `template` may use `{value}` (the window
/// mean, formatted with its unit) and `{window}` (number of records).
#[derive(Debug, Clone, Copy)]
pub struct ThresholdRule {
    pub subject: Subject,
    pub comparison: Comparison,
    pub threshold: f64,
    pub severity: Severity,
    pub template: &'static str,
}

impl ThresholdRule {
    const fn new(
        subject: Subject,
        comparison: Comparison,
        threshold: f64,
        severity: Severity,
        template: &'static str,
    ) -> Self {
        Self {
            subject,
            comparison,
            threshold,
            severity,
            template,
        }
    }

    fn matches(&self, value: f64) -> bool {
        match self.comparison {
            Comparison::Above => value > self.threshold,
            Comparison::Below => value < self.threshold,
        }
    }

    fn render(&self, value: f64, window: usize) -> String {
        let value = match self.subject {
            Subject::Metric(metric) => metric.format_value(value),
            Subject::OverallScore => format!("{value:.1}"),
        };
        self.template
            .replace("{value}", &value)
            .replace("{window}", &window.to_string())
    }
}

/// Evaluated top to bottom; for each subject only the first matching rule fires.
pub const DEFAULT_RULES: &[ThresholdRule] = &[
    ThresholdRule::new(
        Subject::Metric(Metric::BloodOxygen),
        Comparison::Below,
        92.0,
        Severity::Critical,
        "Blood oxygen averaged {value} over the last {window} readings. Consider consulting a healthcare provider.",
    ),
    ThresholdRule::new(
        Subject::Metric(Metric::BloodOxygen),
        Comparison::Below,
        95.0,
        Severity::Warning,
        "Blood oxygen averaged {value} over the last {window} readings, below the healthy range.",
    ),
    ThresholdRule::new(
        Subject::Metric(Metric::BodyTemperature),
        Comparison::Above,
        37.8,
        Severity::Critical,
        "Body temperature averaged {value} over the last {window} readings, which suggests a fever.",
    ),
    ThresholdRule::new(
        Subject::Metric(Metric::BodyTemperature),
        Comparison::Above,
        37.3,
        Severity::Warning,
        "Body temperature is running warm at {value} on average.",
    ),
    ThresholdRule::new(
        Subject::Metric(Metric::HeartRate),
        Comparison::Above,
        100.0,
        Severity::Warning,
        "Your heart rate is elevated at {value} on average. Consider relaxation techniques.",
    ),
    ThresholdRule::new(
        Subject::Metric(Metric::HeartRate),
        Comparison::Below,
        50.0,
        Severity::Warning,
        "Your heart rate is unusually low at {value} on average.",
    ),
    ThresholdRule::new(
        Subject::Metric(Metric::StressLevel),
        Comparison::Above,
        70.0,
        Severity::Warning,
        "Elevated stress: {value} on average. Practice deep breathing or meditation.",
    ),
    ThresholdRule::new(
        Subject::Metric(Metric::SleepQuality),
        Comparison::Below,
        50.0,
        Severity::Warning,
        "Sleep quality could be better at {value} on average. Try a consistent bedtime routine.",
    ),
    ThresholdRule::new(
        Subject::Metric(Metric::ActivityLevel),
        Comparison::Below,
        200.0,
        Severity::Info,
        "You've been less active lately, {value} per reading. Try a short walk!",
    ),
    ThresholdRule::new(
        Subject::OverallScore,
        Comparison::Below,
        65.0,
        Severity::Warning,
        "Overall health score averaged {value} over the last {window} readings and needs attention.",
    ),
];

const ALL_CLEAR: &str = "All metrics are within healthy ranges. Keep it up!";

pub struct InsightEngine {
    rules: Vec<ThresholdRule>,
    recent_window: usize,
}

impl InsightEngine {
    pub const DEFAULT_WINDOW: usize = 24;

    pub fn new(recent_window: usize) -> Result<Self> {
        Self::with_rules(DEFAULT_RULES.to_vec(), recent_window)
    }

    pub fn with_rules(rules: Vec<ThresholdRule>, recent_window: usize) -> Result<Self> {
        if recent_window == 0 {
            return Err(AnalysisError::invalid("recent window must not be empty"));
        }
        Ok(Self {
            rules,
            recent_window,
        })
    }

    /// Ranked insights, most severe first and newest first within a severity.
    ///
    /// `anomalies` may be empty when detection could not run; otherwise both
    /// `scores` and `anomalies` must line up with `series`.
    pub fn derive(
        &self,
        series: &[HealthRecord],
        scores: &[ScoreResult],
        anomalies: &[AnomalyResult],
    ) -> Result<Vec<Insight>> {
        let Some(latest) = series.last() else {
            return Err(AnalysisError::InsufficientData {
                required: 1,
                actual: 0,
            });
        };
        if scores.len() != series.len() {
            return Err(AnalysisError::invalid(format!(
                "{} scores for {} records",
                scores.len(),
                series.len()
            )));
        }
        if !anomalies.is_empty() && anomalies.len() != series.len() {
            return Err(AnalysisError::invalid(format!(
                "{} anomaly results for {} records",
                anomalies.len(),
                series.len()
            )));
        }

        let window_start = series.len().saturating_sub(self.recent_window);
        let mut insights = self.threshold_insights(
            &series[window_start..],
            &scores[window_start..],
            latest.timestamp,
        );

        insights.extend(
            anomalies
                .iter()
                .enumerate()
                .filter(|(_, a)| a.is_anomaly)
                .map(|(i, a)| Self::anomaly_insight(&series[i], a, i >= window_start)),
        );

        if insights.is_empty() {
            insights.push(Insight {
                severity: Severity::Info,
                message: ALL_CLEAR.to_string(),
                related_metric: None,
                timestamp: latest.timestamp,
            });
        }

        insights.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });
        debug!("derived {} insights", insights.len());
        Ok(insights)
    }

    fn threshold_insights(
        &self,
        recent: &[HealthRecord],
        scores: &[ScoreResult],
        timestamp: NaiveDateTime,
    ) -> Vec<Insight> {
        let mut fired: Vec<Subject> = Vec::new();
        let mut insights = Vec::new();

        for rule in &self.rules {
            if fired.contains(&rule.subject) {
                continue;
            }

            let values = match rule.subject {
                Subject::Metric(metric) => recent.iter().map(|r| r.get(metric)).collect::<Vec<_>>(),
                Subject::OverallScore => scores.iter().map(|s| s.overall_score).collect(),
            };
            let value = mean(&values);
            if !rule.matches(value) {
                continue;
            }

            fired.push(rule.subject);
            insights.push(Insight {
                severity: rule.severity,
                message: rule.render(value, recent.len()),
                related_metric: match rule.subject {
                    Subject::Metric(metric) => Some(metric),
                    Subject::OverallScore => None,
                },
                timestamp,
            });
        }

        insights
    }

    fn anomaly_insight(record: &HealthRecord, anomaly: &AnomalyResult, recent: bool) -> Insight {
        let at = record.timestamp.format("%Y-%m-%d %H:%M");
        let message = if anomaly.contributing_metrics.is_empty() {
            format!("Unusual combination of readings at {at}; no single metric stands out.")
        } else {
            let details = anomaly
                .contributing_metrics
                .iter()
                .map(|(metric, z)| {
                    format!(
                        "{} {} ({:+.1}σ from recent mean)",
                        metric.label(),
                        metric.format_value(record.get(*metric)),
                        z
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("Unusual reading at {at}: {details}.")
        };

        Insight {
            severity: if recent {
                Severity::Warning
            } else {
                Severity::Info
            },
            message,
            related_metric: anomaly.strongest_metric(),
            timestamp: record.timestamp,
        }
    }
}

impl Default for InsightEngine {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.to_vec(),
            recent_window: Self::DEFAULT_WINDOW,
        }
    }
}
