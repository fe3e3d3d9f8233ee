use std::{collections::BTreeMap, fmt::Display};

use crate::Metric;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    Excellent,
    Good,
    NeedsAttention,
}

impl Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            HealthStatus::Excellent => "Excellent",
            HealthStatus::Good => "Good",
            HealthStatus::NeedsAttention => "Needs Attention",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub overall_score: f64,
    pub status: HealthStatus,
    pub sub_scores: BTreeMap<Metric, f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub is_anomaly: bool,
    /// Decision-function value, lower is more anomalous. Flagged records
    /// fall below zero, the rest above it.
    pub anomaly_score: f64,
    /// Attributed metrics and their signed z-score against the rolling
    /// window. Empty for normal records and for purely multivariate outliers.
    pub contributing_metrics: BTreeMap<Metric, f64>,
}

impl AnomalyResult {
    /// The attributed metric with the largest absolute deviation.
    pub fn strongest_metric(&self) -> Option<Metric> {
        self.contributing_metrics
            .iter()
            .max_by(|(_, a), (_, b)| a.abs().total_cmp(&b.abs()))
            .map(|(metric, _)| *metric)
    }
}
