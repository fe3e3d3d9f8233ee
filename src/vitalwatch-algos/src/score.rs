use std::collections::BTreeMap;

use vitalwatch_types::{HealthStatus, Metric, ScoreResult};

use crate::{Result, config::ScoringWeights};

pub struct ScoreAggregator {
    weights: ScoringWeights,
}

impl ScoreAggregator {
    pub const EXCELLENT_MIN: f64 = 85.0;
    pub const GOOD_MIN: f64 = 65.0;

    pub fn new(weights: ScoringWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    /// Weighted average of the sub-scores. A metric missing from the mapping
    /// counts as 0.
    pub fn score(&self, sub_scores: &BTreeMap<Metric, f64>) -> ScoreResult {
        let overall = Metric::ALL
            .into_iter()
            .map(|m| self.weights.get(m) * sub_scores.get(&m).copied().unwrap_or_default())
            .sum::<f64>()
            // weights sum to 1 only within tolerance
            .clamp(0.0, 100.0);

        ScoreResult {
            overall_score: overall,
            status: Self::classify(overall),
            sub_scores: sub_scores.clone(),
        }
    }

    pub fn classify(score: f64) -> HealthStatus {
        if score >= Self::EXCELLENT_MIN {
            HealthStatus::Excellent
        } else if score >= Self::GOOD_MIN {
            HealthStatus::Good
        } else {
            HealthStatus::NeedsAttention
        }
    }
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
        }
    }
}
