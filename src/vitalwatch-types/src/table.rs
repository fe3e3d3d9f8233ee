//! Flat, one-row-per-timestamp view of a series and its analysis.
//!
//! The column set and order is a compatibility contract for anything that
//! reads exported tables, so [`COLUMNS`] must match the field order of
//! [`HealthRow`].

use chrono::NaiveDateTime;

use crate::{AnomalyResult, HealthRecord, ScoreResult};

pub const COLUMNS: [&str; 9] = [
    "timestamp",
    "heart_rate",
    "blood_oxygen",
    "activity_level",
    "sleep_quality",
    "stress_level",
    "body_temperature",
    "overall_score",
    "is_anomaly",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRow {
    pub timestamp: NaiveDateTime,
    pub heart_rate: f64,
    pub blood_oxygen: f64,
    pub activity_level: f64,
    pub sleep_quality: f64,
    pub stress_level: f64,
    pub body_temperature: f64,
    pub overall_score: Option<f64>,
    pub is_anomaly: Option<bool>,
}

impl HealthRow {
    pub fn new(
        record: &HealthRecord,
        score: Option<&ScoreResult>,
        anomaly: Option<&AnomalyResult>,
    ) -> Self {
        Self {
            timestamp: record.timestamp,
            heart_rate: record.heart_rate,
            blood_oxygen: record.blood_oxygen,
            activity_level: record.activity_level,
            sleep_quality: record.sleep_quality,
            stress_level: record.stress_level,
            body_temperature: record.body_temperature,
            overall_score: score.map(|s| s.overall_score),
            is_anomaly: anomaly.map(|a| a.is_anomaly),
        }
    }

    /// Rebuilds the raw record. Generator ground truth is not part of the
    /// table, so `is_injected_anomaly` is always false.
    pub fn to_record(&self) -> HealthRecord {
        HealthRecord {
            timestamp: self.timestamp,
            heart_rate: self.heart_rate,
            blood_oxygen: self.blood_oxygen,
            activity_level: self.activity_level,
            sleep_quality: self.sleep_quality,
            stress_level: self.stress_level,
            body_temperature: self.body_temperature,
            is_injected_anomaly: false,
        }
    }
}

/// Builds the export table. `scores` and `anomalies` are joined by position
/// and may be shorter than `records` (or empty) when a stage did not run.
pub fn rows(
    records: &[HealthRecord],
    scores: &[ScoreResult],
    anomalies: &[AnomalyResult],
) -> Vec<HealthRow> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| HealthRow::new(record, scores.get(i), anomalies.get(i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{NaiveDate, TimeDelta};

    use super::*;
    use crate::{HealthStatus, Metric};

    fn records() -> Vec<HealthRecord> {
        let base = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        (0..3)
            .map(|i| HealthRecord {
                timestamp: base + TimeDelta::hours(i),
                heart_rate: 61.25 + i as f64,
                blood_oxygen: 97.3,
                activity_level: 812.5,
                sleep_quality: 66.6,
                stress_level: 41.0 / 3.0,
                body_temperature: 36.71,
                is_injected_anomaly: i == 1,
            })
            .collect()
    }

    #[test]
    fn json_field_order_matches_columns() {
        let row = HealthRow::new(&records()[0], None, None);
        let json = serde_json::to_string(&row).unwrap();
        let mut last = 0;
        for column in COLUMNS {
            let at = json.find(&format!("\"{column}\"")).unwrap();
            assert!(at >= last, "{column} out of order");
            last = at;
        }
    }

    #[test]
    fn rows_reconstruct_metric_values() {
        let records = records();
        let scores = vec![
            ScoreResult {
                overall_score: 88.0,
                status: HealthStatus::Excellent,
                sub_scores: BTreeMap::new(),
            };
            3
        ];
        let anomalies = vec![AnomalyResult::default(); 3];

        let table = rows(&records, &scores, &anomalies);
        let json = serde_json::to_string(&table).unwrap();
        let parsed: Vec<HealthRow> = serde_json::from_str(&json).unwrap();

        for (original, row) in records.iter().zip(parsed.iter()) {
            let rebuilt = row.to_record();
            assert_eq!(rebuilt.timestamp, original.timestamp);
            for metric in Metric::ALL {
                assert!((rebuilt.get(metric) - original.get(metric)).abs() < 1e-9);
            }
            assert_eq!(row.overall_score, Some(88.0));
            assert_eq!(row.is_anomaly, Some(false));
        }
    }

    #[test]
    fn missing_stages_leave_columns_empty() {
        let table = rows(&records(), &[], &[]);
        assert_eq!(table.len(), 3);
        assert!(table.iter().all(|r| r.overall_score.is_none()));
        assert!(table.iter().all(|r| r.is_anomaly.is_none()));
    }
}
