use std::{collections::BTreeMap, fmt::Display};

use chrono::{NaiveDateTime, TimeDelta};
use vitalwatch_types::{AnomalyResult, HealthRecord, Metric};

use crate::{
    AnalysisError, Result,
    helpers::stats::{mean, pearson, round_float},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub latest: HealthRecord,
    /// Latest value minus the series mean.
    pub deltas: BTreeMap<Metric, f64>,
    pub weekly: WeeklySummary,
    pub correlation: CorrelationMatrix,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklySummary {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    pub records: usize,
    pub averages: BTreeMap<Metric, f64>,
    pub total_activity: f64,
    pub anomalies: usize,
}

/// Pearson correlation between every pair of metrics, indexed in
/// [`Metric::ALL`] order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub values: [[f64; Metric::COUNT]; Metric::COUNT],
}

impl SeriesSummary {
    pub const WEEK: TimeDelta = TimeDelta::days(7);

    pub fn new(series: &[HealthRecord], anomalies: &[AnomalyResult]) -> Result<Self> {
        let Some(latest) = series.last().copied() else {
            return Err(AnalysisError::InsufficientData {
                required: 1,
                actual: 0,
            });
        };

        let deltas = Metric::ALL
            .into_iter()
            .map(|metric| {
                let values = series.iter().map(|r| r.get(metric)).collect::<Vec<_>>();
                (metric, latest.get(metric) - mean(&values))
            })
            .collect();

        Ok(Self {
            latest,
            deltas,
            weekly: WeeklySummary::new(series, anomalies, latest.timestamp),
            correlation: CorrelationMatrix::new(series),
        })
    }
}

impl WeeklySummary {
    fn new(series: &[HealthRecord], anomalies: &[AnomalyResult], to: NaiveDateTime) -> Self {
        let cutoff = to - SeriesSummary::WEEK;
        let start = series.partition_point(|r| r.timestamp <= cutoff);
        let week = &series[start..];

        let averages = Metric::ALL
            .into_iter()
            .map(|metric| {
                let values = week.iter().map(|r| r.get(metric)).collect::<Vec<_>>();
                (metric, mean(&values))
            })
            .collect();

        Self {
            from: week.first().map_or(to, |r| r.timestamp),
            to,
            records: week.len(),
            averages,
            total_activity: week.iter().map(|r| r.activity_level).sum(),
            anomalies: anomalies
                .get(start..)
                .map_or(0, |a| a.iter().filter(|a| a.is_anomaly).count()),
        }
    }
}

impl CorrelationMatrix {
    pub fn new(series: &[HealthRecord]) -> Self {
        let columns = Metric::ALL.map(|metric| series.iter().map(|r| r.get(metric)).collect::<Vec<_>>());

        let mut values = [[0_f64; Metric::COUNT]; Metric::COUNT];
        for i in 0..Metric::COUNT {
            values[i][i] = 1.0;
            for j in (i + 1)..Metric::COUNT {
                let r = pearson(&columns[i], &columns[j]);
                values[i][j] = r;
                values[j][i] = r;
            }
        }
        Self { values }
    }

    pub fn get(&self, a: Metric, b: Metric) -> f64 {
        self.values[a.index()][b.index()]
    }
}

impl Display for SeriesSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("Latest ({}):\n", self.latest.timestamp))?;
        for metric in Metric::ALL {
            f.write_fmt(format_args!(
                "\t{}: {} ({:+})\n",
                metric.label(),
                metric.format_value(self.latest.get(metric)),
                round_float(self.deltas[&metric])
            ))?;
        }
        f.write_fmt(format_args!("{}", self.weekly))
    }
}

impl Display for WeeklySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "Week {} to {} ({} readings):\n",
            self.from, self.to, self.records
        ))?;
        for (metric, value) in &self.averages {
            f.write_fmt(format_args!(
                "\tAvg {}: {}\n",
                metric.label(),
                metric.format_value(*value)
            ))?;
        }
        f.write_fmt(format_args!(
            "\tTotal steps: {:.0}\n\tAnomalous readings: {}",
            self.total_activity, self.anomalies
        ))
    }
}
