use chrono::NaiveDateTime;
use strum::Display;

use crate::Metric;

/// Ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub severity: Severity,
    pub message: String,
    pub related_metric: Option<Metric>,
    /// Time of the record (or the newest record of the window) the insight is about.
    pub timestamp: NaiveDateTime,
}
