use strum::{AsRefStr, Display, EnumIter, EnumString};

/// One of the six telemetry channels carried by every [`crate::HealthRecord`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Metric {
    HeartRate,
    BloodOxygen,
    ActivityLevel,
    SleepQuality,
    StressLevel,
    BodyTemperature,
}

impl Metric {
    pub const COUNT: usize = 6;

    /// Feature order used by the detector and the export table.
    pub const ALL: [Metric; Self::COUNT] = [
        Metric::HeartRate,
        Metric::BloodOxygen,
        Metric::ActivityLevel,
        Metric::SleepQuality,
        Metric::StressLevel,
        Metric::BodyTemperature,
    ];

    /// Inclusive physiological range a value of this metric may take.
    /// Generated values never leave it, anomalous or not.
    pub const fn bounds(self) -> (f64, f64) {
        match self {
            Metric::HeartRate => (40.0, 180.0),
            Metric::BloodOxygen => (85.0, 100.0),
            Metric::ActivityLevel => (0.0, 10_000.0),
            Metric::SleepQuality => (0.0, 100.0),
            Metric::StressLevel => (0.0, 100.0),
            Metric::BodyTemperature => (35.5, 39.0),
        }
    }

    pub fn contains(self, value: f64) -> bool {
        let (low, high) = self.bounds();
        value.is_finite() && value >= low && value <= high
    }

    pub const fn label(self) -> &'static str {
        match self {
            Metric::HeartRate => "heart rate",
            Metric::BloodOxygen => "blood oxygen",
            Metric::ActivityLevel => "activity",
            Metric::SleepQuality => "sleep quality",
            Metric::StressLevel => "stress level",
            Metric::BodyTemperature => "body temperature",
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Value with its unit, at the precision the metric is read at.
    pub fn format_value(self, value: f64) -> String {
        match self {
            Metric::HeartRate => format!("{value:.0} bpm"),
            Metric::BloodOxygen => format!("{value:.1}%"),
            Metric::ActivityLevel => format!("{value:.0} steps"),
            Metric::SleepQuality | Metric::StressLevel => format!("{value:.0}/100"),
            Metric::BodyTemperature => format!("{value:.1}°C"),
        }
    }
}
