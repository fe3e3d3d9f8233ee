use std::collections::BTreeMap;

use vitalwatch_types::{HealthRecord, Metric};

use crate::config::{MetricBand, MetricBands};

/// Maps raw metric values to 0-100 sub-scores, one record at a time.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    bands: MetricBands,
}

impl Normalizer {
    pub fn new(bands: MetricBands) -> Self {
        Self { bands }
    }

    pub fn normalize(&self, record: &HealthRecord) -> BTreeMap<Metric, f64> {
        Metric::ALL
            .into_iter()
            .map(|metric| (metric, self.sub_score(metric, record.get(metric))))
            .collect()
    }

    pub fn sub_score(&self, metric: Metric, value: f64) -> f64 {
        band_score(self.bands.get(metric), value)
    }
}

/// 100 inside the ideal band, linear down to 0 at the outer edges, 0 beyond.
fn band_score(band: &MetricBand, value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }

    if value < band.ideal_low {
        if value <= band.floor {
            0.0
        } else {
            100.0 * (value - band.floor) / (band.ideal_low - band.floor)
        }
    } else if value > band.ideal_high {
        if value >= band.ceiling {
            0.0
        } else {
            100.0 * (band.ceiling - value) / (band.ceiling - band.ideal_high)
        }
    } else {
        100.0
    }
}
