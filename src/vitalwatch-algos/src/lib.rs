#[macro_use]
extern crate log;

#[macro_use]
extern crate serde;

mod error;
pub use error::{AnalysisError, Result};

pub mod config;
pub use config::{AnalysisConfig, DetectorConfig, MetricBand, MetricBands, ScoringWeights};

mod generator;
pub use generator::SignalGenerator;

mod normalizer;
pub use normalizer::Normalizer;

mod score;
pub use score::ScoreAggregator;

mod anomaly;
pub use anomaly::AnomalyDetector;

mod insights;
pub use insights::{Comparison, DEFAULT_RULES, InsightEngine, Subject, ThresholdRule};

mod summary;
pub use summary::{CorrelationMatrix, SeriesSummary, WeeklySummary};

mod monitor;
pub use monitor::{HealthMonitor, HealthReport, StatusCounts};

pub mod helpers;
