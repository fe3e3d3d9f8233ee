#[macro_use]
extern crate serde;

mod metric;
pub use metric::Metric;

mod record;
pub use record::{HealthRecord, HealthSeries, out_of_order};

mod results;
pub use results::{AnomalyResult, HealthStatus, ScoreResult};

mod insight;
pub use insight::{Insight, Severity};

pub mod table;
pub use table::HealthRow;
