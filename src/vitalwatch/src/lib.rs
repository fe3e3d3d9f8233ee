#[macro_use]
extern crate log;

mod export;
pub use export::CsvExporter;

mod options;
pub use options::AnalysisArgs;

mod watch;
pub use watch::{Update, Watcher};
