use std::{fs::File, io::BufReader, path::PathBuf};

use anyhow::{Context, anyhow};
use chrono::TimeDelta;
use clap::Args;
use vitalwatch_algos::{AnalysisConfig, ScoringWeights};

/// Analysis options shared by every subcommand. Values given here override
/// the ones read from `--config`.
#[derive(Debug, Default, Args)]
pub struct AnalysisArgs {
    /// JSON file holding an analysis config
    #[arg(long, env = "VITALWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,
    /// Number of days to generate
    #[arg(long, env = "VITALWATCH_DAYS", global = true)]
    pub days: Option<i64>,
    /// Seconds between two readings
    #[arg(long, env = "VITALWATCH_INTERVAL", global = true)]
    pub interval: Option<i64>,
    #[arg(long, env = "VITALWATCH_SEED", global = true)]
    pub seed: Option<u64>,
    /// Expected fraction of anomalous readings
    #[arg(long, env = "VITALWATCH_CONTAMINATION", global = true)]
    pub contamination: Option<f64>,
    /// Chance of injecting an anomaly into a generated reading
    #[arg(long, env = "VITALWATCH_ANOMALY_PROBABILITY", global = true)]
    pub anomaly_probability: Option<f64>,
    /// Score weights, e.g. `hr=0.5,spo2=0.5`
    #[arg(long, env = "VITALWATCH_WEIGHTS", global = true)]
    pub weights: Option<ScoringWeights>,
    /// Trailing readings the insight rules look at
    #[arg(long, env = "VITALWATCH_WINDOW", global = true)]
    pub window: Option<usize>,
}

impl AnalysisArgs {
    pub fn resolve(&self) -> anyhow::Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("opening config `{}`", path.display()))?;
                let config: AnalysisConfig = serde_json::from_reader(BufReader::new(file))
                    .with_context(|| format!("parsing config `{}`", path.display()))?;
                info!("loaded config from {}", path.display());
                config
            }
            None => AnalysisConfig::default(),
        };

        if let Some(days) = self.days {
            config.num_days = days;
        }
        if let Some(seconds) = self.interval {
            config.interval = TimeDelta::try_seconds(seconds)
                .ok_or_else(|| anyhow!("interval of {seconds}s is out of range"))?;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(contamination) = self.contamination {
            config.contamination = contamination;
        }
        if let Some(probability) = self.anomaly_probability {
            config.anomaly_probability = probability;
        }
        if let Some(weights) = self.weights {
            config.weights = weights;
        }
        if let Some(window) = self.window {
            config.recent_window = window;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;
    use tempfile::NamedTempFile;
    use vitalwatch_types::Metric;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[clap(flatten)]
        analysis: AnalysisArgs,
    }

    fn parse(args: &[&str]) -> AnalysisArgs {
        TestCli::try_parse_from(std::iter::once("vitalwatch").chain(args.iter().copied()))
            .unwrap()
            .analysis
    }

    #[test]
    fn defaults_without_options() {
        assert_eq!(
            AnalysisArgs::default().resolve().unwrap(),
            AnalysisConfig::default()
        );
    }

    #[test]
    fn command_line_overrides() {
        let config = parse(&[
            "--days",
            "7",
            "--interval",
            "900",
            "--seed",
            "3",
            "--weights",
            "hr=0.5,spo2=0.5",
            "--window",
            "12",
        ])
        .resolve()
        .unwrap();

        assert_eq!(config.num_days, 7);
        assert_eq!(config.interval, TimeDelta::minutes(15));
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.weights.get(Metric::HeartRate), 0.5);
        assert_eq!(config.weights.get(Metric::SleepQuality), 0.0);
        assert_eq!(config.recent_window, 12);
    }

    #[test]
    fn rejects_malformed_weights() {
        let cli = TestCli::try_parse_from(["vitalwatch", "--weights", "pulse=1"]);
        assert!(cli.is_err());
    }

    #[test]
    fn file_values_are_overridden() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"num_days": 3, "seed": 9, "contamination": 0.1}}"#).unwrap();

        let path = file.path().to_string_lossy().into_owned();
        let config = parse(&["--config", &path, "--seed", "10"])
            .resolve()
            .unwrap();

        assert_eq!(config.num_days, 3);
        assert_eq!(config.seed, Some(10));
        assert_eq!(config.contamination, 0.1);
        assert_eq!(config.interval, TimeDelta::hours(1));
    }

    #[test]
    fn malformed_config_file_is_reported() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{\"num_days\": ").unwrap();

        let args = AnalysisArgs {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let err = args.resolve().unwrap_err();
        assert!(err.to_string().contains("parsing config"), "{err}");
    }

    #[test]
    fn missing_config_file_is_reported() {
        let args = AnalysisArgs {
            config: Some(PathBuf::from("/nonexistent/vitalwatch.json")),
            ..Default::default()
        };
        let err = args.resolve().unwrap_err();
        assert!(err.to_string().contains("opening config"));
    }
}
