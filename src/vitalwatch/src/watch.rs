use std::time::Duration;

use anyhow::anyhow;
use chrono::NaiveDateTime;
use tokio::{sync::watch, time::sleep};
use vitalwatch_algos::{HealthMonitor, SignalGenerator};
use vitalwatch_types::{HealthRecord, HealthSeries, Insight, ScoreResult};

/// Simulated live feed: a generated series that grows by `batch` readings per
/// poll and keeps only the most recent `num_days` worth of them.
pub struct Watcher<'a> {
    monitor: &'a HealthMonitor,
    generator: SignalGenerator,
    series: HealthSeries,
    window: usize,
    batch: usize,
}

/// Outcome of one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub latest: HealthRecord,
    pub score: ScoreResult,
    /// Insights about readings newer than the previous poll.
    pub insights: Vec<Insight>,
}

impl<'a> Watcher<'a> {
    pub fn new(
        monitor: &'a HealthMonitor,
        start: NaiveDateTime,
        batch: usize,
    ) -> anyhow::Result<Self> {
        if batch == 0 {
            return Err(anyhow!("batch must be at least 1"));
        }

        let config = monitor.config();
        let mut generator = monitor.generator()?;
        let series = generator.generate(start, config.num_days, config.interval)?;

        Ok(Self {
            monitor,
            generator,
            window: series.len(),
            series,
            batch,
        })
    }

    pub fn series(&self) -> &HealthSeries {
        &self.series
    }

    /// Appends one batch, drops the oldest readings beyond the window and
    /// re-analyzes what is left.
    pub fn poll(&mut self) -> anyhow::Result<Update> {
        let seen = self.series.last().map(|r| r.timestamp);
        self.generator
            .extend(&mut self.series, self.batch, self.monitor.config().interval)?;
        self.series.retain_last(self.window);

        let mut report = self.monitor.analyze(&self.series)?;
        let score = report
            .scores
            .pop()
            .ok_or_else(|| anyhow!("analysis returned no scores"))?;
        report
            .insights
            .retain(|insight| Some(insight.timestamp) > seen);

        Ok(Update {
            latest: report.summary.latest,
            score,
            insights: report.insights,
        })
    }

    /// Polls until `stop` turns true. A stop request also cuts the wait
    /// between two polls short. Returns the number of polls made.
    pub async fn run<F>(
        mut self,
        every: Duration,
        mut stop: watch::Receiver<bool>,
        mut on_update: F,
    ) -> anyhow::Result<usize>
    where
        F: FnMut(&Update),
    {
        let mut polls = 0;
        info!(
            "watching {} readings, polling every {:?}",
            self.series.len(),
            every
        );

        while !*stop.borrow() {
            let update = self.poll()?;
            polls += 1;
            on_update(&update);

            tokio::select! {
                _ = sleep(every) => {}
                changed = stop.changed() => {
                    // sender gone, nobody can stop us any more
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("stopped after {polls} polls");
        Ok(polls)
    }
}
