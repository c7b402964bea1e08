//! Folds ordered statistics results into a plot series.

use super::query::ResultStream;
use super::service::{LayerStatistics, QueryError};
use crate::raster::Unit;
use crate::state::{Subject, SubscriptionId, TimeStep};
use futures_util::{FutureExt, StreamExt};

/// One plotted value.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotDataPoint {
    /// Position of the source time step.
    pub time: usize,
    pub time_label: String,
    pub value: f64,
}

/// Axis settings of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSettings {
    pub x_limits: [usize; 2],
    pub y_limits: [f64; 2],
    pub y_label: String,
}

impl PlotSettings {
    pub fn new(unit: &Unit, step_count: usize) -> Self {
        let y_label = if unit.has_default_measurement() {
            String::new()
        } else {
            format!("Mean value of »{}«", unit.measurement)
        };
        Self {
            x_limits: [0, step_count.saturating_sub(1)],
            y_limits: [unit.min, unit.max],
            y_label,
        }
    }
}

/// Collects results of one query sequence at a time.
#[derive(Default)]
pub struct PlotSeriesAssembler {
    labels: Vec<String>,
    points: Vec<PlotDataPoint>,
    settings: Option<PlotSettings>,
    stream: Option<ResultStream>,
    error: Option<QueryError>,
    ongoing: Subject<bool>,
}

impl PlotSeriesAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new series, dropping any sequence still in flight.
    pub fn start(
        &mut self,
        settings: PlotSettings,
        time_steps: &[TimeStep],
        results: ResultStream,
    ) {
        if self.stream.take().is_some() {
            log::debug!("Dropping unfinished plot series");
        }
        self.labels = time_steps.iter().map(TimeStep::label).collect();
        self.points.clear();
        self.error = None;
        self.settings = Some(settings);
        self.stream = Some(results);
        self.ongoing.set(true);
    }

    /// Drops the running sequence and the series.
    pub fn cancel(&mut self) {
        let was_running = self.stream.take().is_some();
        self.labels.clear();
        self.points.clear();
        self.error = None;
        self.settings = None;
        if was_running {
            log::debug!("Plot series cancelled");
            self.ongoing.set(false);
        }
    }

    /// Applies every result that is already available. Never blocks.
    ///
    /// Returns the number of points added.
    pub fn poll(&mut self) -> usize {
        let before = self.points.len();
        while let Some(stream) = self.stream.as_mut() {
            let next = stream.next().now_or_never();
            match next {
                Some(Some(result)) => self.push(result),
                Some(None) => self.finish(),
                None => break,
            }
        }
        self.points.len() - before
    }

    /// Waits for the running sequence to finish.
    pub async fn run(&mut self) {
        while let Some(stream) = self.stream.as_mut() {
            let next = stream.next().await;
            match next {
                Some(result) => self.push(result),
                None => self.finish(),
            }
        }
    }

    pub fn points(&self) -> &[PlotDataPoint] {
        &self.points
    }

    pub fn settings(&self) -> Option<&PlotSettings> {
        self.settings.as_ref()
    }

    /// Error that ended the last series, if any.
    pub fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    pub fn is_ongoing(&self) -> bool {
        self.ongoing.get()
    }

    pub fn subscribe_ongoing(&self, listener: impl Fn(&bool) + 'static) -> SubscriptionId {
        self.ongoing.subscribe(listener)
    }

    fn push(&mut self, result: Result<LayerStatistics, QueryError>) {
        match result {
            Ok(stats) => {
                let time = self.points.len();
                let time_label = self.labels.get(time).cloned().unwrap_or_default();
                self.points.push(PlotDataPoint {
                    time,
                    time_label,
                    value: stats.mean(),
                });
            }
            Err(error) => {
                log::error!(
                    "Plot series stopped after {} point(s): {}",
                    self.points.len(),
                    error
                );
                self.error = Some(error);
                self.finish();
            }
        }
    }

    fn finish(&mut self) {
        self.stream = None;
        self.ongoing.set(false);
        if self.error.is_none() {
            log::info!("Plot series complete ({} point(s))", self.points.len());
        }
    }
}
