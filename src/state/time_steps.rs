//! Available time steps and the current time.
//!
//! The registry is the hand-off point between a resolved dataset and
//! whatever scrubs through time (slider, renderer). It knows time values
//! and their labels, never indices into a particular list.

use super::subject::{Subject, SubscriptionId};
use chrono::{DateTime, Utc};
use std::fmt;

/// Temporal resolution of a dataset, controlling how steps are labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeltaUnit {
    Year,
    Month,
    #[default]
    Day,
}

impl DeltaUnit {
    /// Parses a catalog delta unit. Unknown units are treated as daily.
    pub fn parse(unit: &str) -> Self {
        match unit.trim().to_lowercase().as_str() {
            "year" | "years" => DeltaUnit::Year,
            "month" | "months" => DeltaUnit::Month,
            _ => DeltaUnit::Day,
        }
    }

    /// `chrono` format string for step labels.
    pub fn format(&self) -> &'static str {
        match self {
            DeltaUnit::Year => "%Y",
            DeltaUnit::Month => "%Y-%m",
            DeltaUnit::Day => "%Y-%m-%d",
        }
    }

    /// Formats a time with this unit's label format.
    pub fn label(&self, time: &DateTime<Utc>) -> String {
        time.format(self.format()).to_string()
    }
}

impl fmt::Display for DeltaUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeltaUnit::Year => write!(f, "year"),
            DeltaUnit::Month => write!(f, "month"),
            DeltaUnit::Day => write!(f, "day"),
        }
    }
}

/// Converts UNIX seconds to a UTC time.
pub fn time_from_unix(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
}

/// ISO-8601 UTC representation used for channel labels and time bounds.
pub fn format_iso(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// One selectable point in time with its display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeStep {
    pub time: DateTime<Utc>,
    pub display_label: String,
}

impl TimeStep {
    pub fn new(time: DateTime<Utc>, unit: DeltaUnit) -> Self {
        Self {
            display_label: unit.label(&time),
            time,
        }
    }

    /// Builds labelled steps from UNIX seconds, skipping unrepresentable
    /// values.
    pub fn from_unix_points(points: &[i64], unit: DeltaUnit) -> Vec<TimeStep> {
        points
            .iter()
            .filter_map(|&secs| {
                let step = time_from_unix(secs).map(|t| TimeStep::new(t, unit));
                if step.is_none() {
                    log::warn!("Skipping out-of-range time point {}", secs);
                }
                step
            })
            .collect()
    }

    /// Label for sliders; falls back to the ISO time when none is set.
    pub fn label(&self) -> String {
        if self.display_label.is_empty() {
            format_iso(&self.time)
        } else {
            self.display_label.clone()
        }
    }
}

/// Holds available steps and the current time as replaying subjects.
#[derive(Clone)]
pub struct TimeStepRegistry {
    available: Subject<Option<Vec<TimeStep>>>,
    current: Subject<DateTime<Utc>>,
    unit: Subject<DeltaUnit>,
}

impl Default for TimeStepRegistry {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::default())
    }
}

impl TimeStepRegistry {
    pub fn new(initial_time: DateTime<Utc>) -> Self {
        Self {
            available: Subject::new(None),
            current: Subject::new(initial_time),
            unit: Subject::new(DeltaUnit::default()),
        }
    }

    /// Replaces the available steps. Does not touch the current time.
    pub fn set_available_steps(&self, steps: Vec<TimeStep>) {
        log::debug!("Publishing {} time step(s)", steps.len());
        self.available.set(Some(steps));
    }

    /// Removes all available steps.
    pub fn clear(&self) {
        self.available.set(None);
    }

    /// Clone of the available steps, if any were published.
    pub fn available_steps(&self) -> Option<Vec<TimeStep>> {
        self.available.get()
    }

    pub fn step_count(&self) -> usize {
        self.available
            .with(|steps| steps.as_ref().map(Vec::len).unwrap_or(0))
    }

    pub fn current(&self) -> DateTime<Utc> {
        self.current.get()
    }

    pub fn set_current(&self, time: DateTime<Utc>) {
        self.current.set(time);
    }

    pub fn set_time_format_from_unit(&self, unit: &str) {
        self.unit.set(DeltaUnit::parse(unit));
    }

    pub fn delta_unit(&self) -> DeltaUnit {
        self.unit.get()
    }

    /// Current time formatted with the active delta unit.
    pub fn current_label(&self) -> String {
        self.delta_unit().label(&self.current())
    }

    pub fn subscribe_available(
        &self,
        listener: impl Fn(&Option<Vec<TimeStep>>) + 'static,
    ) -> SubscriptionId {
        self.available.subscribe(listener)
    }

    pub fn subscribe_current(&self, listener: impl Fn(&DateTime<Utc>) + 'static) -> SubscriptionId {
        self.current.subscribe(listener)
    }

    pub fn unsubscribe_available(&self, id: SubscriptionId) -> bool {
        self.available.unsubscribe(id)
    }

    pub fn unsubscribe_current(&self, id: SubscriptionId) -> bool {
        self.current.unsubscribe(id)
    }
}
