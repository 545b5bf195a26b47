//! Ordered trace of state entries and exits.
//!
//! The engine appends one record per enter/exit, in execution order. The
//! trace is how tests (and hosts) observe that exits happen deepest-first
//! and entries ancestor-first; it is also handy diagnostic output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a trace record marks an entry or an exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceAction {
    /// The state became active.
    Entered,
    /// The state became inactive.
    Exited,
}

/// One enter/exit record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Name of the state.
    pub state: String,
    /// Entry or exit.
    pub action: TraceAction,
    /// When the record was made.
    pub timestamp: DateTime<Utc>,
}

impl TraceRecord {
    pub(crate) fn entered(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            action: TraceAction::Entered,
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn exited(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            action: TraceAction::Exited,
            timestamp: Utc::now(),
        }
    }
}

/// Ordered, append-only trace of a machine run.
///
/// `record` returns a new trace with the record added; the engine swaps
/// the new value in, so an observer holding a clone sees a stable
/// snapshot.
///
/// # Example
///
/// ```rust
/// use microstep::trace::{MachineTrace, TraceAction};
///
/// let trace = MachineTrace::new();
/// assert!(trace.records().is_empty());
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MachineTrace {
    records: Vec<TraceRecord>,
}

impl MachineTrace {
    /// Create an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, returning the extended trace.
    pub(crate) fn record(&self, record: TraceRecord) -> Self {
        let mut records = self.records.clone();
        records.push(record);
        Self { records }
    }

    /// All records in execution order.
    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    /// The trace as `(state, action)` pairs, convenient for assertions.
    pub fn sequence(&self) -> Vec<(&str, TraceAction)> {
        self.records
            .iter()
            .map(|r| (r.state.as_str(), r.action))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_preserves_order() {
        let trace = MachineTrace::new()
            .record(TraceRecord::entered("root"))
            .record(TraceRecord::entered("a"))
            .record(TraceRecord::exited("a"));

        assert_eq!(
            trace.sequence(),
            vec![
                ("root", TraceAction::Entered),
                ("a", TraceAction::Entered),
                ("a", TraceAction::Exited),
            ]
        );
    }

    #[test]
    fn record_does_not_mutate_the_original() {
        let trace = MachineTrace::new();
        let extended = trace.record(TraceRecord::entered("a"));
        assert_eq!(trace.records().len(), 0);
        assert_eq!(extended.records().len(), 1);
    }

    #[test]
    fn trace_serializes() {
        let trace = MachineTrace::new().record(TraceRecord::entered("a"));
        let json = serde_json::to_string(&trace).unwrap();
        let back: MachineTrace = serde_json::from_str(&json).unwrap();
        assert_eq!(back.records().len(), 1);
        assert_eq!(back.records()[0].state, "a");
    }
}
