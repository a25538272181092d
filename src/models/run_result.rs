use crate::models::PriceAction;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Outcome of one repricing cycle
///
/// A failed cycle carries no actions and zero counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
    pub dry_run: bool,
    /// Proposed changes
    pub actions_count: usize,
    /// Changes accepted by the price writer
    pub applied_count: usize,
    pub error: Option<String>,
    /// Set when the actions could not be journaled
    pub journal_error: Option<String>,
    pub actions: Vec<PriceAction>,
}

impl RunResult {
    pub fn completed(
        started_at: NaiveDateTime,
        finished_at: NaiveDateTime,
        dry_run: bool,
        actions: Vec<PriceAction>,
    ) -> Self {
        let applied_count = actions.iter().filter(|a| a.applied).count();
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at,
            dry_run,
            actions_count: actions.len(),
            applied_count,
            error: None,
            journal_error: None,
            actions,
        }
    }

    pub fn failed(
        started_at: NaiveDateTime,
        finished_at: NaiveDateTime,
        dry_run: bool,
        error: impl Into<String>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at,
            dry_run,
            actions_count: 0,
            applied_count: 0,
            error: Some(error.into()),
            journal_error: None,
            actions: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.dry_run { "DRY-RUN" } else { "APPLIED" };
        let started = self.started_at.format("%Y-%m-%d %H:%M:%S");

        if let Some(error) = &self.error {
            return write!(
                f,
                "[{}] {} - ERROR: {} ({:.1}s)",
                mode,
                started,
                error,
                self.duration_secs()
            );
        }

        write!(f, "[{}] {} - {} changes", mode, started, self.actions_count)?;
        if !self.dry_run {
            write!(f, ", applied {}", self.applied_count)?;
        }
        if self.journal_error.is_some() {
            write!(f, ", NOT journaled")?;
        }
        write!(f, " ({:.1}s)", self.duration_secs())
    }
}
