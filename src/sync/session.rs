use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::autosave::{AutosaveScheduler, AutosaveState, FlushOutcome};
use super::tracker::DirtyTracker;
use crate::error::{AutosaveError, StoreError};
use crate::model::{PayrollSnapshot, SalaryInput, SalaryResult};
use crate::payroll::PayrollCalculator;
use crate::store::SnapshotSink;

/// What happened to the employee that was being edited before a switch.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviousFlush {
    pub employee_no: String,
    pub outcome: Option<FlushOutcome>,
    pub error: Option<String>,
}

impl PreviousFlush {
    fn new(employee_no: String, outcome: Result<FlushOutcome, AutosaveError>) -> Self {
        match outcome {
            Ok(outcome) => Self {
                employee_no,
                outcome: Some(outcome),
                error: None,
            },
            Err(e) => Self {
                employee_no,
                outcome: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectOutcome {
    pub employee_no: String,
    /// Server copy, if one exists.
    pub snapshot: Option<PayrollSnapshot>,
    /// Local result not yet persisted (e.g. after a failed autosave).
    pub unsaved: Option<SalaryResult>,
    pub previous: Option<PreviousFlush>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditOutcome {
    pub result: SalaryResult,
    pub dirty: bool,
    pub autosave: AutosaveState,
    pub previous: Option<PreviousFlush>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub active: bool,
    pub dirty: bool,
    pub autosave: AutosaveState,
}

/// The single editing actor: tracks which employee is on the form and
/// makes sure their edits are flushed before another one takes over.
pub struct EditSession {
    calculator: Arc<PayrollCalculator>,
    tracker: Arc<DirtyTracker>,
    scheduler: Arc<AutosaveScheduler>,
    sink: Arc<dyn SnapshotSink>,
    active: Mutex<Option<String>>,
}

impl EditSession {
    pub fn new(
        calculator: Arc<PayrollCalculator>,
        tracker: Arc<DirtyTracker>,
        scheduler: Arc<AutosaveScheduler>,
        sink: Arc<dyn SnapshotSink>,
    ) -> Self {
        Self {
            calculator,
            tracker,
            scheduler,
            sink,
            active: Mutex::new(None),
        }
    }

    pub async fn active(&self) -> Option<String> {
        self.active.lock().await.clone()
    }

    pub async fn select(&self, employee_no: &str) -> Result<SelectOutcome, StoreError> {
        let mut active = self.active.lock().await;
        let previous = self.leave_current(active.as_deref(), employee_no).await;
        let snapshot = self.load_baseline(employee_no).await?;
        *active = Some(employee_no.to_string());

        let unsaved = if self.tracker.is_dirty(employee_no) {
            self.tracker.pending(employee_no).map(|p| p.result)
        } else {
            None
        };

        Ok(SelectOutcome {
            employee_no: employee_no.to_string(),
            snapshot,
            unsaved,
            previous,
        })
    }

    /// Computes an edited input and schedules its autosave. Editing another
    /// employee than the active one switches to it first. `input` must
    /// already be validated.
    pub async fn edit(&self, input: &SalaryInput) -> Result<EditOutcome, StoreError> {
        let employee_no = input.employee_no.as_str();
        let mut active = self.active.lock().await;

        let mut previous = None;
        if active.as_deref() != Some(employee_no) {
            previous = self.leave_current(active.as_deref(), employee_no).await;
            self.load_baseline(employee_no).await?;
            *active = Some(employee_no.to_string());
        }

        let result = self.calculator.compute(input);
        let dirty = self.tracker.record(result.clone());
        self.scheduler.on_change(employee_no);
        drop(active);

        Ok(EditOutcome {
            result,
            dirty,
            autosave: self.autosave_state(employee_no),
            previous,
        })
    }

    pub async fn flush(&self, employee_no: &str) -> Result<FlushOutcome, AutosaveError> {
        self.scheduler.flush_now(employee_no).await
    }

    pub async fn retry(&self, employee_no: &str) -> Result<FlushOutcome, AutosaveError> {
        info!(employee_no, "Manual autosave retry");
        self.scheduler.retry(employee_no).await
    }

    pub async fn status(&self, employee_no: &str) -> SessionStatus {
        SessionStatus {
            active: self.active().await.as_deref() == Some(employee_no),
            dirty: self.tracker.is_dirty(employee_no),
            autosave: self.autosave_state(employee_no),
        }
    }

    /// Drops all local state for an employee whose snapshot was removed.
    pub async fn forget(&self, employee_no: &str) {
        let mut active = self.active.lock().await;
        self.tracker.forget(employee_no);
        self.scheduler.stop(employee_no);
        if active.as_deref() == Some(employee_no) {
            *active = None;
        }
    }

    fn autosave_state(&self, employee_no: &str) -> AutosaveState {
        self.scheduler
            .state(employee_no)
            .unwrap_or_else(|| AutosaveState::idle(employee_no))
    }

    async fn leave_current(&self, active: Option<&str>, next: &str) -> Option<PreviousFlush> {
        let current = active.filter(|current| *current != next)?;

        let outcome = self.scheduler.flush_now(current).await;
        if let Err(e) = &outcome {
            warn!(employee_no = current, error = %e, "Switched away with unsaved edits");
        }
        info!(from = current, to = next, "Switched employee");
        Some(PreviousFlush::new(current.to_string(), outcome))
    }

    async fn load_baseline(&self, employee_no: &str) -> Result<Option<PayrollSnapshot>, StoreError> {
        let snapshot = self.sink.find_by_employee_no(employee_no).await?;
        if !self.tracker.is_known(employee_no) {
            if let Some(snapshot) = &snapshot {
                self.tracker.seed_from_snapshot(snapshot);
            }
        }
        Ok(snapshot)
    }
}
