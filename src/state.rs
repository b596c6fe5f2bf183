use std::sync::Arc;

use crate::payroll::{CalculationLog, PayrollCalculator, Roster};
use crate::store::SnapshotSink;
use crate::sync::{AutosaveScheduler, AutosaveSettings, DirtyTracker, EditSession};

/// Everything the handlers share. Built once, before the server starts, so
/// every worker thread sees the same tracker and autosave workers.
#[derive(Clone)]
pub struct AppState {
    pub calculator: Arc<PayrollCalculator>,
    pub calculations: Arc<CalculationLog>,
    pub scheduler: Arc<AutosaveScheduler>,
    pub session: Arc<EditSession>,
    pub roster: Arc<Roster>,
}

impl AppState {
    pub fn new(
        calculator: PayrollCalculator,
        sink: Arc<dyn SnapshotSink>,
        settings: AutosaveSettings,
    ) -> Self {
        let calculator = Arc::new(calculator);
        let tracker = Arc::new(DirtyTracker::new());
        let scheduler = Arc::new(AutosaveScheduler::new(
            Arc::clone(&tracker),
            Arc::clone(&sink),
            settings,
        ));
        let session = Arc::new(EditSession::new(
            Arc::clone(&calculator),
            Arc::clone(&tracker),
            Arc::clone(&scheduler),
            Arc::clone(&sink),
        ));
        let roster = Arc::new(Roster::new(
            Arc::clone(&calculator),
            sink,
            tracker,
            Arc::clone(&session),
        ));

        Self {
            calculator,
            calculations: Arc::new(CalculationLog::default()),
            scheduler,
            session,
            roster,
        }
    }
}
