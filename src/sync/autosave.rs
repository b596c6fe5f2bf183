//! Debounced, single-flight persistence of edited payroll results.
//!
//! Each employee gets one worker task. Edits only signal the worker; the
//! worker owns the debounce deadline, performs every write itself and so
//! never has two writes outstanding for the same employee.
//!
//! ```text
//!   idle --change/debounce--> saving --ok--> saved --display window--> idle
//!                               |
//!                               +--err--> error --retry--> saving
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use strum_macros::{AsRefStr, Display};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use super::tracker::{DirtyTracker, PendingFlush};
use crate::error::{AutosaveError, StoreError};
use crate::model::SnapshotUpdate;
use crate::store::SnapshotSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AutosaveStatus {
    Idle,
    Saving,
    Saved,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutosaveState {
    pub employee_no: String,
    pub status: AutosaveStatus,
    pub last_error: Option<String>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub last_saved_at: Option<DateTime<Utc>>,
    pub snapshot_id: Option<String>,
    /// Successful writes since the worker started.
    pub writes: u64,
}

impl AutosaveState {
    pub fn idle(employee_no: &str) -> Self {
        Self {
            employee_no: employee_no.to_string(),
            status: AutosaveStatus::Idle,
            last_error: None,
            last_saved_at: None,
            snapshot_id: None,
            writes: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum FlushOutcome {
    /// Nothing differed from the persisted baseline; no write issued.
    Clean,
    Saved { writes: u32 },
}

#[derive(Debug, Clone)]
pub struct AutosaveSettings {
    pub debounce: Duration,
    pub saved_display: Duration,
}

impl Default for AutosaveSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(800),
            saved_display: Duration::from_millis(1500),
        }
    }
}

type Reply = oneshot::Sender<Result<FlushOutcome, AutosaveError>>;

enum Command {
    Changed,
    FlushNow(Reply),
    Retry(Reply),
}

#[derive(Clone)]
struct WorkerHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<AutosaveState>,
    cancel: CancellationToken,
}

pub struct AutosaveScheduler {
    tracker: Arc<DirtyTracker>,
    sink: Arc<dyn SnapshotSink>,
    settings: AutosaveSettings,
    workers: Mutex<HashMap<String, WorkerHandle>>,
}

impl AutosaveScheduler {
    pub fn new(
        tracker: Arc<DirtyTracker>,
        sink: Arc<dyn SnapshotSink>,
        settings: AutosaveSettings,
    ) -> Self {
        Self {
            tracker,
            sink,
            settings,
            workers: Mutex::new(HashMap::new()),
        }
    }

    fn workers(&self) -> MutexGuard<'_, HashMap<String, WorkerHandle>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn existing(&self, employee_no: &str) -> Option<WorkerHandle> {
        self.workers().get(employee_no).cloned()
    }

    fn worker(&self, employee_no: &str) -> WorkerHandle {
        let mut workers = self.workers();
        if let Some(handle) = workers.get(employee_no) {
            if !handle.commands.is_closed() {
                return handle.clone();
            }
        }

        let (commands, receiver) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(AutosaveState::idle(employee_no));
        let cancel = CancellationToken::new();
        let worker = Worker {
            employee_no: employee_no.to_string(),
            tracker: Arc::clone(&self.tracker),
            sink: Arc::clone(&self.sink),
            settings: self.settings.clone(),
            state: state_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(worker.run(receiver));
        debug!(employee_no, "Autosave worker started");

        let handle = WorkerHandle {
            commands,
            state,
            cancel,
        };
        workers.insert(employee_no.to_string(), handle.clone());
        handle
    }

    /// Signals that a new result was recorded for this employee.
    pub fn on_change(&self, employee_no: &str) {
        if self.existing(employee_no).is_none() && !self.tracker.is_dirty(employee_no) {
            return;
        }
        let handle = self.worker(employee_no);
        if handle.commands.send(Command::Changed).is_err() {
            warn!(employee_no, "Autosave worker gone; change not scheduled");
        }
    }

    /// Cancels any pending debounce and writes the latest result now.
    pub async fn flush_now(&self, employee_no: &str) -> Result<FlushOutcome, AutosaveError> {
        if self.existing(employee_no).is_none() && !self.tracker.is_dirty(employee_no) {
            return Ok(FlushOutcome::Clean);
        }
        self.request(employee_no, Command::FlushNow).await
    }

    /// The only way out of the error state.
    pub async fn retry(&self, employee_no: &str) -> Result<FlushOutcome, AutosaveError> {
        if self.existing(employee_no).is_none() && !self.tracker.is_dirty(employee_no) {
            return Ok(FlushOutcome::Clean);
        }
        self.request(employee_no, Command::Retry).await
    }

    async fn request(
        &self,
        employee_no: &str,
        command: fn(Reply) -> Command,
    ) -> Result<FlushOutcome, AutosaveError> {
        let handle = self.worker(employee_no);
        let (reply, outcome) = oneshot::channel();
        handle
            .commands
            .send(command(reply))
            .map_err(|_| AutosaveError::WorkerGone(employee_no.to_string()))?;
        outcome
            .await
            .map_err(|_| AutosaveError::WorkerGone(employee_no.to_string()))?
    }

    pub fn state(&self, employee_no: &str) -> Option<AutosaveState> {
        self.existing(employee_no)
            .map(|handle| handle.state.borrow().clone())
    }

    /// Cancels the worker without flushing. Used once the employee's data
    /// has been removed: a write already in flight is not followed by a
    /// recreate or by further chained writes.
    pub fn stop(&self, employee_no: &str) {
        if let Some(handle) = self.workers().remove(employee_no) {
            handle.cancel.cancel();
            debug!(employee_no, "Autosave worker stopped");
        }
    }

    /// Flushes every employee that has a worker. Used on shutdown.
    pub async fn flush_all(&self) -> Vec<(String, Result<FlushOutcome, AutosaveError>)> {
        let mut employees: Vec<String> = self.workers().keys().cloned().collect();
        employees.sort();

        let mut outcomes = Vec::with_capacity(employees.len());
        for employee_no in employees {
            let outcome = self.flush_now(&employee_no).await;
            if let Err(e) = &outcome {
                warn!(employee_no = %employee_no, error = %e, "Flush on shutdown failed");
            }
            outcomes.push((employee_no, outcome));
        }
        outcomes
    }
}

struct Worker {
    employee_no: String,
    tracker: Arc<DirtyTracker>,
    sink: Arc<dyn SnapshotSink>,
    settings: AutosaveSettings,
    state: watch::Sender<AutosaveState>,
    cancel: CancellationToken,
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl Worker {
    async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut debounce_at: Option<Instant> = None;
        let mut idle_at: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(employee_no = %self.employee_no, "Autosave worker cancelled");
                    return;
                }
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    match command {
                        Command::Changed => {
                            debounce_at = if self.status() != AutosaveStatus::Error
                                && self.tracker.is_dirty(&self.employee_no)
                            {
                                Some(Instant::now() + self.settings.debounce)
                            } else {
                                None
                            };
                        }
                        Command::FlushNow(reply) => {
                            debounce_at = None;
                            let outcome = if self.status() == AutosaveStatus::Error
                                && self.tracker.is_dirty(&self.employee_no)
                            {
                                Err(AutosaveError::RetryRequired(self.employee_no.clone()))
                            } else {
                                self.flush(&mut idle_at).await
                            };
                            let _ = reply.send(outcome);
                        }
                        Command::Retry(reply) => {
                            debounce_at = None;
                            let outcome = self.flush(&mut idle_at).await;
                            let _ = reply.send(outcome);
                        }
                    }
                }
                _ = sleep_until_some(debounce_at) => {
                    debounce_at = None;
                    let _ = self.flush(&mut idle_at).await;
                }
                _ = sleep_until_some(idle_at) => {
                    idle_at = None;
                    if self.status() == AutosaveStatus::Saved {
                        self.set_status(AutosaveStatus::Idle);
                    }
                }
            }
        }

        // handle dropped: do not strand an edit that was still waiting
        if self.status() != AutosaveStatus::Error && self.tracker.is_dirty(&self.employee_no) {
            let _ = self.flush(&mut idle_at).await;
        }
        debug!(employee_no = %self.employee_no, "Autosave worker exited");
    }

    fn status(&self) -> AutosaveStatus {
        self.state.borrow().status
    }

    fn set_status(&self, status: AutosaveStatus) {
        self.state.send_modify(|s| s.status = status);
        debug!(employee_no = %self.employee_no, status = %status, "Autosave status");
    }

    fn dirty_pending(&self) -> Option<PendingFlush> {
        if self.tracker.is_dirty(&self.employee_no) {
            self.tracker.pending(&self.employee_no)
        } else {
            None
        }
    }

    /// Writes the newest result, then keeps writing while edits that landed
    /// during the write leave the employee dirty.
    async fn flush(&self, idle_at: &mut Option<Instant>) -> Result<FlushOutcome, AutosaveError> {
        let mut writes = 0u32;

        while let Some(pending) = self.dirty_pending() {
            if self.cancel.is_cancelled() {
                return Err(AutosaveError::WorkerGone(self.employee_no.clone()));
            }
            self.set_status(AutosaveStatus::Saving);

            match self.write(&pending).await {
                Ok(None) => {
                    info!(employee_no = %self.employee_no, "Snapshot deleted during autosave; dropping edits");
                    return Err(AutosaveError::WorkerGone(self.employee_no.clone()));
                }
                Ok(Some(snapshot_id)) => {
                    info!(
                        employee_no = %self.employee_no,
                        snapshot_id = %snapshot_id,
                        hash = %pending.hash,
                        "Payroll autosaved"
                    );
                    self.tracker
                        .mark_synced(&self.employee_no, pending.hash, snapshot_id.clone());
                    self.state.send_modify(|s| {
                        s.snapshot_id = Some(snapshot_id);
                        s.writes += 1;
                    });
                    writes += 1;
                }
                Err(e) => {
                    error!(employee_no = %self.employee_no, error = %e, "Autosave failed");
                    *idle_at = None;
                    let message = e.to_string();
                    self.state.send_modify(|s| {
                        s.status = AutosaveStatus::Error;
                        s.last_error = Some(message.clone());
                    });
                    return Err(AutosaveError::Persistence {
                        employee_no: self.employee_no.clone(),
                        message,
                    });
                }
            }
        }

        if writes == 0 {
            if self.status() == AutosaveStatus::Error {
                self.state.send_modify(|s| {
                    s.status = AutosaveStatus::Idle;
                    s.last_error = None;
                });
            }
            return Ok(FlushOutcome::Clean);
        }

        self.state.send_modify(|s| {
            s.status = AutosaveStatus::Saved;
            s.last_error = None;
            s.last_saved_at = Some(Utc::now());
        });
        *idle_at = Some(Instant::now() + self.settings.saved_display);
        Ok(FlushOutcome::Saved { writes })
    }

    /// Returns the stored id, or `None` when the employee was removed while
    /// the write was outstanding.
    async fn write(&self, pending: &PendingFlush) -> Result<Option<String>, StoreError> {
        if let Some(id) = &pending.snapshot_id {
            let updated = self
                .sink
                .update(id, SnapshotUpdate::Full(pending.result.clone()))
                .await?;
            if let Some(snapshot) = updated {
                return Ok(Some(snapshot.id));
            }
            if self.cancel.is_cancelled() || !self.tracker.is_known(&self.employee_no) {
                return Ok(None);
            }
            warn!(employee_no = %self.employee_no, snapshot_id = %id, "Snapshot missing; recreating");
        }

        let created = self.sink.create(pending.result.clone()).await?;
        Ok(Some(created.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PayrollSnapshot, SalaryInput, SalaryResult};
    use crate::payroll::PayrollCalculator;
    use crate::store::testing::RecordingSink;
    use tokio::time::sleep;

    fn result(no: &str, salary: f64) -> SalaryResult {
        PayrollCalculator::default().compute(&SalaryInput::new(no, "An", salary))
    }

    fn setup(sink: RecordingSink) -> (Arc<DirtyTracker>, Arc<RecordingSink>, AutosaveScheduler) {
        let tracker = Arc::new(DirtyTracker::new());
        let sink = Arc::new(sink);
        let scheduler = AutosaveScheduler::new(
            Arc::clone(&tracker),
            sink.clone(),
            AutosaveSettings::default(),
        );
        (tracker, sink, scheduler)
    }

    fn status(scheduler: &AutosaveScheduler, no: &str) -> AutosaveStatus {
        scheduler.state(no).map(|s| s.status).unwrap_or(AutosaveStatus::Idle)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_edits_coalesces_into_one_write_of_the_latest() {
        let (tracker, sink, scheduler) = setup(RecordingSink::new());
        tracker.record(result("E-1", 1_000_000.0));

        for salary in 2..=6 {
            tracker.record(result("E-1", salary as f64 * 1_000_000.0));
            scheduler.on_change("E-1");
            sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(sink.writes(), 0);

        sleep(Duration::from_millis(1000)).await;
        assert_eq!(sink.writes(), 1);
        assert_eq!(sink.last_salary(), Some(6_000_000.0));
        assert_eq!(status(&scheduler, "E-1"), AutosaveStatus::Saved);
        assert!(!tracker.is_dirty("E-1"));

        sleep(Duration::from_secs(2)).await;
        assert_eq!(status(&scheduler, "E-1"), AutosaveStatus::Idle);
        assert_eq!(sink.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clean_employee_flush_is_a_no_op() {
        let (tracker, sink, scheduler) = setup(RecordingSink::new());
        tracker.record(result("E-1", 1_000_000.0));

        assert_eq!(scheduler.flush_now("E-1").await.unwrap(), FlushOutcome::Clean);
        assert_eq!(scheduler.flush_now("ghost").await.unwrap(), FlushOutcome::Clean);
        scheduler.on_change("E-1");
        sleep(Duration::from_secs(2)).await;
        assert_eq!(sink.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_now_replaces_pending_timer() {
        let (tracker, sink, scheduler) = setup(RecordingSink::new());
        tracker.record(result("E-1", 1_000_000.0));
        tracker.record(result("E-1", 2_000_000.0));
        scheduler.on_change("E-1");

        let outcome = scheduler.flush_now("E-1").await.unwrap();
        assert_eq!(outcome, FlushOutcome::Saved { writes: 1 });
        assert_eq!(sink.writes(), 1);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(sink.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn edit_during_write_is_chained_not_overlapped() {
        let (tracker, sink, scheduler) =
            setup(RecordingSink::new().with_delay(Duration::from_millis(500)));
        tracker.record(result("E-1", 1_000_000.0));
        tracker.record(result("E-1", 2_000_000.0));
        scheduler.on_change("E-1");

        // debounce fires at 800ms, write is outstanding until 1300ms
        sleep(Duration::from_millis(900)).await;
        assert_eq!(status(&scheduler, "E-1"), AutosaveStatus::Saving);
        tracker.record(result("E-1", 3_000_000.0));
        scheduler.on_change("E-1");

        sleep(Duration::from_secs(3)).await;
        assert_eq!(sink.writes(), 2);
        assert_eq!(sink.max_in_flight(), 1);
        assert_eq!(sink.last_salary(), Some(3_000_000.0));
        assert!(!tracker.is_dirty("E-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_parks_in_error_until_manual_retry() {
        let (tracker, sink, scheduler) = setup(RecordingSink::new());
        sink.fail_for("E-1");
        tracker.record(result("E-1", 1_000_000.0));
        tracker.record(result("E-1", 2_000_000.0));
        scheduler.on_change("E-1");

        sleep(Duration::from_secs(1)).await;
        let state = scheduler.state("E-1").unwrap();
        assert_eq!(state.status, AutosaveStatus::Error);
        assert!(state.last_error.is_some());

        // further edits are tracked but not written automatically
        tracker.record(result("E-1", 3_000_000.0));
        scheduler.on_change("E-1");
        sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.attempts(), 1);
        assert!(matches!(
            scheduler.flush_now("E-1").await,
            Err(AutosaveError::RetryRequired(_))
        ));
        assert_eq!(sink.attempts(), 1);

        sink.recover("E-1");
        let outcome = scheduler.retry("E-1").await.unwrap();
        assert_eq!(outcome, FlushOutcome::Saved { writes: 1 });
        assert_eq!(sink.last_salary(), Some(3_000_000.0));
        let state = scheduler.state("E-1").unwrap();
        assert_eq!(state.status, AutosaveStatus::Saved);
        assert!(state.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_of_one_employee_does_not_block_another() {
        let (tracker, sink, scheduler) = setup(RecordingSink::new());
        sink.fail_for("BAD");
        for no in ["BAD", "OK"] {
            tracker.record(result(no, 1_000_000.0));
            tracker.record(result(no, 2_000_000.0));
            scheduler.on_change(no);
        }

        sleep(Duration::from_secs(1)).await;
        assert_eq!(status(&scheduler, "BAD"), AutosaveStatus::Error);
        assert_eq!(status(&scheduler, "OK"), AutosaveStatus::Saved);
        assert_eq!(sink.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_snapshot_is_recreated() {
        let (tracker, sink, scheduler) = setup(RecordingSink::new());
        tracker.seed_from_snapshot(&PayrollSnapshot {
            id: "deleted-elsewhere".into(),
            result: result("E-1", 1_000_000.0),
        });
        tracker.record(result("E-1", 2_000_000.0));

        scheduler.flush_now("E-1").await.unwrap();
        let all = sink.inner().list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_ne!(all[0].id, "deleted-elsewhere");
        assert_eq!(tracker.snapshot_id("E-1"), Some(all[0].id.clone()));
    }

    #[tokio::test(start_paused = true)]
    async fn second_write_updates_the_same_snapshot() {
        let (tracker, sink, scheduler) = setup(RecordingSink::new());
        tracker.record(result("E-1", 1_000_000.0));
        tracker.record(result("E-1", 2_000_000.0));
        scheduler.flush_now("E-1").await.unwrap();
        let first_id = tracker.snapshot_id("E-1").unwrap();

        tracker.record(result("E-1", 3_000_000.0));
        scheduler.flush_now("E-1").await.unwrap();
        assert_eq!(tracker.snapshot_id("E-1").unwrap(), first_id);
        assert_eq!(sink.inner().list().await.unwrap().len(), 1);
        assert_eq!(scheduler.state("E-1").unwrap().writes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_all_writes_every_dirty_employee() {
        let (tracker, sink, scheduler) = setup(RecordingSink::new());
        for no in ["E-1", "E-2"] {
            tracker.record(result(no, 1_000_000.0));
            tracker.record(result(no, 2_000_000.0));
            scheduler.on_change(no);
        }

        let outcomes = scheduler.flush_all().await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|(_, o)| matches!(o, Ok(FlushOutcome::Saved { .. }))));
        assert_eq!(sink.writes(), 2);
    }
}
