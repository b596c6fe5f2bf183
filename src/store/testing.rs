use async_trait::async_trait;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{MemorySnapshotStore, SnapshotSink};
use crate::error::StoreError;
use crate::model::{BulkField, PayrollSnapshot, SalaryResult, SnapshotUpdate};

/// Memory store that counts writes, can be slowed down, and can be made to
/// fail for chosen employees.
#[derive(Default)]
pub struct RecordingSink {
    inner: MemorySnapshotStore,
    delay: Option<Duration>,
    attempts: AtomicUsize,
    writes: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    last: Mutex<Option<SalaryResult>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn inner(&self) -> &MemorySnapshotStore {
        &self.inner
    }

    pub fn fail_for(&self, employee_no: &str) {
        self.failing.lock().unwrap().insert(employee_no.to_string());
    }

    pub fn recover(&self, employee_no: &str) {
        self.failing.lock().unwrap().remove(employee_no);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn last_salary(&self) -> Option<f64> {
        self.last.lock().unwrap().as_ref().map(|r| r.salary)
    }

    pub fn last_written(&self) -> Option<SalaryResult> {
        self.last.lock().unwrap().clone()
    }

    async fn guarded<T>(
        &self,
        result: &SalaryResult,
        write: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self.failing.lock().unwrap().contains(&result.employee_no);
        let outcome = if failing {
            Err(StoreError::Other("storage offline".into()))
        } else {
            write.await
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if outcome.is_ok() {
            self.writes.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(result.clone());
        }
        outcome
    }
}

#[async_trait]
impl SnapshotSink for RecordingSink {
    async fn create(&self, result: SalaryResult) -> Result<PayrollSnapshot, StoreError> {
        self.guarded(&result, self.inner.create(result.clone())).await
    }

    async fn get(&self, id: &str) -> Result<Option<PayrollSnapshot>, StoreError> {
        self.inner.get(id).await
    }

    async fn update(
        &self,
        id: &str,
        update: SnapshotUpdate,
    ) -> Result<Option<PayrollSnapshot>, StoreError> {
        let written = match &update {
            SnapshotUpdate::Full(result) => Some(result.clone()),
            SnapshotUpdate::Partial(_) => None,
        };
        match written {
            Some(result) => self.guarded(&result, self.inner.update(id, update)).await,
            None => self.inner.update(id, update).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.delete(id).await
    }

    async fn list(&self) -> Result<Vec<PayrollSnapshot>, StoreError> {
        self.inner.list().await
    }

    async fn bulk_update_field(&self, field: BulkField, value: f64) -> Result<u64, StoreError> {
        self.inner.bulk_update_field(field, value).await
    }
}
