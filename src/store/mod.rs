//! Persistence endpoint for payroll snapshots.
//!
//! The autosave scheduler and the HTTP handlers only see [`SnapshotSink`];
//! which backend sits behind it is decided once at startup.

pub mod memory;
pub mod mysql;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{BulkField, PayrollSnapshot, SalaryResult, SnapshotUpdate};

pub use memory::MemorySnapshotStore;
pub use mysql::MySqlSnapshotStore;

#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Stores a result and assigns it an id. An existing snapshot for the
    /// same employee number is replaced and keeps its id.
    async fn create(&self, result: SalaryResult) -> Result<PayrollSnapshot, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<PayrollSnapshot>, StoreError>;

    /// `Ok(None)` when no snapshot has this id.
    async fn update(
        &self,
        id: &str,
        update: SnapshotUpdate,
    ) -> Result<Option<PayrollSnapshot>, StoreError>;

    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    async fn list(&self) -> Result<Vec<PayrollSnapshot>, StoreError>;

    /// Writes one field on every stored snapshot and returns how many were
    /// touched. Derived fields are not recomputed here.
    async fn bulk_update_field(&self, field: BulkField, value: f64) -> Result<u64, StoreError>;

    async fn find_by_employee_no(
        &self,
        employee_no: &str,
    ) -> Result<Option<PayrollSnapshot>, StoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|s| s.employee_no() == employee_no))
    }
}
