use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::SnapshotSink;
use crate::error::StoreError;
use crate::model::{BulkField, PayrollSnapshot, SalaryInput, SalaryResult, SnapshotUpdate};
use crate::payroll::PayrollCalculator;

/// Process-local snapshot store, used when no database is configured.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<HashMap<String, PayrollSnapshot>>,
}

/// Demo employee loaded into an empty store.
pub fn sample_input() -> SalaryInput {
    SalaryInput {
        allowance_tax: 200_000.0,
        ot15: 10.0,
        ot20: 5.0,
        ot30: 2.0,
        dependants: 2.0,
        ..SalaryInput::new("VIVN-0001", "Huỳnh Nguyễn Minh Hoàng", 10_000_000.0)
    }
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_sample(calculator: &PayrollCalculator) -> Result<Self, StoreError> {
        let store = Self::new();
        store.create(calculator.compute(&sample_input())).await?;
        Ok(store)
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, PayrollSnapshot>>, StoreError> {
        self.snapshots.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, PayrollSnapshot>>, StoreError> {
        self.snapshots.write().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl SnapshotSink for MemorySnapshotStore {
    async fn create(&self, result: SalaryResult) -> Result<PayrollSnapshot, StoreError> {
        let mut snapshots = self.write()?;

        let id = snapshots
            .values()
            .find(|s| s.employee_no() == result.employee_no)
            .map(|s| s.id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let snapshot = PayrollSnapshot { id, result };
        debug!(id = %snapshot.id, employee_no = %snapshot.employee_no(), "Stored snapshot");
        snapshots.insert(snapshot.id.clone(), snapshot.clone());
        Ok(snapshot)
    }

    async fn get(&self, id: &str) -> Result<Option<PayrollSnapshot>, StoreError> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn update(
        &self,
        id: &str,
        update: SnapshotUpdate,
    ) -> Result<Option<PayrollSnapshot>, StoreError> {
        let mut snapshots = self.write()?;
        let Some(current) = snapshots.get(id) else {
            return Ok(None);
        };

        let mut next = current.clone();
        next.apply(update)?;
        snapshots.insert(id.to_string(), next.clone());
        Ok(Some(next))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.write()?.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<PayrollSnapshot>, StoreError> {
        let mut all: Vec<_> = self.read()?.values().cloned().collect();
        all.sort_by(|a, b| a.employee_no().cmp(b.employee_no()));
        Ok(all)
    }

    async fn bulk_update_field(&self, field: BulkField, value: f64) -> Result<u64, StoreError> {
        let mut snapshots = self.write()?;
        for snapshot in snapshots.values_mut() {
            let result = &mut snapshot.result;
            match field {
                BulkField::Bonus => result.bonus = value,
                BulkField::PersonalRelief => result.personal_relief = value,
                BulkField::DependentRelief => result.dependent_relief = value,
                BulkField::AllowanceTax => result.allowance_tax = value,
            }
        }
        Ok(snapshots.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payroll::PayrollRules;

    fn calculator() -> PayrollCalculator {
        PayrollCalculator::new(PayrollRules::default())
    }

    #[tokio::test]
    async fn create_keeps_identity_per_employee() {
        let store = MemorySnapshotStore::new();
        let calc = calculator();

        let first = store
            .create(calc.compute(&SalaryInput::new("E-1", "An", 1_000_000.0)))
            .await
            .unwrap();
        let second = store
            .create(calc.compute(&SalaryInput::new("E-1", "An", 2_000_000.0)))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].result.salary, 2_000_000.0);
    }

    #[tokio::test]
    async fn missing_ids_are_no_ops() {
        let store = MemorySnapshotStore::new();
        let result = calculator().compute(&SalaryInput::new("E-1", "An", 1.0));

        assert!(store.get("nope").await.unwrap().is_none());
        assert!(
            store
                .update("nope", SnapshotUpdate::Full(result))
                .await
                .unwrap()
                .is_none()
        );
        assert!(!store.delete("nope").await.unwrap());
    }

    #[tokio::test]
    async fn bulk_update_touches_every_snapshot() {
        let store = MemorySnapshotStore::new();
        let calc = calculator();
        for no in ["E-1", "E-2", "E-3"] {
            store
                .create(calc.compute(&SalaryInput::new(no, "X", 5_000_000.0)))
                .await
                .unwrap();
        }

        let count = store
            .bulk_update_field(BulkField::Bonus, 300_000.0)
            .await
            .unwrap();
        assert_eq!(count, 3);
        assert!(
            store
                .list()
                .await
                .unwrap()
                .iter()
                .all(|s| s.result.bonus == 300_000.0)
        );
    }

    #[tokio::test]
    async fn sample_store_holds_demo_employee() {
        let store = MemorySnapshotStore::with_sample(&calculator()).await.unwrap();
        let found = store.find_by_employee_no("VIVN-0001").await.unwrap().unwrap();
        assert_eq!(found.result.dependants, 2.0);
        assert!(store.find_by_employee_no("VIVN-9999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_snapshot() {
        let store = MemorySnapshotStore::new();
        let snap = store
            .create(calculator().compute(&SalaryInput::new("E-1", "An", 1.0)))
            .await
            .unwrap();
        assert!(store.delete(&snap.id).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }
}
