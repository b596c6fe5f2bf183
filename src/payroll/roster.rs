use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::PayrollCalculator;
use crate::error::{PayrollError, ValidationError};
use crate::model::{BulkField, PayrollSnapshot, SalaryInput, SnapshotUpdate};
use crate::store::SnapshotSink;
use crate::store::memory::sample_input;
use crate::sync::{DirtyTracker, EditSession};

/// Input fields a client may change on a stored snapshot. The employee
/// number is the snapshot's identity and derived amounts are recomputed.
pub const PATCHABLE_FIELDS: [&str; 14] = [
    "name",
    "salary",
    "bonus",
    "allowanceTax",
    "ot15",
    "ot20",
    "ot30",
    "dependants",
    "advance",
    "actualDaysWorked",
    "totalWorkdays",
    "personalRelief",
    "dependentRelief",
    "augSalary",
];

/// Server-side operations on the stored payroll list. Every write goes
/// through the calculator; clients never supply derived fields.
pub struct Roster {
    calculator: Arc<PayrollCalculator>,
    sink: Arc<dyn SnapshotSink>,
    tracker: Arc<DirtyTracker>,
    session: Arc<EditSession>,
}

#[derive(Debug)]
pub struct ResetSummary {
    pub deleted: usize,
    pub seeded: Option<PayrollSnapshot>,
}

impl Roster {
    pub fn new(
        calculator: Arc<PayrollCalculator>,
        sink: Arc<dyn SnapshotSink>,
        tracker: Arc<DirtyTracker>,
        session: Arc<EditSession>,
    ) -> Self {
        Self {
            calculator,
            sink,
            tracker,
            session,
        }
    }

    pub async fn list(&self) -> Result<Vec<PayrollSnapshot>, PayrollError> {
        Ok(self.sink.list().await?)
    }

    pub async fn get(&self, id: &str) -> Result<PayrollSnapshot, PayrollError> {
        self.sink
            .get(id)
            .await?
            .ok_or_else(|| PayrollError::NotFound(id.to_string()))
    }

    /// Computes and stores an input. An existing snapshot for the same
    /// employee is replaced.
    pub async fn create(&self, input: &SalaryInput) -> Result<PayrollSnapshot, PayrollError> {
        input.validate().map_err(PayrollError::Invalid)?;

        let snapshot = self.sink.create(self.calculator.compute(input)).await?;
        self.tracker.seed_from_snapshot(&snapshot);
        info!(id = %snapshot.id, employee_no = %snapshot.employee_no(), "Payroll created");
        Ok(snapshot)
    }

    /// Merges changed input fields into a stored snapshot and recomputes it.
    pub async fn patch(
        &self,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<PayrollSnapshot, PayrollError> {
        if let Some(field) = fields.keys().find(|k| !PATCHABLE_FIELDS.contains(&k.as_str())) {
            return Err(PayrollError::UnknownField(field.clone()));
        }

        // the name feeds no formula, so a rename is stored as is
        if fields.len() == 1 && fields.contains_key("name") {
            return self.rename(id, fields).await;
        }

        let current = self.get(id).await?;
        let mut merged = match serde_json::to_value(self.calculator.input_from(&current.result))? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        merged.extend(fields);

        let input: SalaryInput = serde_json::from_value(Value::Object(merged))?;
        input.validate().map_err(PayrollError::Invalid)?;

        let result = self.calculator.compute(&input);
        let updated = self
            .sink
            .update(id, SnapshotUpdate::Full(result))
            .await?
            .ok_or_else(|| PayrollError::NotFound(id.to_string()))?;
        self.tracker.seed_from_snapshot(&updated);
        info!(id, employee_no = %updated.employee_no(), "Payroll patched");
        Ok(updated)
    }

    async fn rename(
        &self,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<PayrollSnapshot, PayrollError> {
        let blank = fields
            .get("name")
            .and_then(Value::as_str)
            .is_none_or(|name| name.trim().is_empty());
        if blank {
            return Err(PayrollError::Invalid(vec![ValidationError::Required("name")]));
        }

        let updated = self
            .sink
            .update(id, SnapshotUpdate::Partial(fields))
            .await?
            .ok_or_else(|| PayrollError::NotFound(id.to_string()))?;
        self.tracker.seed_from_snapshot(&updated);
        info!(id, employee_no = %updated.employee_no(), "Payroll renamed");
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<(), PayrollError> {
        let snapshot = self.get(id).await?;
        // stop autosave first so an in-flight write cannot bring it back
        self.session.forget(snapshot.employee_no()).await;
        if !self.sink.delete(id).await? {
            return Err(PayrollError::NotFound(id.to_string()));
        }
        info!(id, employee_no = %snapshot.employee_no(), "Payroll deleted");
        Ok(())
    }

    /// Sets one field on every snapshot, then recomputes each of them so no
    /// stored result is left inconsistent. Stored relief values are kept as
    /// overrides. Returns how many snapshots were touched.
    pub async fn bulk_apply(&self, field: BulkField, value: f64) -> Result<u64, PayrollError> {
        if !value.is_finite() || value < 0.0 {
            return Err(PayrollError::Invalid(vec![ValidationError::Negative {
                field: field.into(),
                value,
            }]));
        }

        let touched = self.sink.bulk_update_field(field, value).await?;

        for snapshot in self.sink.list().await? {
            let input = self.calculator.input_from(&snapshot.result);
            let result = self.calculator.compute(&input);
            match self.sink.update(&snapshot.id, SnapshotUpdate::Full(result)).await? {
                Some(updated) => self.tracker.seed_from_snapshot(&updated),
                None => warn!(id = %snapshot.id, "Snapshot vanished during bulk update"),
            }
        }

        info!(field = %field, value, touched, "Bulk update applied");
        Ok(touched)
    }

    /// Removes every snapshot and, when asked, stores the demo employee again.
    pub async fn reset(&self, reseed: bool) -> Result<ResetSummary, PayrollError> {
        let all = self.sink.list().await?;
        let mut deleted = 0;
        for snapshot in &all {
            self.session.forget(snapshot.employee_no()).await;
            if self.sink.delete(&snapshot.id).await? {
                deleted += 1;
            }
        }

        let seeded = if reseed {
            Some(self.create(&sample_input()).await?)
        } else {
            None
        };

        info!(deleted, reseed, "Payroll list reset");
        Ok(ResetSummary { deleted, seeded })
    }
}
