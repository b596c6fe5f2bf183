use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::model::{PayrollSnapshot, SalaryResult};

/// Fields that change on every computation or carry storage identity only.
const VOLATILE_FIELDS: [&str; 2] = ["calculatedAt", "id"];

/// Content hash of a result or snapshot, ignoring volatile fields.
pub fn content_hash<T: Serialize>(value: &T) -> String {
    let mut json = serde_json::to_value(value).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut json {
        for field in VOLATILE_FIELDS {
            map.remove(field);
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(json.to_string().as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

#[derive(Debug, Default)]
struct EntryState {
    last_synced_hash: Option<String>,
    pending_hash: Option<String>,
    pending: Option<SalaryResult>,
    snapshot_id: Option<String>,
}

/// The newest local result for an employee, read at flush time.
#[derive(Debug, Clone)]
pub struct PendingFlush {
    pub result: SalaryResult,
    pub hash: String,
    pub snapshot_id: Option<String>,
}

/// Per-employee record of what was last persisted versus what was last
/// computed. Only the autosave scheduler and the edit session write here.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    entries: Mutex<HashMap<String, EntryState>>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, EntryState>> {
        // bookkeeping only; a panicked writer cannot leave a torn entry
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_known(&self, employee_no: &str) -> bool {
        self.entries().contains_key(employee_no)
    }

    /// Takes the server copy as the persisted baseline. A clean entry also
    /// adopts it as its local result; unsaved edits are left pending.
    pub fn seed_from_snapshot(&self, snapshot: &PayrollSnapshot) {
        let hash = content_hash(&snapshot.result);
        let mut entries = self.entries();
        let entry = entries.entry(snapshot.employee_no().to_string()).or_default();

        let clean = entry.pending_hash.is_none() || entry.pending_hash == entry.last_synced_hash;
        if clean {
            entry.pending = Some(snapshot.result.clone());
            entry.pending_hash = Some(hash.clone());
        }
        entry.last_synced_hash = Some(hash);
        entry.snapshot_id = Some(snapshot.id.clone());
    }

    /// Records a fresh computation and reports whether the employee is now
    /// dirty. The first computation for an employee with no persisted
    /// baseline becomes the baseline.
    pub fn record(&self, result: SalaryResult) -> bool {
        let hash = content_hash(&result);
        let mut entries = self.entries();
        let entry = entries.entry(result.employee_no.clone()).or_default();

        if entry.last_synced_hash.is_none() {
            entry.last_synced_hash = Some(hash.clone());
        }
        let dirty = entry.last_synced_hash.as_deref() != Some(hash.as_str());
        entry.pending_hash = Some(hash);
        entry.pending = Some(result);
        dirty
    }

    pub fn is_dirty(&self, employee_no: &str) -> bool {
        self.entries()
            .get(employee_no)
            .is_some_and(|e| e.pending_hash.is_some() && e.pending_hash != e.last_synced_hash)
    }

    pub fn pending(&self, employee_no: &str) -> Option<PendingFlush> {
        let entries = self.entries();
        let entry = entries.get(employee_no)?;
        Some(PendingFlush {
            result: entry.pending.clone()?,
            hash: entry.pending_hash.clone()?,
            snapshot_id: entry.snapshot_id.clone(),
        })
    }

    /// No-op for an employee that was forgotten while the write was out.
    pub fn mark_synced(&self, employee_no: &str, hash: String, snapshot_id: String) {
        if let Some(entry) = self.entries().get_mut(employee_no) {
            entry.last_synced_hash = Some(hash);
            entry.snapshot_id = Some(snapshot_id);
        }
    }

    pub fn snapshot_id(&self, employee_no: &str) -> Option<String> {
        self.entries()
            .get(employee_no)
            .and_then(|e| e.snapshot_id.clone())
    }

    pub fn forget(&self, employee_no: &str) {
        self.entries().remove(employee_no);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SalaryInput;
    use crate::payroll::PayrollCalculator;

    fn compute(no: &str, salary: f64) -> SalaryResult {
        PayrollCalculator::default().compute(&SalaryInput::new(no, "An", salary))
    }

    #[test]
    fn hash_ignores_timestamp_and_id() {
        let a = compute("E-1", 1_000_000.0);
        let mut b = a.clone();
        b.calculated_at = "1999-01-01T00:00:00.000Z".into();
        assert_eq!(content_hash(&a), content_hash(&b));

        let snapshot = PayrollSnapshot {
            id: "abc".into(),
            result: a.clone(),
        };
        assert_eq!(content_hash(&snapshot), content_hash(&a));

        b.bonus = 1.0;
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn first_computation_becomes_baseline() {
        let tracker = DirtyTracker::new();
        assert!(!tracker.record(compute("E-1", 1_000_000.0)));
        assert!(!tracker.is_dirty("E-1"));

        assert!(tracker.record(compute("E-1", 2_000_000.0)));
        assert!(tracker.is_dirty("E-1"));

        // editing back to the baseline is clean again
        assert!(!tracker.record(compute("E-1", 1_000_000.0)));
    }

    #[test]
    fn server_snapshot_seeds_baseline() {
        let tracker = DirtyTracker::new();
        let snapshot = PayrollSnapshot {
            id: "s-1".into(),
            result: compute("E-1", 3_000_000.0),
        };
        tracker.seed_from_snapshot(&snapshot);
        assert!(!tracker.is_dirty("E-1"));
        assert_eq!(tracker.snapshot_id("E-1").as_deref(), Some("s-1"));

        assert!(!tracker.record(compute("E-1", 3_000_000.0)));
        assert!(tracker.record(compute("E-1", 4_000_000.0)));
    }

    #[test]
    fn pending_survives_sync_of_older_hash() {
        let tracker = DirtyTracker::new();
        tracker.record(compute("E-1", 1.0));
        tracker.record(compute("E-1", 2.0));
        let in_flight = tracker.pending("E-1").unwrap();

        // edit lands while the write is outstanding
        tracker.record(compute("E-1", 3.0));
        tracker.mark_synced("E-1", in_flight.hash, "s-1".into());

        assert!(tracker.is_dirty("E-1"));
        let next = tracker.pending("E-1").unwrap();
        assert_eq!(next.result.salary, 3.0);
        assert_eq!(next.snapshot_id.as_deref(), Some("s-1"));
    }

    #[test]
    fn reseed_of_clean_entry_adopts_server_copy() {
        let tracker = DirtyTracker::new();
        let stored = PayrollSnapshot {
            id: "s-1".into(),
            result: compute("E-1", 3_000_000.0),
        };
        tracker.seed_from_snapshot(&stored);
        assert!(!tracker.record(compute("E-1", 3_000_000.0)));

        let mut patched = stored.clone();
        patched.result = compute("E-1", 5_000_000.0);
        tracker.seed_from_snapshot(&patched);

        assert!(!tracker.is_dirty("E-1"));
        assert_eq!(tracker.pending("E-1").unwrap().result.salary, 5_000_000.0);
    }

    #[test]
    fn reseed_keeps_unsaved_edit_pending() {
        let tracker = DirtyTracker::new();
        let stored = PayrollSnapshot {
            id: "s-1".into(),
            result: compute("E-1", 3_000_000.0),
        };
        tracker.seed_from_snapshot(&stored);
        assert!(tracker.record(compute("E-1", 4_000_000.0)));

        let mut patched = stored.clone();
        patched.result = compute("E-1", 5_000_000.0);
        tracker.seed_from_snapshot(&patched);

        assert!(tracker.is_dirty("E-1"));
        assert_eq!(tracker.pending("E-1").unwrap().result.salary, 4_000_000.0);
    }

    #[test]
    fn sync_of_forgotten_employee_is_ignored() {
        let tracker = DirtyTracker::new();
        tracker.record(compute("E-1", 1.0));
        tracker.forget("E-1");
        tracker.mark_synced("E-1", "sha256:00".into(), "s-1".into());
        assert!(!tracker.is_known("E-1"));
    }

    #[test]
    fn unknown_employee_is_clean() {
        let tracker = DirtyTracker::new();
        assert!(!tracker.is_dirty("ghost"));
        assert!(tracker.pending("ghost").is_none());
    }
}
