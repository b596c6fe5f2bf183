use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display, EnumString, IntoStaticStr};
use utoipa::ToSchema;

use super::salary::SalaryResult;

/// Server-held copy of an employee's latest payroll result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PayrollSnapshot {
    #[schema(example = "4f8e0c1e-8c1a-4f59-9d7d-2a6f0e3c1b2a")]
    pub id: String,

    #[serde(flatten)]
    pub result: SalaryResult,
}

impl PayrollSnapshot {
    pub fn employee_no(&self) -> &str {
        &self.result.employee_no
    }

    /// Applies an update in place. Partial updates go through JSON so the
    /// same camelCase names and types as the wire format are enforced.
    pub fn apply(&mut self, update: SnapshotUpdate) -> Result<(), serde_json::Error> {
        match update {
            SnapshotUpdate::Full(result) => self.result = result,
            SnapshotUpdate::Partial(fields) => {
                let mut current = serde_json::to_value(&self.result)?;
                if let Value::Object(map) = &mut current {
                    for (key, value) in fields {
                        if !map.contains_key(&key) {
                            return Err(serde::de::Error::unknown_field(&key, &[]));
                        }
                        map.insert(key, value);
                    }
                }
                self.result = serde_json::from_value(current)?;
            }
        }
        Ok(())
    }
}

/// Body of a sink update: a whole replacement or a set of changed fields.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotUpdate {
    Full(SalaryResult),
    Partial(Map<String, Value>),
}

/// Fields that may be applied to every stored snapshot at once.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum BulkField {
    Bonus,
    PersonalRelief,
    DependentRelief,
    AllowanceTax,
}
