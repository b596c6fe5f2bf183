use thiserror::Error;

/// Malformed pay input, caught at the request boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("{field} must be a non-negative number (got {value})")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be greater than zero (got {value})")]
    NonPositive { field: &'static str, value: f64 },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot store lock poisoned")]
    Poisoned,

    #[error("{0}")]
    Other(String),
}

/// Failures local to one employee's autosave state machine.
#[derive(Debug, Clone, Error)]
pub enum AutosaveError {
    #[error("failed to persist payroll for {employee_no}: {message}")]
    Persistence {
        employee_no: String,
        message: String,
    },

    #[error("autosave for {0} is in error state; retry required")]
    RetryRequired(String),

    #[error("autosave worker for {0} has stopped")]
    WorkerGone(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("tax table has no brackets")]
    EmptyTaxTable,

    #[error("last tax bracket must have an unbounded limit")]
    UnboundedTopBracketMissing,

    #[error("tax bracket {index} is not above the previous limit")]
    UnorderedBrackets { index: usize },

    #[error("tax bracket {index} has rate {rate} outside [0, 1]")]
    InvalidRate { index: usize, rate: f64 },

    #[error("tax bracket {index} has non-finite limit {limit}")]
    InvalidLimit { index: usize, limit: f64 },

    #[error("tax bracket {index} has invalid deduction {deduction}")]
    InvalidDeduction { index: usize, deduction: f64 },
}

/// Failures of the payroll roster operations behind the HTTP API.
#[derive(Debug, Error)]
pub enum PayrollError {
    #[error("invalid payroll input")]
    Invalid(Vec<ValidationError>),

    #[error("field {0} cannot be patched")]
    UnknownField(String),

    #[error("payroll snapshot {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),
}
