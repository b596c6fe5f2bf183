pub mod payroll;
pub mod salary;
pub mod session;

use actix_web::HttpResponse;
use serde_json::json;
use tracing::error;

use crate::error::{AutosaveError, PayrollError, StoreError, ValidationError};

pub(crate) fn validation_failed(errors: &[ValidationError]) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "message": "Invalid payroll input",
        "errors": errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
    }))
}

pub(crate) fn internal_error() -> HttpResponse {
    HttpResponse::InternalServerError().json(json!({
        "message": "Internal Server Error"
    }))
}

pub(crate) fn store_failed(e: StoreError) -> HttpResponse {
    error!(error = %e, "Snapshot store failure");
    internal_error()
}

pub(crate) fn payroll_failed(e: PayrollError) -> HttpResponse {
    match e {
        PayrollError::Invalid(errors) => validation_failed(&errors),
        PayrollError::UnknownField(_) | PayrollError::Json(_) => {
            HttpResponse::BadRequest().json(json!({ "message": e.to_string() }))
        }
        PayrollError::NotFound(_) => HttpResponse::NotFound().json(json!({
            "message": "Payroll snapshot not found"
        })),
        PayrollError::Store(e) => store_failed(e),
    }
}

pub(crate) fn autosave_failed(e: AutosaveError) -> HttpResponse {
    match &e {
        AutosaveError::RetryRequired(_) => {
            HttpResponse::Conflict().json(json!({ "message": e.to_string() }))
        }
        AutosaveError::Persistence { .. } | AutosaveError::WorkerGone(_) => {
            error!(error = %e, "Autosave failure");
            HttpResponse::InternalServerError().json(json!({ "message": e.to_string() }))
        }
    }
}
