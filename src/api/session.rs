use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::ToSchema;

use super::{autosave_failed, store_failed, validation_failed};
use crate::model::SalaryInput;
use crate::state::AppState;
use crate::sync::{EditOutcome, FlushOutcome, SelectOutcome, SessionStatus};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectEmployee {
    #[schema(example = "VIVN-0001")]
    pub employee_no: String,
}

#[utoipa::path(
    post,
    path = "/api/session/select",
    request_body = SelectEmployee,
    responses(
        (status = 200, description = "Employee is now being edited; previous one flushed first", body = SelectOutcome),
        (status = 400, description = "Missing employee number")
    ),
    tag = "Session"
)]
pub async fn select_employee(
    state: web::Data<AppState>,
    payload: web::Json<SelectEmployee>,
) -> actix_web::Result<impl Responder> {
    let employee_no = payload.employee_no.trim();
    if employee_no.is_empty() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "employeeNo is required"
        })));
    }

    match state.session.select(employee_no).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(outcome)),
        Err(e) => Ok(store_failed(e)),
    }
}

#[utoipa::path(
    post,
    path = "/api/session/edit",
    request_body = SalaryInput,
    responses(
        (status = 200, description = "Result recomputed and autosave scheduled", body = EditOutcome),
        (status = 400, description = "Invalid input")
    ),
    tag = "Session"
)]
pub async fn edit_employee(
    state: web::Data<AppState>,
    payload: web::Json<SalaryInput>,
) -> actix_web::Result<impl Responder> {
    if let Err(errors) = payload.validate() {
        return Ok(validation_failed(&errors));
    }

    match state.session.edit(&payload).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(outcome)),
        Err(e) => Ok(store_failed(e)),
    }
}

#[utoipa::path(
    post,
    path = "/api/session/{employee_no}/flush",
    params(
        ("employee_no", description = "Employee number")
    ),
    responses(
        (status = 200, body = FlushOutcome),
        (status = 409, description = "Autosave is in error state; retry required"),
        (status = 500, description = "Write failed")
    ),
    tag = "Session"
)]
pub async fn flush_employee(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    match state.session.flush(&path.into_inner()).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(outcome)),
        Err(e) => Ok(autosave_failed(e)),
    }
}

#[utoipa::path(
    post,
    path = "/api/session/{employee_no}/retry",
    params(
        ("employee_no", description = "Employee number")
    ),
    responses(
        (status = 200, body = FlushOutcome),
        (status = 500, description = "Write failed again")
    ),
    tag = "Session"
)]
pub async fn retry_employee(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    match state.session.retry(&path.into_inner()).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(outcome)),
        Err(e) => Ok(autosave_failed(e)),
    }
}

#[utoipa::path(
    get,
    path = "/api/session/{employee_no}/status",
    params(
        ("employee_no", description = "Employee number")
    ),
    responses(
        (status = 200, body = SessionStatus)
    ),
    tag = "Session"
)]
pub async fn employee_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let status = state.session.status(&path.into_inner()).await;
    Ok(HttpResponse::Ok().json(status))
}
