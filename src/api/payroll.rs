use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use utoipa::{IntoParams, ToSchema};

use super::payroll_failed;
use crate::model::{BulkField, PayrollSnapshot, SalaryInput};
use crate::state::AppState;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdate {
    #[schema(example = "personalRelief")]
    pub field: BulkField,

    #[schema(example = 11000000.0)]
    pub value: f64,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct ResetQuery {
    /// Store the demo employee again after clearing.
    #[schema(example = true)]
    pub reseed: Option<bool>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    pub deleted: usize,
    pub seeded: Option<PayrollSnapshot>,
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    responses(
        (status = 200, body = Vec<PayrollSnapshot>)
    ),
    tag = "Payroll"
)]
pub async fn list_payrolls(state: web::Data<AppState>) -> actix_web::Result<impl Responder> {
    match state.roster.list().await {
        Ok(all) => Ok(HttpResponse::Ok().json(all)),
        Err(e) => Ok(payroll_failed(e)),
    }
}

#[utoipa::path(
    post,
    path = "/api/payroll",
    request_body = SalaryInput,
    responses(
        (status = 201, description = "Payroll computed and stored", body = PayrollSnapshot),
        (status = 400, description = "Invalid input")
    ),
    tag = "Payroll"
)]
pub async fn create_payroll(
    state: web::Data<AppState>,
    payload: web::Json<SalaryInput>,
) -> actix_web::Result<impl Responder> {
    match state.roster.create(&payload).await {
        Ok(snapshot) => Ok(HttpResponse::Created().json(snapshot)),
        Err(e) => Ok(payroll_failed(e)),
    }
}

#[utoipa::path(
    get,
    path = "/api/payroll/{id}",
    params(
        ("id", description = "Snapshot ID")
    ),
    responses(
        (status = 200, body = PayrollSnapshot),
        (status = 404)
    ),
    tag = "Payroll"
)]
pub async fn get_payroll(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    match state.roster.get(&path.into_inner()).await {
        Ok(snapshot) => Ok(HttpResponse::Ok().json(snapshot)),
        Err(e) => Ok(payroll_failed(e)),
    }
}

#[utoipa::path(
    patch,
    path = "/api/payroll/{id}",
    request_body(content = Object, description = "Changed input fields, camelCase"),
    params(
        ("id", description = "Snapshot ID")
    ),
    responses(
        (status = 200, description = "Payroll recomputed", body = PayrollSnapshot),
        (status = 400, description = "Unknown field or invalid input"),
        (status = 404, description = "Payroll snapshot not found")
    ),
    tag = "Payroll"
)]
pub async fn patch_payroll(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<Map<String, Value>>,
) -> actix_web::Result<impl Responder> {
    match state.roster.patch(&path.into_inner(), body.into_inner()).await {
        Ok(snapshot) => Ok(HttpResponse::Ok().json(snapshot)),
        Err(e) => Ok(payroll_failed(e)),
    }
}

#[utoipa::path(
    delete,
    path = "/api/payroll/{id}",
    params(
        ("id", description = "Snapshot ID")
    ),
    responses(
        (status = 200, description = "Payroll deleted"),
        (status = 404, description = "Payroll snapshot not found")
    ),
    tag = "Payroll"
)]
pub async fn delete_payroll(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    match state.roster.delete(&path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "message": "Payroll deleted successfully"
        }))),
        Err(e) => Ok(payroll_failed(e)),
    }
}

#[utoipa::path(
    patch,
    path = "/api/payroll/bulk-update",
    request_body = BulkUpdate,
    responses(
        (status = 200, description = "Field applied to every snapshot and results recomputed"),
        (status = 400)
    ),
    tag = "Payroll"
)]
pub async fn bulk_update(
    state: web::Data<AppState>,
    payload: web::Json<BulkUpdate>,
) -> actix_web::Result<impl Responder> {
    match state.roster.bulk_apply(payload.field, payload.value).await {
        Ok(updated) => Ok(HttpResponse::Ok().json(json!({
            "message": format!("{} updated", payload.field),
            "updated": updated
        }))),
        Err(e) => Ok(payroll_failed(e)),
    }
}

#[utoipa::path(
    post,
    path = "/api/payroll/reset",
    params(ResetQuery),
    responses(
        (status = 200, body = ResetResponse)
    ),
    tag = "Payroll"
)]
pub async fn reset_payrolls(
    state: web::Data<AppState>,
    query: web::Query<ResetQuery>,
) -> actix_web::Result<impl Responder> {
    match state.roster.reset(query.reseed.unwrap_or(false)).await {
        Ok(summary) => Ok(HttpResponse::Ok().json(ResetResponse {
            deleted: summary.deleted,
            seeded: summary.seeded,
        })),
        Err(e) => Ok(payroll_failed(e)),
    }
}
