use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use utoipa::ToSchema;

use super::validation_failed;
use crate::model::{SalaryInput, SalaryResult, TaxBracket};
use crate::state::AppState;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaxBracketsResponse {
    pub brackets: Vec<TaxBracket>,

    #[schema(example = 11000000.0)]
    pub personal_relief: f64,

    #[schema(example = 4400000.0)]
    pub dependent_relief_per_dependant: f64,
}

#[utoipa::path(
    post,
    path = "/api/salary/calculate",
    request_body = SalaryInput,
    responses(
        (status = 200, description = "Itemized payroll", body = SalaryResult),
        (status = 400, description = "Invalid input")
    ),
    tag = "Salary"
)]
pub async fn calculate(
    state: web::Data<AppState>,
    payload: web::Json<SalaryInput>,
) -> actix_web::Result<impl Responder> {
    if let Err(errors) = payload.validate() {
        return Ok(validation_failed(&errors));
    }

    let result = state.calculator.compute(&payload);
    state.calculations.record(result.clone());
    Ok(HttpResponse::Ok().json(result))
}

#[utoipa::path(
    get,
    path = "/api/salary/calculations",
    responses(
        (status = 200, description = "Every calculation since startup, oldest first", body = Vec<SalaryResult>)
    ),
    tag = "Salary"
)]
pub async fn list_calculations(state: web::Data<AppState>) -> actix_web::Result<impl Responder> {
    Ok(HttpResponse::Ok().json(state.calculations.all()))
}

#[utoipa::path(
    get,
    path = "/api/salary/tax-brackets",
    responses(
        (status = 200, body = TaxBracketsResponse)
    ),
    tag = "Salary"
)]
pub async fn tax_brackets(state: web::Data<AppState>) -> actix_web::Result<impl Responder> {
    let rules = state.calculator.rules();

    Ok(HttpResponse::Ok().json(TaxBracketsResponse {
        brackets: rules.tax_table.brackets().to_vec(),
        personal_relief: rules.personal_relief_default,
        dependent_relief_per_dependant: rules.dependent_relief_per_head,
    }))
}

#[cfg(test)]
mod tests {
    use crate::routes;
    use crate::state::AppState;
    use crate::store::MemorySnapshotStore;
    use actix_web::{App, http::StatusCode, test, web::Data};
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::new(
            Default::default(),
            Arc::new(MemorySnapshotStore::new()),
            Default::default(),
        )
    }

    #[actix_web::test]
    async fn calculate_returns_itemized_result() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(state()))
                .configure(routes::api_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/salary/calculate")
            .set_json(json!({
                "employeeNo": "VIVN-0001",
                "name": "Huỳnh Nguyễn Minh Hoàng",
                "salary": 10000000,
                "allowanceTax": 200000,
                "ot15": 10, "ot20": 5, "ot30": 2,
                "dependants": 2,
                "bonus": 500000
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["totalNetIncome"], 11361364.0);
        assert_eq!(body["overtimePayPIT"], 965909.0);
        assert_eq!(body["heSo"], 14.0);
    }

    #[actix_web::test]
    async fn calculate_rejects_negative_amounts() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(state()))
                .configure(routes::api_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/salary/calculate")
            .set_json(json!({"employeeNo": "E-1", "name": "An", "salary": -1}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["errors"].as_array().map(Vec::len), Some(1));
    }

    #[actix_web::test]
    async fn calculations_are_listed_after_calculate() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(state()))
                .configure(routes::api_routes),
        )
        .await;

        for (no, salary) in [("E-1", 10000000), ("E-2", -1), ("E-3", 20000000)] {
            let req = test::TestRequest::post()
                .uri("/salary/calculate")
                .set_json(json!({"employeeNo": no, "name": "An", "salary": salary}))
                .to_request();
            test::call_service(&app, req).await;
        }

        let req = test::TestRequest::get().uri("/salary/calculations").to_request();
        let body: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        let employees: Vec<&str> = body.iter().filter_map(|r| r["employeeNo"].as_str()).collect();
        assert_eq!(employees, ["E-1", "E-3"]);
    }

    #[actix_web::test]
    async fn tax_brackets_end_with_unbounded_limit() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(state()))
                .configure(routes::api_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/salary/tax-brackets").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        let brackets = body["brackets"].as_array().unwrap();
        assert_eq!(brackets.len(), 7);
        assert!(brackets[6]["limit"].is_null());
        assert_eq!(body["personalRelief"], 11000000.0);
    }
}
