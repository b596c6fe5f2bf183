use crate::api::{payroll, salary, session};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::web;

pub type LimiterConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-IP limiter allowing `requests_per_min` with a burst of the same size.
pub fn build_limiter(requests_per_min: u32) -> Option<LimiterConfig> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        (60_000 / requests_per_min as u64).max(1)
    };
    GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
}

pub fn configure(cfg: &mut web::ServiceConfig, api_prefix: &str, limiter: &LimiterConfig) {
    cfg.service(
        web::scope(api_prefix)
            .wrap(Governor::new(limiter)) // rate limiting
            .configure(api_routes),
    );
}

pub fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/salary")
            // /salary/calculate
            .service(web::resource("/calculate").route(web::post().to(salary::calculate)))
            // /salary/calculations
            .service(
                web::resource("/calculations").route(web::get().to(salary::list_calculations)),
            )
            // /salary/tax-brackets
            .service(web::resource("/tax-brackets").route(web::get().to(salary::tax_brackets))),
    )
    .service(
        web::scope("/payroll")
            // /payroll
            .service(
                web::resource("")
                    .route(web::get().to(payroll::list_payrolls))
                    .route(web::post().to(payroll::create_payroll)),
            )
            // fixed paths before /payroll/{id}
            .service(web::resource("/bulk-update").route(web::patch().to(payroll::bulk_update)))
            .service(web::resource("/reset").route(web::post().to(payroll::reset_payrolls)))
            // /payroll/{id}
            .service(
                web::resource("/{id}")
                    .route(web::get().to(payroll::get_payroll))
                    .route(web::patch().to(payroll::patch_payroll))
                    .route(web::delete().to(payroll::delete_payroll)),
            ),
    )
    .service(
        web::scope("/session")
            .service(web::resource("/select").route(web::post().to(session::select_employee)))
            .service(web::resource("/edit").route(web::post().to(session::edit_employee)))
            // /session/{employee_no}/...
            .service(
                web::resource("/{employee_no}/flush").route(web::post().to(session::flush_employee)),
            )
            .service(
                web::resource("/{employee_no}/retry").route(web::post().to(session::retry_employee)),
            )
            .service(
                web::resource("/{employee_no}/status")
                    .route(web::get().to(session::employee_status)),
            ),
    );
}
