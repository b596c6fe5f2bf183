use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;

mod api;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod payroll;
mod routes;
mod state;
mod store;
mod sync;

use config::Config;
use db::init_db;
use payroll::PayrollCalculator;
use state::AppState;
use store::{MemorySnapshotStore, MySqlSnapshotStore, SnapshotSink};

use crate::docs::ApiDoc;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Payroll Sync"
}

async fn open_store(
    config: &Config,
    calculator: &PayrollCalculator,
) -> anyhow::Result<Arc<dyn SnapshotSink>> {
    match &config.database_url {
        Some(url) => {
            let pool = init_db(url).await.context("failed to connect to DATABASE_URL")?;
            let store = MySqlSnapshotStore::new(pool);
            store.ensure_schema().await.context("failed to prepare schema")?;
            if config.seed_sample_data && store.list().await?.is_empty() {
                store.create(calculator.compute(&store::memory::sample_input())).await?;
            }
            info!("Using MySQL snapshot store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set; snapshots are kept in memory only");
            let store = if config.seed_sample_data {
                MemorySnapshotStore::with_sample(calculator).await?
            } else {
                MemorySnapshotStore::new()
            };
            Ok(Arc::new(store))
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let calculator = PayrollCalculator::new(config.payroll_rules()?);
    let sink = open_store(&config, &calculator).await?;
    let state = AppState::new(calculator, sink, config.autosave());
    let scheduler = Arc::clone(&state.scheduler);

    let limiter = routes::build_limiter(config.rate_api_per_min)
        .context("invalid RATE_API_PER_MIN for rate limiter")?;
    let api_prefix = config.api_prefix.clone();
    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(state.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, &api_prefix, &limiter))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    // last chance for edits still waiting on their debounce
    for (employee_no, outcome) in scheduler.flush_all().await {
        match outcome {
            Ok(outcome) => info!(employee_no = %employee_no, ?outcome, "Flushed on shutdown"),
            Err(e) => warn!(employee_no = %employee_no, error = %e, "Unsaved edits lost on shutdown"),
        }
    }
    info!("Server stopped");
    Ok(())
}
