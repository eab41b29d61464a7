mod db;
mod domain;
mod middleware;
mod services;
mod state;
mod voice;
mod web;

use crate::state::SharedState;
use axum::{routing::get_service, Router};
use base64::{engine::general_purpose, Engine as _};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, services::ServeFile, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL missing");
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("Failed to run database migrations: {}", e);
        e
    })?;

    let session_key_b64 = std::env::var("SESSION_KEY").expect("SESSION_KEY missing");
    let session_key = general_purpose::STANDARD
        .decode(session_key_b64)
        .expect("SESSION_KEY must be base64");

    let ai = Arc::new(services::ai::AiService::new(
        std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY missing"),
    ));

    let voice: Option<Arc<dyn voice::VoiceClient>> = match voice::VapiClient::from_env() {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!("Voice collaborator disabled: {}", e);
            None
        }
    };
    let webhook_secret = std::env::var("VAPI_WEBHOOK_SECRET").ok();

    let shared: SharedState = Arc::new(state::AppState {
        pool,
        ai,
        voice,
        session_key,
        webhook_secret,
        calls: Arc::new(tokio::sync::RwLock::new(Default::default())),
    });

    // Hourly sweep of terminal call sessions.
    let scheduler = JobScheduler::new().await?;
    let shared_for_sweep = shared.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            let state = shared_for_sweep.clone();
            Box::pin(async move {
                let removed = state
                    .calls
                    .write()
                    .await
                    .prune_terminal(chrono::Duration::hours(1));
                if removed > 0 {
                    tracing::info!("Swept {} terminal call sessions", removed);
                }
            })
        })?)
        .await?;
    scheduler.start().await?;

    let static_handler =
        ServeDir::new("static").not_found_service(ServeFile::new("static/index.html"));

    let app = Router::new()
        .merge(web::routes(shared.clone()))
        .nest_service("/static", ServeDir::new("static"))
        .fallback_service(get_service(static_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| {
        let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
        format!("0.0.0.0:{}", port)
    });
    tracing::info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
