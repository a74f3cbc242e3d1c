use actix_web::middleware::NormalizePath;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use std::sync::Arc;

use presence::clock::SystemClock;
use presence::config::Config;
use presence::db::init_db;
use presence::docs::ApiDoc;
use presence::routes::{self, AppState};
use presence::store::MySqlStore;

use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Presence service"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "presence.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let pool = init_db(&config.database_url, config.run_migrations).await?;
    let store = Arc::new(MySqlStore::new(pool));

    let store_for_warmup = store.clone();
    let warmup_days = config.agent_cache_warmup_days;
    actix_web::rt::spawn(async move {
        if let Err(e) = store_for_warmup.warmup_agent_cache(warmup_days, 250).await {
            error!(error = ?e, "Failed to warm up agent cache");
        }
    });

    let state = AppState {
        presences: store.clone(),
        accounts: store,
        clock: Arc::new(SystemClock),
        config: config.clone(),
    };

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard matches the JS/CSS assets
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .service(index)
            .configure(|cfg| routes::configure(cfg, &state))
    })
    .bind(&config.server_addr)
    .with_context(|| format!("Failed to bind {}", config.server_addr))?
    .run()
    .await?;

    Ok(())
}
