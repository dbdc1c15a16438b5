use std::sync::Arc;
use std::time::Duration;

use consultorio_server::{
    config::Config,
    models::{AdminCredentials, AppState},
    routes,
    store::postgres::PgStore,
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let store = PgStore::connect(&cfg.database_url).await?;

    let state = AppState {
        store: Arc::new(store),
        admin: AdminCredentials {
            usuario: cfg.admin_usuario,
            senha_hash: cfg.admin_senha_hash,
        },
        session_ttl_hours: cfg.session_ttl_hours,
        paciente_lookup_timeout: Duration::from_millis(cfg.paciente_lookup_timeout_ms),
    };

    // The static frontend is hosted separately and calls the API cross-origin,
    // so OPTIONS preflight must succeed here.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
