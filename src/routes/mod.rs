use crate::models::AppState;
use axum::Router;

pub mod auth_routes;
pub mod consulta_routes;
pub mod paciente_routes;
pub mod venda_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/auth", auth_routes::router())
        .nest("/api/v1", consulta_routes::router())
        .nest("/api/v1", paciente_routes::router())
        .nest("/api/v1", venda_routes::router())
        .with_state(state)
}
