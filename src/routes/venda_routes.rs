// src/routes/venda_routes.rs

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::info;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, CreatedResponse, DocView},
    store::{Document, Filter, VENDAS},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/vendas", get(list_vendas).post(create_venda))
}

// Vendas are free-form: the document is stored exactly as posted, identity
// excepted.
pub async fn create_venda(
    State(state): State<AppState>,
    _auth: AuthContext,
    Json(mut doc): Json<Document>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    doc.remove("_id");
    if doc.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "venda vazia".into(),
        ));
    }

    let id = state.store.insert_one(VENDAS, doc).await?;
    info!("venda {id} registered");
    Ok((StatusCode::CREATED, Json(CreatedResponse::new(id))))
}

pub async fn list_vendas(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<DocView>>>, ApiError> {
    let vendas = state.store.find(VENDAS, &Filter::all()).await?;
    Ok(Json(ApiOk {
        data: vendas
            .into_iter()
            .map(|stored| DocView {
                id: stored.id,
                doc: stored.doc,
            })
            .collect(),
    }))
}
