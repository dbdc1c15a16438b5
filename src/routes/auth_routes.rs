// src/routes/auth_routes.rs

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{Duration, Utc};
use tracing::info;

use crate::{
    auth::{generate_access_token, hash_access_token, verify_password},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{
        AppState, LoginRequest, LoginResponse, LoginResponseData, MeResponse, MeResponseData,
        OkResponse, Session,
    },
    store::{to_document, Filter, SESSIONS},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let usuario = req.usuario.trim();
    if usuario.is_empty() || req.senha.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "usuario e senha são obrigatórios".into(),
        ));
    }

    // Single administrator account; the credential pair comes from the
    // environment, verified against its Argon2 hash.
    if usuario != state.admin.usuario || !verify_password(&req.senha, &state.admin.senha_hash) {
        return Err(ApiError::invalid_credentials());
    }

    let access_token = generate_access_token();
    let now = Utc::now();
    let session = Session {
        token_hash: hash_access_token(&access_token),
        usuario: usuario.to_string(),
        expires_at: now + Duration::hours(state.session_ttl_hours),
        created_at: now,
    };

    let expires_at = session.expires_at;
    state
        .store
        .insert_one(SESSIONS, to_document(&session)?)
        .await?;
    info!("session opened for {usuario}");

    Ok(Json(LoginResponse {
        data: LoginResponseData {
            access_token,
            expires_at,
        },
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .store
        .delete_one(SESSIONS, &Filter::by_id(auth.session_id))
        .await?;
    info!("session {} closed", auth.session_id);
    Ok(Json(OkResponse::ok()))
}

pub async fn me(
    State(_state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<MeResponse>, ApiError> {
    Ok(Json(MeResponse {
        data: MeResponseData {
            usuario: auth.usuario,
            expires_at: auth.expires_at,
        },
    }))
}
