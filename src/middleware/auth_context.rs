use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use chrono::{DateTime, Utc};
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use crate::auth::hash_access_token;
use crate::error::ApiError;
use crate::models::{AppState, Session};
use crate::store::{from_document, Filter, SESSIONS};

/// The validated principal behind a request. Every collection route extracts
/// this; there is no anonymous surface beyond login itself.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub usuario: String,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            // Extract Authorization: Bearer <token>
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::session_expired())?;

            let token_hash = hash_access_token(authz.token());

            let stored = state
                .store
                .find_one(SESSIONS, &Filter::all().field("token_hash", token_hash))
                .await?
                .ok_or_else(ApiError::session_expired)?;

            let session: Session = from_document(stored.doc).map_err(|e| {
                tracing::error!("malformed session document {}: {e}", stored.id);
                ApiError::session_expired()
            })?;

            if session.expires_at <= Utc::now() {
                // Drop the stale session (best-effort)
                let _ = state
                    .store
                    .delete_one(SESSIONS, &Filter::by_id(stored.id))
                    .await;
                return Err(ApiError::session_expired());
            }

            Ok(AuthContext {
                usuario: session.usuario,
                session_id: stored.id,
                expires_at: session.expires_at,
            })
        }
    }
}
