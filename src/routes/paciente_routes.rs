// src/routes/paciente_routes.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{doc_str, ApiOk, AppState, CreatedResponse, DocView, OkResponse},
    store::{to_document, Document, Filter, Stored, PACIENTES},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pacientes", get(list_pacientes).post(create_paciente))
        .route(
            "/pacientes/{paciente_id}",
            get(get_paciente)
                .put(update_paciente)
                .delete(delete_paciente),
        )
}

/* ============================================================
   DTOs
   ============================================================ */

// Canonical patient schema. The intake form posts everything as text; only
// the name is mandatory.
#[derive(Debug, Serialize, Deserialize)]
pub struct CadastroPacienteRequest {
    pub nome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_nascimento: Option<String>,
    #[serde(rename = "RG", skip_serializing_if = "Option::is_none")]
    pub rg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sobre: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AtualizarPacienteRequest {
    pub nome: Option<String>,
    pub idade: Option<String>,
    pub data_nascimento: Option<String>,
    #[serde(rename = "RG")]
    pub rg: Option<String>,
    pub telefone: Option<String>,
    pub sobre: Option<String>,
}

/// Listing projection: the fields the patient table shows, nothing else.
#[derive(Debug, Serialize)]
pub struct PacienteView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_nascimento: Option<String>,
    #[serde(rename = "RG", skip_serializing_if = "Option::is_none")]
    pub rg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sobre: Option<String>,
}

fn project(stored: Stored) -> PacienteView {
    PacienteView {
        id: stored.id,
        nome: doc_str(&stored.doc, "nome"),
        idade: doc_str(&stored.doc, "idade"),
        data_nascimento: doc_str(&stored.doc, "data_nascimento"),
        rg: doc_str(&stored.doc, "RG"),
        telefone: doc_str(&stored.doc, "telefone"),
        sobre: doc_str(&stored.doc, "sobre"),
    }
}

/* ============================================================
   Handlers
   ============================================================ */

pub async fn create_paciente(
    State(state): State<AppState>,
    _auth: AuthContext,
    Json(req): Json<CadastroPacienteRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    if req.nome.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "nome é obrigatório".into(),
        ));
    }

    let id = state
        .store
        .insert_one(PACIENTES, to_document(&req)?)
        .await?;
    info!("paciente {id} registered");
    Ok((StatusCode::CREATED, Json(CreatedResponse::new(id))))
}

pub async fn list_pacientes(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<PacienteView>>>, ApiError> {
    let pacientes = state.store.find(PACIENTES, &Filter::all()).await?;
    Ok(Json(ApiOk {
        data: pacientes.into_iter().map(project).collect(),
    }))
}

pub async fn get_paciente(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(paciente_id): Path<Uuid>,
) -> Result<Json<ApiOk<DocView>>, ApiError> {
    let stored = state
        .store
        .find_one(PACIENTES, &Filter::by_id(paciente_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "Paciente não encontrado".into()))?;

    Ok(Json(ApiOk {
        data: DocView {
            id: stored.id,
            doc: stored.doc,
        },
    }))
}

pub async fn update_paciente(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(paciente_id): Path<Uuid>,
    Json(req): Json<AtualizarPacienteRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let mut changes = Document::new();
    for (field, value) in [
        ("nome", req.nome),
        ("idade", req.idade),
        ("data_nascimento", req.data_nascimento),
        ("RG", req.rg),
        ("telefone", req.telefone),
        ("sobre", req.sobre),
    ] {
        if let Some(v) = value {
            let v = v.trim();
            if !v.is_empty() {
                changes.insert(field.into(), v.into());
            }
        }
    }

    if changes.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "nenhum campo para atualizar".into(),
        ));
    }

    let updated = state
        .store
        .update_one(PACIENTES, &Filter::by_id(paciente_id), changes)
        .await?;
    if updated == 0 {
        return Err(ApiError::NotFound(
            "NOT_FOUND",
            "Paciente não encontrado".into(),
        ));
    }
    info!("paciente {paciente_id} updated");
    Ok(Json(OkResponse::ok()))
}

pub async fn delete_paciente(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(paciente_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    let deleted = state
        .store
        .delete_one(PACIENTES, &Filter::by_id(paciente_id))
        .await?;
    if deleted == 0 {
        return Err(ApiError::NotFound(
            "NOT_FOUND",
            "Paciente não encontrado".into(),
        ));
    }
    info!("paciente {paciente_id} deleted");
    Ok(Json(OkResponse::ok()))
}
