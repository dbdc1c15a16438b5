// src/routes/consulta_routes.rs

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{
        ApiOk, AppState, Consulta, ConsultaView, CreatedResponse, OkResponse, PatientRef,
        PACIENTE_NAO_ENCONTRADO,
    },
    store::{
        from_document, to_document, Document, DocumentStore, Filter, Stored, StoreError,
        CONSULTAS, PACIENTES,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/consultas", get(list_consultas).post(create_consulta))
        .route(
            "/consultas/{consulta_id}",
            put(update_consulta).delete(delete_consulta),
        )
}

/* ============================================================
   GET /consultas  (enriched listing)
   ============================================================ */

pub async fn list_consultas(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<ConsultaView>>>, ApiError> {
    let consultas = state.store.find(CONSULTAS, &Filter::all()).await?;
    let views = enrich_consultas(
        Arc::clone(&state.store),
        consultas,
        state.paciente_lookup_timeout,
    )
    .await;
    Ok(Json(ApiOk { data: views }))
}

/// Resolve every consulta's patient display name. Lookups run concurrently;
/// the output keeps the input order whatever the completion order, and a
/// failed or slow lookup degrades that one entry to the placeholder name
/// instead of failing the listing.
pub async fn enrich_consultas(
    store: Arc<dyn DocumentStore>,
    consultas: Vec<Stored>,
    lookup_timeout: Duration,
) -> Vec<ConsultaView> {
    let lookups = consultas.into_iter().map(|stored| {
        let store = Arc::clone(&store);
        async move {
            let consulta: Consulta = from_document(stored.doc).unwrap_or_default();
            let paciente_nome = resolve_paciente_nome(
                store.as_ref(),
                consulta.paciente_id.as_deref(),
                lookup_timeout,
            )
            .await;
            ConsultaView::new(stored.id, consulta, paciente_nome)
        }
    });
    join_all(lookups).await
}

pub async fn resolve_paciente_nome(
    store: &dyn DocumentStore,
    paciente_id: Option<&str>,
    lookup_timeout: Duration,
) -> String {
    let id = match PatientRef::parse(paciente_id) {
        PatientRef::Missing => return PACIENTE_NAO_ENCONTRADO.to_string(),
        PatientRef::Invalid(raw) => {
            warn!("consulta references a malformed paciente id: {raw:?}");
            return PACIENTE_NAO_ENCONTRADO.to_string();
        }
        PatientRef::Id(id) => id,
    };

    let filter = Filter::by_id(id);
    let lookup = store.find_one(PACIENTES, &filter);
    match tokio::time::timeout(lookup_timeout, lookup).await {
        Err(_) => {
            warn!("paciente lookup {id} timed out after {lookup_timeout:?}");
            PACIENTE_NAO_ENCONTRADO.to_string()
        }
        Ok(Err(e)) => {
            warn!("paciente lookup {id} failed: {e}");
            PACIENTE_NAO_ENCONTRADO.to_string()
        }
        Ok(Ok(None)) => PACIENTE_NAO_ENCONTRADO.to_string(),
        Ok(Ok(Some(paciente))) => paciente
            .doc
            .get("nome")
            .and_then(Value::as_str)
            .filter(|nome| !nome.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| PACIENTE_NAO_ENCONTRADO.to_string()),
    }
}

/* ============================================================
   POST /consultas  (booking with slot-conflict check)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CadastroConsultaRequest {
    pub paciente_id: Option<String>,
    pub data: String,
    pub horario: String,
    pub tipo_consulta: Option<String>,
    pub observacoes: Option<String>,
}

pub async fn create_consulta(
    State(state): State<AppState>,
    _auth: AuthContext,
    Json(req): Json<CadastroConsultaRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let id = book_consulta(state.store.as_ref(), req).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse::new(id))))
}

/// Books a slot: the friendly pre-check produces the descriptive conflict
/// message, the store's unique index makes the outcome race-free. If the
/// check fails the insert is never attempted.
pub async fn book_consulta(
    store: &dyn DocumentStore,
    req: CadastroConsultaRequest,
) -> Result<Uuid, ApiError> {
    let data = req.data.trim().to_string();
    let horario = req.horario.trim().to_string();
    if data.is_empty() || horario.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "data e horario são obrigatórios".into(),
        ));
    }

    let paciente_id = match PatientRef::parse(req.paciente_id.as_deref()) {
        PatientRef::Invalid(raw) => {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                format!("paciente_id inválido: {raw}"),
            ));
        }
        PatientRef::Id(id) => Some(id.to_string()),
        PatientRef::Missing => None,
    };

    if find_slot_taken(store, &data, &horario).await?.is_some() {
        return Err(slot_taken(&data, &horario));
    }

    let consulta = Consulta {
        paciente_id,
        data: Some(data.clone()),
        horario: Some(horario.clone()),
        tipo_consulta: req.tipo_consulta,
        observacoes: req.observacoes,
    };

    match store.insert_one(CONSULTAS, to_document(&consulta)?).await {
        Ok(id) => {
            info!("consulta {id} booked for {data} {horario}");
            Ok(id)
        }
        // A concurrent booking took the slot between check and insert; the
        // unique index reports it and the caller gets the same answer as the
        // pre-check.
        Err(StoreError::DuplicateKey(_)) => Err(slot_taken(&data, &horario)),
        Err(e) => Err(e.into()),
    }
}

pub async fn find_slot_taken(
    store: &dyn DocumentStore,
    data: &str,
    horario: &str,
) -> Result<Option<Stored>, ApiError> {
    let filter = Filter::all().field("data", data).field("horario", horario);
    Ok(store.find_one(CONSULTAS, &filter).await?)
}

fn slot_taken(data: &str, horario: &str) -> ApiError {
    ApiError::Conflict(
        "SLOT_TAKEN",
        format!("Já existe uma consulta marcada nesse horário ({horario}) no dia {data}."),
    )
}

/* ============================================================
   PUT /consultas/{id}
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct AtualizarConsultaRequest {
    pub paciente_id: Option<String>,
    pub data: Option<String>,
    pub horario: Option<String>,
    pub tipo_consulta: Option<String>,
    pub observacoes: Option<String>,
}

pub async fn update_consulta(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(consulta_id): Path<Uuid>,
    Json(req): Json<AtualizarConsultaRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let mut changes = Document::new();

    if let Some(raw) = req.paciente_id.as_deref() {
        match PatientRef::parse(Some(raw)) {
            PatientRef::Invalid(raw) => {
                return Err(ApiError::BadRequest(
                    "VALIDATION_ERROR",
                    format!("paciente_id inválido: {raw}"),
                ));
            }
            PatientRef::Id(id) => {
                changes.insert("paciente_id".into(), id.to_string().into());
            }
            PatientRef::Missing => {}
        }
    }
    for (field, value) in [
        ("data", req.data),
        ("horario", req.horario),
        ("tipo_consulta", req.tipo_consulta),
        ("observacoes", req.observacoes),
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

    match state
        .store
        .update_one(CONSULTAS, &Filter::by_id(consulta_id), changes)
        .await
    {
        Ok(0) => Err(ApiError::NotFound(
            "NOT_FOUND",
            "Consulta não encontrada".into(),
        )),
        Ok(_) => {
            info!("consulta {consulta_id} updated");
            Ok(Json(OkResponse::ok()))
        }
        // Rescheduling onto an occupied slot.
        Err(StoreError::DuplicateKey(_)) => Err(ApiError::Conflict(
            "SLOT_TAKEN",
            "Já existe uma consulta marcada nesse horário.".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

/* ============================================================
   DELETE /consultas/{id}
   ============================================================ */

pub async fn delete_consulta(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(consulta_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    let deleted = state
        .store
        .delete_one(CONSULTAS, &Filter::by_id(consulta_id))
        .await?;
    if deleted == 0 {
        return Err(ApiError::NotFound(
            "NOT_FOUND",
            "Consulta não encontrada".into(),
        ));
    }
    info!("consulta {consulta_id} deleted");
    Ok(Json(OkResponse::ok()))
}
