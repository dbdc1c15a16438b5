use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::store::{Document, DocumentStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub admin: AdminCredentials,
    pub session_ttl_hours: i64,
    pub paciente_lookup_timeout: Duration,
}

#[derive(Clone)]
pub struct AdminCredentials {
    pub usuario: String,
    /// Argon2 PHC string; the plain password never reaches the process.
    pub senha_hash: String,
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub usuario: String,
    pub senha: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub data: LoginResponseData,
}

#[derive(Debug, Serialize)]
pub struct LoginResponseData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub data: MeResponseData,
}

#[derive(Debug, Serialize)]
pub struct MeResponseData {
    pub usuario: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub data: OkData,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        OkResponse {
            data: OkData { ok: true },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub data: CreatedData,
}

#[derive(Debug, Serialize)]
pub struct CreatedData {
    #[serde(rename = "_id")]
    pub id: Uuid,
}

impl CreatedResponse {
    pub fn new(id: Uuid) -> Self {
        CreatedResponse {
            data: CreatedData { id },
        }
    }
}

/// A raw document together with its id, for endpoints that return collection
/// contents as-is (vendas, paciente detail).
#[derive(Debug, Serialize)]
pub struct DocView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(flatten)]
    pub doc: Document,
}

/* -------------------------
   Domain documents
--------------------------*/

/// Consulta document as persisted. Every field is optional at read time: the
/// collection predates this service and holds partial documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Consulta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paciente_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo_consulta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observacoes: Option<String>,
}

/// Session document for the admin token, hashed form only.
#[derive(Debug, Serialize, Deserialize)]
pub struct Session {
    pub token_hash: String,
    pub usuario: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/* -------------------------
   Patient reference
--------------------------*/

/// Patient reference as stored on a consulta: a raw string that may be
/// absent, malformed, or a well-formed id that matches no patient. Parsed
/// once at the boundary so downstream code matches on the variant instead of
/// failing on a bad id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatientRef {
    Missing,
    Invalid(String),
    Id(Uuid),
}

impl PatientRef {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => PatientRef::Missing,
            Some(s) => match Uuid::parse_str(s) {
                Ok(id) => PatientRef::Id(id),
                Err(_) => PatientRef::Invalid(s.to_string()),
            },
        }
    }
}

/* -------------------------
   Enriched consulta view
--------------------------*/

pub const PACIENTE_NAO_ENCONTRADO: &str = "Paciente não encontrado";

/// Listing shape: absent or blank optionals are normalized to fixed
/// placeholders so the frontend never renders an empty cell.
#[derive(Debug, Clone, Serialize)]
pub struct ConsultaView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub tipo_consulta: String,
    pub data: String,
    pub horario: String,
    pub paciente_nome: String,
    pub observacoes: String,
}

impl ConsultaView {
    pub fn new(id: Uuid, consulta: Consulta, paciente_nome: String) -> Self {
        ConsultaView {
            id,
            tipo_consulta: text_or(consulta.tipo_consulta, "N/A"),
            data: text_or(consulta.data, "N/A"),
            horario: text_or(consulta.horario, "N/A"),
            paciente_nome,
            observacoes: text_or(consulta.observacoes, "-"),
        }
    }
}

fn text_or(value: Option<String>, fallback: &str) -> String {
    match value {
        Some(s) if !s.trim().is_empty() => s,
        _ => fallback.to_string(),
    }
}

/* -------------------------
   Helpers
--------------------------*/

pub fn doc_str(doc: &Document, field: &str) -> Option<String> {
    doc.get(field).and_then(Value::as_str).map(str::to_string)
}
