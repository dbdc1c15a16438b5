use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

// Collection names, as in the consultório database.
pub const PACIENTES: &str = "pacientes";
pub const CONSULTAS: &str = "consultas";
pub const VENDAS: &str = "vendas";
pub const SESSIONS: &str = "sessions";

pub type Document = Map<String, Value>;

/// A document together with its store-assigned identity.
#[derive(Debug, Clone)]
pub struct Stored {
    pub id: Uuid,
    pub doc: Document,
}

/// Equality filter: optional id plus field = value pairs. This is the only
/// filter shape the application uses.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub id: Option<Uuid>,
    pub fields: Document,
}

impl Filter {
    /// Matches every document in the collection.
    pub fn all() -> Self {
        Filter::default()
    }

    pub fn by_id(id: Uuid) -> Self {
        Filter {
            id: Some(id),
            fields: Document::new(),
        }
    }

    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate key in {0}")]
    DuplicateKey(String),
    #[error("db error: {0}")]
    Backend(String),
}

/// Gateway to the document database. One implementation per backend; the
/// handle is created once at startup and shared for the life of the process.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(&self, collection: &str, filter: &Filter)
        -> Result<Option<Stored>, StoreError>;

    /// All matches, in insertion order.
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Stored>, StoreError>;

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Uuid, StoreError>;

    /// Merges `changes` into the first match. Returns the number of matched
    /// documents (0 or 1).
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        changes: Document,
    ) -> Result<u64, StoreError>;

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(doc)) => Ok(doc),
        Ok(_) => Err(StoreError::Backend(
            "value did not serialize to an object".into(),
        )),
        Err(e) => Err(StoreError::Backend(format!("serialize error: {e}"))),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(doc))
        .map_err(|e| StoreError::Backend(format!("document decode error: {e}")))
}
