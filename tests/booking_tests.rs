use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use consultorio_server::error::ApiError;
use consultorio_server::routes::consulta_routes::{
    book_consulta, find_slot_taken, CadastroConsultaRequest,
};
use consultorio_server::store::{
    memory::MemoryStore, Document, DocumentStore, Filter, Stored, StoreError, CONSULTAS,
};

fn pedido(data: &str, horario: &str) -> CadastroConsultaRequest {
    CadastroConsultaRequest {
        paciente_id: None,
        data: data.to_string(),
        horario: horario.to_string(),
        tipo_consulta: Some("avaliação".to_string()),
        observacoes: None,
    }
}

fn consulta_doc(data: &str, horario: &str) -> Document {
    let mut doc = Document::new();
    doc.insert("data".into(), data.into());
    doc.insert("horario".into(), horario.into());
    doc
}

#[tokio::test]
async fn sequential_double_booking_keeps_one_record_and_conflicts() {
    let store = MemoryStore::new();

    book_consulta(&store, pedido("2025-03-10", "14:00"))
        .await
        .unwrap();

    let err = book_consulta(&store, pedido("2025-03-10", "14:00"))
        .await
        .unwrap_err();
    let ApiError::Conflict(code, message) = err else {
        panic!("expected a conflict, got {err:?}");
    };
    assert_eq!(code, "SLOT_TAKEN");
    // The message names the colliding date and time.
    assert!(message.contains("14:00"), "message: {message}");
    assert!(message.contains("2025-03-10"), "message: {message}");

    let stored = store.find(CONSULTAS, &Filter::all()).await.unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn same_time_on_another_day_is_not_a_conflict() {
    let store = MemoryStore::new();
    book_consulta(&store, pedido("2025-03-10", "14:00"))
        .await
        .unwrap();
    book_consulta(&store, pedido("2025-03-11", "14:00"))
        .await
        .unwrap();
    book_consulta(&store, pedido("2025-03-10", "15:00"))
        .await
        .unwrap();

    let stored = store.find(CONSULTAS, &Filter::all()).await.unwrap();
    assert_eq!(stored.len(), 3);
}

#[tokio::test]
async fn concurrent_double_booking_exactly_one_wins() {
    let store = MemoryStore::new();

    let (a, b) = tokio::join!(
        book_consulta(&store, pedido("2025-03-10", "14:00")),
        book_consulta(&store, pedido("2025-03-10", "14:00")),
    );

    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one booking may win: {a:?} / {b:?}");
    let loser = if a.is_err() { a } else { b };
    assert!(matches!(loser, Err(ApiError::Conflict(_, _))));

    let stored = store.find(CONSULTAS, &Filter::all()).await.unwrap();
    assert_eq!(stored.len(), 1);
}

// Both writers pass the pre-check before either inserts; the unique index is
// what turns the second insert away.
#[tokio::test]
async fn interleaved_check_then_insert_is_caught_by_the_unique_index() {
    let store = MemoryStore::new();

    assert!(find_slot_taken(&store, "2025-03-10", "14:00")
        .await
        .unwrap()
        .is_none());
    assert!(find_slot_taken(&store, "2025-03-10", "14:00")
        .await
        .unwrap()
        .is_none());

    store
        .insert_one(CONSULTAS, consulta_doc("2025-03-10", "14:00"))
        .await
        .unwrap();
    let err = store
        .insert_one(CONSULTAS, consulta_doc("2025-03-10", "14:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey(_)));
}

#[tokio::test]
async fn malformed_paciente_id_is_rejected_at_the_boundary() {
    let store = MemoryStore::new();
    let mut req = pedido("2025-03-10", "14:00");
    req.paciente_id = Some("not-an-id".to_string());

    let err = book_consulta(&store, req).await.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest("VALIDATION_ERROR", _)));
    assert!(store.find(CONSULTAS, &Filter::all()).await.unwrap().is_empty());
}

#[tokio::test]
async fn blank_slot_fields_are_rejected() {
    let store = MemoryStore::new();
    let err = book_consulta(&store, pedido("  ", "14:00")).await.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest("VALIDATION_ERROR", _)));
    let err = book_consulta(&store, pedido("2025-03-10", "")).await.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest("VALIDATION_ERROR", _)));
}

/// Store whose reads always fail, counting the inserts that get through.
struct BrokenReads {
    inner: MemoryStore,
    inserts: AtomicUsize,
}

impl BrokenReads {
    fn new() -> Self {
        BrokenReads {
            inner: MemoryStore::new(),
            inserts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DocumentStore for BrokenReads {
    async fn find_one(
        &self,
        _collection: &str,
        _filter: &Filter,
    ) -> Result<Option<Stored>, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Stored>, StoreError> {
        self.inner.find(collection, filter).await
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Uuid, StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_one(collection, doc).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        changes: Document,
    ) -> Result<u64, StoreError> {
        self.inner.update_one(collection, filter, changes).await
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.inner.delete_one(collection, filter).await
    }
}

#[tokio::test]
async fn failed_conflict_check_aborts_without_inserting() {
    let store = BrokenReads::new();

    let err = book_consulta(&store, pedido("2025-03-10", "14:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Internal(_)));
    assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
}
