use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use consultorio_server::models::PACIENTE_NAO_ENCONTRADO;
use consultorio_server::routes::consulta_routes::{enrich_consultas, resolve_paciente_nome};
use consultorio_server::store::{
    memory::MemoryStore, Document, DocumentStore, Filter, Stored, StoreError, CONSULTAS,
    PACIENTES,
};

const TIMEOUT: Duration = Duration::from_secs(2);

fn doc(value: serde_json::Value) -> Document {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

async fn add_paciente(store: &MemoryStore, nome: &str) -> Uuid {
    store
        .insert_one(PACIENTES, doc(json!({ "nome": nome })))
        .await
        .unwrap()
}

async fn listed(store: Arc<dyn DocumentStore>) -> Vec<consultorio_server::models::ConsultaView> {
    let consultas = store.find(CONSULTAS, &Filter::all()).await.unwrap();
    enrich_consultas(store, consultas, TIMEOUT).await
}

#[tokio::test]
async fn resolves_the_referenced_patient_name() {
    let store = Arc::new(MemoryStore::new());
    let maria = add_paciente(&store, "Maria Souza").await;
    store
        .insert_one(
            CONSULTAS,
            doc(json!({
                "paciente_id": maria.to_string(),
                "data": "2025-03-10",
                "horario": "14:00",
                "tipo_consulta": "avaliação",
                "observacoes": "primeira consulta",
            })),
        )
        .await
        .unwrap();

    let views = listed(store).await;
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].paciente_nome, "Maria Souza");
    assert_eq!(views[0].tipo_consulta, "avaliação");
    assert_eq!(views[0].observacoes, "primeira consulta");
}

#[tokio::test]
async fn dangling_reference_falls_back_to_the_sentinel() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_one(
            CONSULTAS,
            doc(json!({
                "paciente_id": Uuid::new_v4().to_string(),
                "data": "2025-03-10",
                "horario": "14:00",
            })),
        )
        .await
        .unwrap();

    let views = listed(store).await;
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].paciente_nome, PACIENTE_NAO_ENCONTRADO);
}

#[tokio::test]
async fn missing_reference_falls_back_to_the_sentinel() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_one(
            CONSULTAS,
            doc(json!({ "data": "2025-03-10", "horario": "14:00" })),
        )
        .await
        .unwrap();

    let views = listed(store).await;
    assert_eq!(views[0].paciente_nome, PACIENTE_NAO_ENCONTRADO);
}

// Legacy documents can carry ids this service would never accept; they
// degrade to the sentinel instead of failing the listing.
#[tokio::test]
async fn malformed_reference_falls_back_to_the_sentinel() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_one(
            CONSULTAS,
            doc(json!({
                "paciente_id": "660f0e21a1b2c3d4e5f60718",
                "data": "2025-03-10",
                "horario": "14:00",
            })),
        )
        .await
        .unwrap();

    let views = listed(store).await;
    assert_eq!(views[0].paciente_nome, PACIENTE_NAO_ENCONTRADO);
}

#[tokio::test]
async fn absent_optional_fields_get_their_placeholders() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_one(CONSULTAS, doc(json!({ "data": "2025-03-10", "horario": "14:00" })))
        .await
        .unwrap();

    let views = listed(store).await;
    assert_eq!(views[0].tipo_consulta, "N/A");
    assert_eq!(views[0].observacoes, "-");
    assert_eq!(views[0].data, "2025-03-10");
    assert_eq!(views[0].horario, "14:00");

    let store = Arc::new(MemoryStore::new());
    store.insert_one(CONSULTAS, Document::new()).await.unwrap();
    let views = listed(store).await;
    assert_eq!(views[0].data, "N/A");
    assert_eq!(views[0].horario, "N/A");
}

/// Wraps the memory store and delays patient lookups by id, so completion
/// order can be forced to differ from input order.
struct SlowLookups {
    inner: Arc<MemoryStore>,
    delays: HashMap<Uuid, Duration>,
}

#[async_trait]
impl DocumentStore for SlowLookups {
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Stored>, StoreError> {
        if let Some(delay) = filter.id.and_then(|id| self.delays.get(&id)) {
            tokio::time::sleep(*delay).await;
        }
        self.inner.find_one(collection, filter).await
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Stored>, StoreError> {
        self.inner.find(collection, filter).await
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Uuid, StoreError> {
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
async fn output_order_matches_input_order_whatever_the_lookup_latency() {
    let inner = Arc::new(MemoryStore::new());
    let nomes = ["Ana", "Bruno", "Carla", "Davi", "Elisa"];

    let mut delays = HashMap::new();
    for (i, nome) in nomes.iter().enumerate() {
        let id = add_paciente(&inner, nome).await;
        // The first consulta gets the slowest lookup, the last the fastest.
        delays.insert(id, Duration::from_millis((nomes.len() - i) as u64 * 40));
        inner
            .insert_one(
                CONSULTAS,
                doc(json!({
                    "paciente_id": id.to_string(),
                    "data": format!("2025-03-1{i}"),
                    "horario": "14:00",
                })),
            )
            .await
            .unwrap();
    }

    let store: Arc<dyn DocumentStore> = Arc::new(SlowLookups { inner, delays });
    let views = listed(store).await;

    let resolved: Vec<&str> = views.iter().map(|v| v.paciente_nome.as_str()).collect();
    assert_eq!(resolved, nomes);
}

#[tokio::test]
async fn slow_lookup_times_out_to_the_sentinel_without_failing_the_rest() {
    let inner = Arc::new(MemoryStore::new());
    let lenta = add_paciente(&inner, "Lenta").await;
    let rapida = add_paciente(&inner, "Rápida").await;

    for id in [lenta, rapida] {
        inner
            .insert_one(
                CONSULTAS,
                doc(json!({
                    "paciente_id": id.to_string(),
                    "data": id.to_string(),
                    "horario": "14:00",
                })),
            )
            .await
            .unwrap();
    }

    let mut delays = HashMap::new();
    delays.insert(lenta, Duration::from_millis(500));
    let store: Arc<dyn DocumentStore> = Arc::new(SlowLookups { inner, delays });

    let consultas = store.find(CONSULTAS, &Filter::all()).await.unwrap();
    let views = enrich_consultas(store, consultas, Duration::from_millis(50)).await;

    assert_eq!(views.len(), 2);
    assert_eq!(views[0].paciente_nome, PACIENTE_NAO_ENCONTRADO);
    assert_eq!(views[1].paciente_nome, "Rápida");
}

#[tokio::test]
async fn store_failure_during_lookup_degrades_to_the_sentinel() {
    struct BrokenPacientes {
        inner: Arc<MemoryStore>,
    }

    #[async_trait]
    impl DocumentStore for BrokenPacientes {
        async fn find_one(
            &self,
            collection: &str,
            filter: &Filter,
        ) -> Result<Option<Stored>, StoreError> {
            if collection == PACIENTES {
                return Err(StoreError::Backend("connection reset".into()));
            }
            self.inner.find_one(collection, filter).await
        }

        async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Stored>, StoreError> {
            self.inner.find(collection, filter).await
        }

        async fn insert_one(&self, collection: &str, doc: Document) -> Result<Uuid, StoreError> {
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

    let store = BrokenPacientes {
        inner: Arc::new(MemoryStore::new()),
    };
    let raw = Uuid::new_v4().to_string();
    let nome = resolve_paciente_nome(&store, Some(raw.as_str()), TIMEOUT).await;
    assert_eq!(nome, PACIENTE_NAO_ENCONTRADO);
}
