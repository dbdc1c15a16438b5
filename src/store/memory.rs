use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Document, DocumentStore, Filter, Stored, StoreError, CONSULTAS};

/// In-memory document store with the same contract as the Postgres backend,
/// unique slot index included. Backs the test suite and throwaway local runs.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Stored>>>,
}

// Mirrors the `consultas_slot_unique` index of the Postgres schema. Documents
// missing any indexed field are unconstrained, like NULLs under a Postgres
// unique index.
const UNIQUE_INDEXES: &[(&str, &[&str])] = &[(CONSULTAS, &["data", "horario"])];

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

fn matches(stored: &Stored, filter: &Filter) -> bool {
    if let Some(id) = filter.id {
        if stored.id != id {
            return false;
        }
    }
    filter
        .fields
        .iter()
        .all(|(name, value)| stored.doc.get(name) == Some(value))
}

fn index_key(doc: &Document, fields: &[&str]) -> Option<Vec<String>> {
    fields
        .iter()
        .map(|f| doc.get(*f).map(value_as_text))
        .collect()
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn check_unique(
    collection: &str,
    candidate: &Document,
    existing: &[Stored],
    skip: Option<Uuid>,
) -> Result<(), StoreError> {
    for (indexed, fields) in UNIQUE_INDEXES {
        if *indexed != collection {
            continue;
        }
        let Some(key) = index_key(candidate, fields) else {
            continue;
        };
        let taken = existing.iter().any(|stored| {
            Some(stored.id) != skip && index_key(&stored.doc, fields).as_ref() == Some(&key)
        });
        if taken {
            return Err(StoreError::DuplicateKey(collection.to_string()));
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Stored>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| matches(d, filter)).cloned()))
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Stored>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| matches(d, filter)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Uuid, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        check_unique(collection, &doc, docs, None)?;
        let id = Uuid::new_v4();
        docs.push(Stored { id, doc });
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        changes: Document,
    ) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let Some(pos) = docs.iter().position(|d| matches(d, filter)) else {
            return Ok(0);
        };

        let mut merged = docs[pos].doc.clone();
        for (name, value) in changes {
            merged.insert(name, value);
        }
        let id = docs[pos].id;
        check_unique(collection, &merged, docs, Some(id))?;
        docs[pos].doc = merged;
        Ok(1)
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match docs.iter().position(|d| matches(d, filter)) {
            Some(pos) => {
                docs.remove(pos);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
