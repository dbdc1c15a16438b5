use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{
    Document, DocumentStore, Filter, Stored, StoreError, CONSULTAS, PACIENTES, SESSIONS, VENDAS,
};

const COLLECTIONS: &[&str] = &[PACIENTES, CONSULTAS, VENDAS, SESSIONS];

/// Postgres-backed document store: one JSONB table per collection, one pool
/// for the life of the process.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(format!("connect error: {e}")))?;

        let store = PgStore { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        for collection in COLLECTIONS {
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {collection} (
                    id uuid PRIMARY KEY,
                    doc jsonb NOT NULL,
                    created_at timestamptz NOT NULL DEFAULT now()
                )
                "#,
            ))
            .execute(&self.pool)
            .await
            .map_err(|e| to_store_error(collection, e))?;
        }

        // One consulta per (data, horario) slot, enforced by the store. This
        // is what makes the booking pre-check race-free: the losing insert of
        // two concurrent submissions fails here.
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS consultas_slot_unique
            ON consultas ((doc->>'data'), (doc->>'horario'))
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| to_store_error(CONSULTAS, e))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS sessions_token_hash
            ON sessions ((doc->>'token_hash'))
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| to_store_error(SESSIONS, e))?;

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Stored>, StoreError> {
        let table = table_name(collection)?;
        let row = sqlx::query(&format!(
            r#"
            SELECT id, doc FROM {table}
            WHERE ($1::uuid IS NULL OR id = $1) AND doc @> $2::jsonb
            ORDER BY created_at
            LIMIT 1
            "#,
        ))
        .bind(filter.id)
        .bind(Value::Object(filter.fields.clone()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| to_store_error(collection, e))?;

        row.map(row_to_stored).transpose()
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Stored>, StoreError> {
        let table = table_name(collection)?;
        let rows = sqlx::query(&format!(
            r#"
            SELECT id, doc FROM {table}
            WHERE ($1::uuid IS NULL OR id = $1) AND doc @> $2::jsonb
            ORDER BY created_at
            "#,
        ))
        .bind(filter.id)
        .bind(Value::Object(filter.fields.clone()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| to_store_error(collection, e))?;

        rows.into_iter().map(row_to_stored).collect()
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Uuid, StoreError> {
        let table = table_name(collection)?;
        let id = Uuid::new_v4();
        sqlx::query(&format!("INSERT INTO {table} (id, doc) VALUES ($1, $2)"))
            .bind(id)
            .bind(Value::Object(doc))
            .execute(&self.pool)
            .await
            .map_err(|e| to_store_error(collection, e))?;
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        changes: Document,
    ) -> Result<u64, StoreError> {
        let table = table_name(collection)?;
        let result = sqlx::query(&format!(
            r#"
            UPDATE {table} SET doc = doc || $3::jsonb
            WHERE id = (
                SELECT id FROM {table}
                WHERE ($1::uuid IS NULL OR id = $1) AND doc @> $2::jsonb
                ORDER BY created_at
                LIMIT 1
            )
            "#,
        ))
        .bind(filter.id)
        .bind(Value::Object(filter.fields.clone()))
        .bind(Value::Object(changes))
        .execute(&self.pool)
        .await
        .map_err(|e| to_store_error(collection, e))?;

        Ok(result.rows_affected())
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let table = table_name(collection)?;
        let result = sqlx::query(&format!(
            r#"
            DELETE FROM {table}
            WHERE id = (
                SELECT id FROM {table}
                WHERE ($1::uuid IS NULL OR id = $1) AND doc @> $2::jsonb
                ORDER BY created_at
                LIMIT 1
            )
            "#,
        ))
        .bind(filter.id)
        .bind(Value::Object(filter.fields.clone()))
        .execute(&self.pool)
        .await
        .map_err(|e| to_store_error(collection, e))?;

        Ok(result.rows_affected())
    }
}

// Collection names are interpolated into SQL as identifiers, so only the
// known set is accepted.
fn table_name(collection: &str) -> Result<&'static str, StoreError> {
    COLLECTIONS
        .iter()
        .find(|c| **c == collection)
        .copied()
        .ok_or_else(|| StoreError::Backend(format!("unknown collection: {collection}")))
}

fn row_to_stored(row: PgRow) -> Result<Stored, StoreError> {
    let id: Uuid = row
        .try_get("id")
        .map_err(|e| StoreError::Backend(format!("row decode error: {e}")))?;
    let doc: Value = row
        .try_get("doc")
        .map_err(|e| StoreError::Backend(format!("row decode error: {e}")))?;
    let Value::Object(doc) = doc else {
        return Err(StoreError::Backend("doc column is not an object".into()));
    };
    Ok(Stored { id, doc })
}

fn to_store_error(collection: &str, e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            return StoreError::DuplicateKey(collection.to_string());
        }
    }
    StoreError::Backend(format!("{e}"))
}
