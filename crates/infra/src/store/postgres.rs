//! Postgres-backed document store.
//!
//! All collections share one table; each row holds a JSONB document:
//!
//! ```sql
//! documents (collection TEXT, id TEXT, doc JSONB, created_at TIMESTAMPTZ,
//!            PRIMARY KEY (collection, id))
//! ```
//!
//! Filters are equality conjunctions, so they translate directly to JSONB
//! containment (`doc @> $filter`), served by a GIN index.
//!
//! ## Atomicity
//!
//! - `update_one` selects its target `FOR UPDATE` and re-checks the filter, so a
//!   filter that includes the previously observed value is a compare-and-set.
//! - `upsert_one` / `insert_if_absent` take a transaction-scoped advisory lock
//!   keyed by collection + filter before looking for a match, which serialises
//!   concurrent writers of the same logical key.
//! - `delete_with_dependents` runs both deletes in one transaction.
//!
//! ## Error Mapping
//!
//! Every `sqlx::Error` becomes `StoreError::Backend` with the operation name;
//! row decoding failures become `StoreError::Decode`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use super::{
    CascadeOutcome, Collection, Document, DocumentStore, Filter, InsertOutcome, Sort,
    SortDirection, StoreError, StoreResult, UpdateResult, UpsertOutcome, ensure_id,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        doc JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (collection, id)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS documents_doc_idx
        ON documents USING GIN (doc jsonb_path_ops)
    "#,
];

/// Postgres document store.
///
/// `Send + Sync`; the SQLx pool handles connection sharing.
#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: Arc<PgPool>,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect, then create the table and index if missing.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    async fn insert_row(
        tx: &mut Transaction<'_, Postgres>,
        collection: Collection,
        id: &str,
        doc: Document,
    ) -> StoreResult<()> {
        sqlx::query("INSERT INTO documents (collection, id, doc) VALUES ($1, $2, $3)")
            .bind(collection.name())
            .bind(id)
            .bind(Json(doc))
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert", e))?;
        Ok(())
    }

    /// Serialise writers of one logical key until the transaction ends.
    async fn lock_key(
        tx: &mut Transaction<'_, Postgres>,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<()> {
        let key = format!(
            "{}:{}",
            collection,
            Value::Object(filter.conditions().clone())
        );
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(key)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("advisory_lock", e))?;
        Ok(())
    }

    async fn first_match_for_update(
        tx: &mut Transaction<'_, Postgres>,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Option<(String, Document)>> {
        let row = sqlx::query(
            r#"
            SELECT id, doc
            FROM documents
            WHERE collection = $1 AND doc @> $2
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(collection.name())
        .bind(Json(filter.conditions().clone()))
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("select_for_update", e))?;

        row.map(|row| {
            let id: String = row
                .try_get("id")
                .map_err(|e| StoreError::Decode(e.to_string()))?;
            Ok((id, decode_doc(&row)?))
        })
        .transpose()
    }

    async fn begin(&self) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))
    }
}

fn decode_doc(row: &PgRow) -> StoreResult<Document> {
    row.try_get::<Json<Document>, _>("doc")
        .map(|json| json.0)
        .map_err(|e| StoreError::Decode(format!("failed to decode document row: {e}")))
}

async fn commit(tx: Transaction<'_, Postgres>) -> StoreResult<()> {
    tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    #[instrument(skip(self, doc), fields(collection = %collection), err)]
    async fn insert(&self, collection: Collection, mut doc: Document) -> StoreResult<String> {
        let id = ensure_id(&mut doc)?;
        sqlx::query("INSERT INTO documents (collection, id, doc) VALUES ($1, $2, $3)")
            .bind(collection.name())
            .bind(&id)
            .bind(Json(doc))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert", e))?;
        Ok(id)
    }

    #[instrument(skip(self, filter), fields(collection = %collection), err)]
    async fn find_one(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<Document>> {
        let row = sqlx::query(
            r#"
            SELECT doc
            FROM documents
            WHERE collection = $1 AND doc @> $2
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(collection.name())
        .bind(Json(filter.conditions().clone()))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_one", e))?;

        row.as_ref().map(decode_doc).transpose()
    }

    #[instrument(skip(self, filter, sort), fields(collection = %collection), err)]
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        sort: Option<&Sort>,
    ) -> StoreResult<Vec<Document>> {
        let query = match sort {
            Some(sort) => {
                let direction = match sort.direction {
                    SortDirection::Ascending => "ASC NULLS FIRST",
                    SortDirection::Descending => "DESC NULLS LAST",
                };
                let sql = format!(
                    "SELECT doc FROM documents \
                     WHERE collection = $1 AND doc @> $2 \
                     ORDER BY doc -> $3::text {direction}, created_at ASC, id ASC"
                );
                sqlx::query(&sql)
                    .bind(collection.name())
                    .bind(Json(filter.conditions().clone()))
                    .bind(sort.field.clone())
                    .fetch_all(&*self.pool)
                    .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT doc
                    FROM documents
                    WHERE collection = $1 AND doc @> $2
                    ORDER BY created_at ASC, id ASC
                    "#,
                )
                .bind(collection.name())
                .bind(Json(filter.conditions().clone()))
                .fetch_all(&*self.pool)
                .await
            }
        };

        let rows = query.map_err(|e| map_sqlx_error("find", e))?;
        rows.iter().map(decode_doc).collect()
    }

    #[instrument(skip(self, filter, set), fields(collection = %collection), err)]
    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        set: Document,
    ) -> StoreResult<UpdateResult> {
        let row = sqlx::query(
            r#"
            WITH target AS (
                SELECT id, doc
                FROM documents
                WHERE collection = $1 AND doc @> $2
                ORDER BY created_at ASC, id ASC
                LIMIT 1
                FOR UPDATE
            )
            UPDATE documents d
            SET doc = d.doc || $3
            FROM target t
            WHERE d.collection = $1 AND d.id = t.id
            RETURNING (t.doc IS DISTINCT FROM d.doc) AS modified
            "#,
        )
        .bind(collection.name())
        .bind(Json(filter.conditions().clone()))
        .bind(Json(set))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_one", e))?;

        match row {
            None => Ok(UpdateResult::default()),
            Some(row) => {
                let modified: bool = row
                    .try_get("modified")
                    .map_err(|e| StoreError::Decode(e.to_string()))?;
                Ok(UpdateResult {
                    matched: 1,
                    modified: u64::from(modified),
                })
            }
        }
    }

    #[instrument(skip(self, filter, set, on_insert), fields(collection = %collection), err)]
    async fn upsert_one(
        &self,
        collection: Collection,
        filter: &Filter,
        set: Document,
        on_insert: Document,
    ) -> StoreResult<UpsertOutcome> {
        let mut tx = self.begin().await?;
        Self::lock_key(&mut tx, collection, filter).await?;

        let outcome = match Self::first_match_for_update(&mut tx, collection, filter).await? {
            Some((id, _)) => {
                sqlx::query(
                    "UPDATE documents SET doc = doc || $3 WHERE collection = $1 AND id = $2",
                )
                .bind(collection.name())
                .bind(&id)
                .bind(Json(set))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("upsert_update", e))?;
                UpsertOutcome::Updated(id)
            }
            None => {
                let mut doc = filter.conditions().clone();
                doc.extend(on_insert);
                doc.extend(set);
                let id = ensure_id(&mut doc)?;
                Self::insert_row(&mut tx, collection, &id, doc).await?;
                UpsertOutcome::Inserted(id)
            }
        };

        commit(tx).await?;
        Ok(outcome)
    }

    #[instrument(skip(self, filter, doc), fields(collection = %collection), err)]
    async fn insert_if_absent(
        &self,
        collection: Collection,
        filter: &Filter,
        mut doc: Document,
    ) -> StoreResult<InsertOutcome> {
        let mut tx = self.begin().await?;
        Self::lock_key(&mut tx, collection, filter).await?;

        let outcome = match Self::first_match_for_update(&mut tx, collection, filter).await? {
            Some((_, existing)) => InsertOutcome::Existing(existing),
            None => {
                let id = ensure_id(&mut doc)?;
                Self::insert_row(&mut tx, collection, &id, doc).await?;
                InsertOutcome::Inserted(id)
            }
        };

        commit(tx).await?;
        Ok(outcome)
    }

    #[instrument(skip(self, filter), fields(collection = %collection), err)]
    async fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE collection = $1 AND id = (
                SELECT id FROM documents
                WHERE collection = $1 AND doc @> $2
                ORDER BY created_at ASC, id ASC
                LIMIT 1
            )
            "#,
        )
        .bind(collection.name())
        .bind(Json(filter.conditions().clone()))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_one", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, filter), fields(collection = %collection), err)]
    async fn delete_many(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND doc @> $2")
            .bind(collection.name())
            .bind(Json(filter.conditions().clone()))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_many", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(
        skip(self, filter, dependents_filter),
        fields(parent = %parent, dependents = %dependents),
        err
    )]
    async fn delete_with_dependents(
        &self,
        parent: Collection,
        filter: &Filter,
        dependents: Collection,
        dependents_filter: &Filter,
    ) -> StoreResult<Option<CascadeOutcome>> {
        let mut tx = self.begin().await?;

        let Some((id, _)) = Self::first_match_for_update(&mut tx, parent, filter).await? else {
            // Dropping the transaction rolls it back.
            return Ok(None);
        };

        let deleted = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(parent.name())
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("cascade_parent", e))?
            .rows_affected();

        let dependents_deleted =
            sqlx::query("DELETE FROM documents WHERE collection = $1 AND doc @> $2")
                .bind(dependents.name())
                .bind(Json(dependents_filter.conditions().clone()))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("cascade_dependents", e))?
                .rows_affected();

        commit(tx).await?;
        Ok(Some(CascadeOutcome {
            deleted,
            dependents_deleted,
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            StoreError::Backend(format!(
                "database error in {operation} ({code}): {}",
                db_err.message()
            ))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Decode(format!("{operation}: {err}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}
