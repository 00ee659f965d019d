//! Schema-less document storage.
//!
//! Every entity is a JSON object in a named collection, keyed by a string
//! `_id`. The trait covers exactly the operations the repositories need,
//! including the atomic ones (upsert, insert-if-absent, compare-and-set via
//! filtered update, cascading delete) that keep check-then-write sequences
//! safe under concurrent requests.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

use shelfmark_core::DocumentId;

/// A stored document.
pub type Document = serde_json::Map<String, Value>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Named document collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Books,
    Wishlist,
    Orders,
    Ratings,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Books => "books",
            Collection::Wishlist => "wishlist",
            Collection::Orders => "orders",
            Collection::Ratings => "ratings",
        }
    }
}

impl core::fmt::Display for Collection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Equality conjunction over top-level fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Document,
}

impl Filter {
    /// Matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: &DocumentId) -> Self {
        Self::new().eq("_id", id.to_string())
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.insert(field.to_string(), value.into());
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }

    pub fn conditions(&self) -> &Document {
        &self.conditions
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Single-field ordering for `find`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Compare two documents on the sort field. Missing fields sort first
    /// in ascending order.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ord = compare_values(a.get(&self.field), b.get(&self.field));
        match self.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

/// Outcome of `update_one`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
}

/// Outcome of `upsert_one`; carries the `_id` touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(String),
    Updated(String),
}

/// Outcome of `insert_if_absent`.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(String),
    Existing(Document),
}

/// Outcome of `delete_with_dependents` when the parent existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeOutcome {
    pub deleted: u64,
    pub dependents_deleted: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("document encoding failed: {0}")]
    Encode(String),

    #[error("document decoding failed: {0}")]
    Decode(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

/// Document store abstraction.
///
/// Implementations must make `upsert_one`, `insert_if_absent`,
/// `update_one` (filter check + write) and `delete_with_dependents` atomic.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document, assigning `_id` if absent. Returns the `_id`.
    async fn insert(&self, collection: Collection, doc: Document) -> StoreResult<String>;

    async fn find_one(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<Document>>;

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        sort: Option<&Sort>,
    ) -> StoreResult<Vec<Document>>;

    /// Merge `set` into the first matching document.
    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        set: Document,
    ) -> StoreResult<UpdateResult>;

    /// Merge `set` into the first match, or insert `filter ∪ on_insert ∪ set`.
    async fn upsert_one(
        &self,
        collection: Collection,
        filter: &Filter,
        set: Document,
        on_insert: Document,
    ) -> StoreResult<UpsertOutcome>;

    /// Insert `doc` unless a document matches `filter`; the match is returned instead.
    async fn insert_if_absent(
        &self,
        collection: Collection,
        filter: &Filter,
        doc: Document,
    ) -> StoreResult<InsertOutcome>;

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<u64>;

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> StoreResult<u64>;

    /// Delete the first parent match and every dependent match as one unit.
    ///
    /// Returns `None` (and deletes nothing) when no parent matched.
    async fn delete_with_dependents(
        &self,
        parent: Collection,
        filter: &Filter,
        dependents: Collection,
        dependents_filter: &Filter,
    ) -> StoreResult<Option<CascadeOutcome>>;

    async fn ping(&self) -> StoreResult<()>;

    /// Release backend resources. Called once on shutdown.
    async fn close(&self) {}
}

/// Make sure `doc` carries a string `_id`, generating one if needed.
pub(crate) fn ensure_id(doc: &mut Document) -> StoreResult<String> {
    match doc.get("_id") {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(other) => Err(StoreError::InvalidDocument(format!(
            "_id must be a string, got {other}"
        ))),
        None => {
            let id = DocumentId::new().to_string();
            doc.insert("_id".to_string(), Value::String(id.clone()));
            Ok(id)
        }
    }
}

/// Serialize a typed entity into a document.
pub fn to_document<T: Serialize>(value: &T) -> StoreResult<Document> {
    match serde_json::to_value(value).map_err(|e| StoreError::Encode(e.to_string()))? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Encode(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Deserialize a document into a typed entity.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> StoreResult<T> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| StoreError::Decode(e.to_string()))
}
