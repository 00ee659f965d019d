use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{
    CascadeOutcome, Collection, Document, DocumentStore, Filter, InsertOutcome, Sort,
    StoreError, StoreResult, UpdateResult, UpsertOutcome, ensure_id,
};

/// In-memory document store for tests/dev.
///
/// Documents live in insertion order per collection. Every operation runs
/// under one lock acquisition, which makes the compound operations atomic.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    inner: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<Collection, Vec<Document>>>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<Collection, Vec<Document>>>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

/// Merge `set` into `doc`; true when anything changed.
fn merge(doc: &mut Document, set: Document) -> bool {
    let mut changed = false;
    for (field, value) in set {
        if doc.get(&field) != Some(&value) {
            doc.insert(field, value);
            changed = true;
        }
    }
    changed
}

fn delete_first(docs: &mut Vec<Document>, filter: &Filter) -> u64 {
    match docs.iter().position(|d| filter.matches(d)) {
        Some(idx) => {
            docs.remove(idx);
            1
        }
        None => 0,
    }
}

fn delete_all(docs: &mut Vec<Document>, filter: &Filter) -> u64 {
    let before = docs.len();
    docs.retain(|d| !filter.matches(d));
    (before - docs.len()) as u64
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, collection: Collection, mut doc: Document) -> StoreResult<String> {
        let id = ensure_id(&mut doc)?;
        let mut map = self.write()?;
        map.entry(collection).or_default().push(doc);
        Ok(id)
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<Document>> {
        let map = self.read()?;
        Ok(map
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)).cloned()))
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        sort: Option<&Sort>,
    ) -> StoreResult<Vec<Document>> {
        let mut found: Vec<Document> = {
            let map = self.read()?;
            map.get(&collection)
                .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
                .unwrap_or_default()
        };

        if let Some(sort) = sort {
            // Stable: ties keep insertion order.
            found.sort_by(|a, b| sort.compare(a, b));
        }
        Ok(found)
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        set: Document,
    ) -> StoreResult<UpdateResult> {
        let mut map = self.write()?;
        let Some(doc) = map
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|d| filter.matches(d)))
        else {
            return Ok(UpdateResult::default());
        };

        let modified = merge(doc, set);
        Ok(UpdateResult {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    async fn upsert_one(
        &self,
        collection: Collection,
        filter: &Filter,
        set: Document,
        on_insert: Document,
    ) -> StoreResult<UpsertOutcome> {
        let mut map = self.write()?;
        let docs = map.entry(collection).or_default();

        if let Some(doc) = docs.iter_mut().find(|d| filter.matches(d)) {
            merge(doc, set);
            let id = ensure_id(doc)?;
            return Ok(UpsertOutcome::Updated(id));
        }

        let mut doc = filter.conditions().clone();
        doc.extend(on_insert);
        doc.extend(set);
        let id = ensure_id(&mut doc)?;
        docs.push(doc);
        Ok(UpsertOutcome::Inserted(id))
    }

    async fn insert_if_absent(
        &self,
        collection: Collection,
        filter: &Filter,
        mut doc: Document,
    ) -> StoreResult<InsertOutcome> {
        let mut map = self.write()?;
        let docs = map.entry(collection).or_default();

        if let Some(existing) = docs.iter().find(|d| filter.matches(d)) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }

        let id = ensure_id(&mut doc)?;
        docs.push(doc);
        Ok(InsertOutcome::Inserted(id))
    }

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let mut map = self.write()?;
        Ok(map
            .get_mut(&collection)
            .map(|docs| delete_first(docs, filter))
            .unwrap_or(0))
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let mut map = self.write()?;
        Ok(map
            .get_mut(&collection)
            .map(|docs| delete_all(docs, filter))
            .unwrap_or(0))
    }

    async fn delete_with_dependents(
        &self,
        parent: Collection,
        filter: &Filter,
        dependents: Collection,
        dependents_filter: &Filter,
    ) -> StoreResult<Option<CascadeOutcome>> {
        let mut map = self.write()?;

        let deleted = map
            .get_mut(&parent)
            .map(|docs| delete_first(docs, filter))
            .unwrap_or(0);
        if deleted == 0 {
            return Ok(None);
        }

        let dependents_deleted = map
            .get_mut(&dependents)
            .map(|docs| delete_all(docs, dependents_filter))
            .unwrap_or(0);

        Ok(Some(CascadeOutcome {
            deleted,
            dependents_deleted,
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }
}
