use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use shelfmark_core::{DomainError, timestamp};
use shelfmark_library::book::sanitize_edit;
use shelfmark_library::{Book, BookStatus, Extra, NewBook};

use super::{ServiceResult, decode_all, parse_id};
use crate::store::{Collection, DocumentStore, Filter, UpdateResult, from_document, to_document};

/// What a book deletion removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookDeletion {
    pub deleted: u64,
    pub orders_removed: u64,
}

#[derive(Clone)]
pub struct BooksRepository {
    store: Arc<dyn DocumentStore>,
}

impl BooksRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, input: NewBook) -> ServiceResult<Book> {
        let book = Book::create(input, timestamp::now())?;
        self.store
            .insert(Collection::Books, to_document(&book)?)
            .await?;
        Ok(book)
    }

    pub async fn list(&self) -> ServiceResult<Vec<Book>> {
        let docs = self.store.find(Collection::Books, &Filter::new(), None).await?;
        Ok(decode_all(docs)?)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Book> {
        let id = parse_id(id)?;
        let doc = self
            .store
            .find_one(Collection::Books, &Filter::by_id(&id))
            .await?
            .ok_or_else(|| DomainError::not_found("book"))?;
        Ok(from_document(doc)?)
    }

    pub async fn list_by_librarian(&self, email: &str) -> ServiceResult<Vec<Book>> {
        let filter = Filter::new().eq("librarianEmail", email);
        let docs = self.store.find(Collection::Books, &filter, None).await?;
        Ok(decode_all(docs)?)
    }

    pub async fn set_status(&self, id: &str, raw_status: &str) -> ServiceResult<UpdateResult> {
        let id = parse_id(id)?;
        let status: BookStatus = raw_status.parse()?;

        let mut set = Extra::new();
        set.insert("status".into(), Value::String(status.as_str().into()));
        self.update(&Filter::by_id(&id), set).await
    }

    /// Merge arbitrary fields into a book, except the server-owned ones.
    pub async fn edit(&self, id: &str, fields: Extra) -> ServiceResult<UpdateResult> {
        let id = parse_id(id)?;
        let set = sanitize_edit(fields)?;
        self.update(&Filter::by_id(&id), set).await
    }

    /// Delete a book and every order placed for it, atomically.
    pub async fn delete_book(&self, id: &str) -> ServiceResult<BookDeletion> {
        let id = parse_id(id)?;
        let orders = Filter::new().eq("bookId", id.to_string());

        let outcome = self
            .store
            .delete_with_dependents(Collection::Books, &Filter::by_id(&id), Collection::Orders, &orders)
            .await?
            .ok_or_else(|| DomainError::not_found("book"))?;

        info!(
            book_id = %id,
            orders_removed = outcome.dependents_deleted,
            "book deleted"
        );
        Ok(BookDeletion {
            deleted: outcome.deleted,
            orders_removed: outcome.dependents_deleted,
        })
    }

    async fn update(&self, filter: &Filter, set: Extra) -> ServiceResult<UpdateResult> {
        let result = self.store.update_one(Collection::Books, filter, set).await?;
        if result.matched == 0 {
            return Err(DomainError::not_found("book").into());
        }
        Ok(result)
    }
}
