//! Per-collection repositories.
//!
//! Each repository owns a shared `Arc<dyn DocumentStore>` handle and turns one
//! domain operation into the store calls it needs. Domain validation happens
//! before anything is written; races are closed with the store's atomic
//! operations rather than in-process locks.

pub mod books;
pub mod orders;
pub mod ratings;
pub mod users;
pub mod wishlist;

pub use books::{BookDeletion, BooksRepository};
pub use orders::OrdersRepository;
pub use ratings::RatingsRepository;
pub use users::{UserCreation, UsersRepository};
pub use wishlist::WishlistRepository;

use serde::de::DeserializeOwned;
use thiserror::Error;

use shelfmark_core::{DocumentId, DomainError};

use crate::store::{Document, StoreError, StoreResult, from_document};

/// Failure of a repository operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Parse a path-supplied document id.
pub(crate) fn parse_id(raw: &str) -> Result<DocumentId, DomainError> {
    raw.trim().parse()
}

pub(crate) fn decode_all<T: DeserializeOwned>(docs: Vec<Document>) -> StoreResult<Vec<T>> {
    docs.into_iter().map(from_document).collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::store::{DocumentStore, InMemoryDocumentStore};

    pub fn store() -> Arc<dyn DocumentStore> {
        Arc::new(InMemoryDocumentStore::default())
    }
}
