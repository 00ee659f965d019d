use std::sync::Arc;

use shelfmark_core::{DomainError, timestamp};
use shelfmark_library::WishlistEntry;

use super::{ServiceResult, decode_all};
use crate::store::{
    Collection, DocumentStore, Filter, InsertOutcome, Sort, from_document, to_document,
};

#[derive(Clone)]
pub struct WishlistRepository {
    store: Arc<dyn DocumentStore>,
}

impl WishlistRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Add a book to a user's wishlist.
    ///
    /// Returns the stored entry and whether it was newly inserted; adding the
    /// same book twice hands back the existing entry.
    pub async fn add(
        &self,
        user_email: Option<String>,
        book_id: Option<String>,
    ) -> ServiceResult<(WishlistEntry, bool)> {
        let entry = WishlistEntry::new(user_email, book_id, timestamp::now())?;
        let filter = key(&entry.user_email, &entry.book_id);

        match self
            .store
            .insert_if_absent(Collection::Wishlist, &filter, to_document(&entry)?)
            .await?
        {
            InsertOutcome::Inserted(_) => Ok((entry, true)),
            InsertOutcome::Existing(doc) => Ok((from_document(doc)?, false)),
        }
    }

    /// A user's entries, newest first.
    pub async fn list_for_user(&self, user_email: &str) -> ServiceResult<Vec<WishlistEntry>> {
        let filter = Filter::new().eq("userEmail", user_email);
        let docs = self
            .store
            .find(Collection::Wishlist, &filter, Some(&Sort::desc("createdAt")))
            .await?;
        Ok(decode_all(docs)?)
    }

    pub async fn list(
        &self,
        user_email: Option<&str>,
        book_id: Option<&str>,
    ) -> ServiceResult<Vec<WishlistEntry>> {
        let mut filter = Filter::new();
        if let Some(email) = user_email {
            filter = filter.eq("userEmail", email);
        }
        if let Some(book_id) = book_id {
            filter = filter.eq("bookId", book_id);
        }
        let docs = self.store.find(Collection::Wishlist, &filter, None).await?;
        Ok(decode_all(docs)?)
    }

    pub async fn remove(&self, user_email: &str, book_id: &str) -> ServiceResult<u64> {
        let removed = self
            .store
            .delete_one(Collection::Wishlist, &key(user_email, book_id))
            .await?;
        if removed == 0 {
            return Err(DomainError::not_found("wishlist entry").into());
        }
        Ok(removed)
    }
}

fn key(user_email: &str, book_id: &str) -> Filter {
    Filter::new()
        .eq("userEmail", user_email)
        .eq("bookId", book_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::ServiceError;
    use crate::repositories::test_support::store;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[tokio::test]
    async fn adding_twice_keeps_one_entry() {
        let repo = WishlistRepository::new(store());

        let (first, inserted) = repo.add(some("a@example.com"), some("book-1")).await.unwrap();
        assert!(inserted);

        let (second, inserted) = repo.add(some("a@example.com"), some("book-1")).await.unwrap();
        assert!(!inserted);
        assert_eq!(second.id, first.id);

        assert_eq!(repo.list_for_user("a@example.com").await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_of_one_book_keep_one_entry() {
        let repo = WishlistRepository::new(store());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.add(some("a@example.com"), some("book-1")).await
            }));
        }

        let mut ids = Vec::new();
        let mut inserted = 0;
        for handle in handles {
            let (entry, fresh) = handle.await.unwrap().unwrap();
            if fresh {
                inserted += 1;
            }
            ids.push(entry.id);
        }
        assert_eq!(inserted, 1);
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(repo.list_for_user("a@example.com").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn book_id_is_required() {
        let repo = WishlistRepository::new(store());
        let err = repo.add(some("a@example.com"), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn user_listing_is_newest_first() {
        let repo = WishlistRepository::new(store());
        repo.add(some("a@example.com"), some("old")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        repo.add(some("a@example.com"), some("new")).await.unwrap();
        repo.add(some("b@example.com"), some("other")).await.unwrap();

        let entries = repo.list_for_user("a@example.com").await.unwrap();
        let books: Vec<_> = entries.iter().map(|e| e.book_id.as_str()).collect();
        assert_eq!(books, ["new", "old"]);
    }

    #[tokio::test]
    async fn list_applies_optional_filters() {
        let repo = WishlistRepository::new(store());
        repo.add(some("a@example.com"), some("book-1")).await.unwrap();
        repo.add(some("b@example.com"), some("book-1")).await.unwrap();
        repo.add(some("b@example.com"), some("book-2")).await.unwrap();

        assert_eq!(repo.list(None, None).await.unwrap().len(), 3);
        assert_eq!(repo.list(None, Some("book-1")).await.unwrap().len(), 2);
        assert_eq!(
            repo.list(Some("b@example.com"), Some("book-2"))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn remove_reports_missing_entries() {
        let repo = WishlistRepository::new(store());
        repo.add(some("a@example.com"), some("book-1")).await.unwrap();

        assert_eq!(repo.remove("a@example.com", "book-1").await.unwrap(), 1);
        let err = repo.remove("a@example.com", "book-1").await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
    }
}
