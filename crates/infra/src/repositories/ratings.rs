use std::sync::Arc;

use serde_json::Value;

use shelfmark_core::{DocumentId, timestamp};
use shelfmark_library::{Extra, Rating, RatingSubmission, RatingSummary};

use super::{ServiceResult, decode_all};
use crate::store::{Collection, DocumentStore, Filter, Sort, UpsertOutcome};

#[derive(Clone)]
pub struct RatingsRepository {
    store: Arc<dyn DocumentStore>,
}

impl RatingsRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Record a user's rating of a book, replacing any earlier one.
    ///
    /// One atomic upsert keyed by (bookId, userEmail), so repeated or
    /// concurrent submissions never produce a second document.
    pub async fn submit(
        &self,
        book_id: Option<String>,
        user_email: Option<String>,
        rating: Option<Value>,
    ) -> ServiceResult<UpsertOutcome> {
        let submission = RatingSubmission::new(book_id, user_email, rating)?;
        let now = timestamp::format(&timestamp::now());

        let filter = Filter::new()
            .eq("bookId", submission.book_id.as_str())
            .eq("userEmail", submission.user_email.as_str());

        let mut set = Extra::new();
        set.insert("rating".into(), rating_value(submission.rating));
        set.insert("updatedAt".into(), Value::String(now.clone()));

        let mut on_insert = Extra::new();
        on_insert.insert("_id".into(), Value::String(DocumentId::new().to_string()));
        on_insert.insert("createdAt".into(), Value::String(now));

        Ok(self
            .store
            .upsert_one(Collection::Ratings, &filter, set, on_insert)
            .await?)
    }

    /// All ratings of a book (oldest first) with their rounded mean.
    pub async fn aggregate(&self, book_id: &str) -> ServiceResult<RatingSummary> {
        let docs = self
            .store
            .find(
                Collection::Ratings,
                &Filter::new().eq("bookId", book_id),
                Some(&Sort::asc("createdAt")),
            )
            .await?;
        let ratings: Vec<Rating> = decode_all(docs)?;
        Ok(RatingSummary::from_ratings(ratings))
    }
}

/// Whole ratings are stored as integers, the rest as floats.
fn rating_value(rating: f64) -> Value {
    if rating.fract() == 0.0 && rating.abs() < i64::MAX as f64 {
        Value::from(rating as i64)
    } else {
        Value::from(rating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::ServiceError;
    use crate::repositories::test_support::store;
    use serde_json::json;
    use shelfmark_core::DomainError;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[tokio::test]
    async fn resubmitting_updates_instead_of_duplicating() {
        let repo = RatingsRepository::new(store());

        let first = repo
            .submit(some("book-1"), some("a@example.com"), Some(json!(3)))
            .await
            .unwrap();
        assert!(matches!(first, UpsertOutcome::Inserted(_)));

        let second = repo
            .submit(some("book-1"), some("a@example.com"), Some(json!(5)))
            .await
            .unwrap();
        assert!(matches!(second, UpsertOutcome::Updated(_)));

        let summary = repo.aggregate("book-1").await.unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.ratings[0].rating, json!(5));
        assert!(summary.ratings[0].updated_at.is_some());
        assert_eq!(summary.average.as_deref(), Some("5.0"));
    }

    #[tokio::test]
    async fn missing_or_non_numeric_input_is_rejected() {
        let repo = RatingsRepository::new(store());

        let err = repo
            .submit(some("book-1"), None, Some(json!(4)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::InvalidInput(_))));

        let err = repo
            .submit(some("book-1"), some("a@example.com"), Some(json!("great")))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::InvalidInput(_))));

        assert_eq!(repo.aggregate("book-1").await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn aggregate_rounds_mean_to_one_decimal() {
        let repo = RatingsRepository::new(store());
        for (user, value) in [("a", json!(3)), ("b", json!("4")), ("c", json!(5))] {
            repo.submit(some("book-1"), Some(format!("{user}@example.com")), Some(value))
                .await
                .unwrap();
        }
        repo.submit(some("book-2"), some("a@example.com"), Some(json!(1)))
            .await
            .unwrap();

        let summary = repo.aggregate("book-1").await.unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average.as_deref(), Some("4.0"));
    }

    #[tokio::test]
    async fn unrated_book_has_null_average() {
        let repo = RatingsRepository::new(store());
        let summary = repo.aggregate("nothing").await.unwrap();
        assert_eq!(summary.average, None);
        assert!(summary.ratings.is_empty());
    }

    #[tokio::test]
    async fn concurrent_first_submissions_leave_one_document() {
        let repo = RatingsRepository::new(store());
        let mut handles = Vec::new();
        for value in 1..=8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.submit(some("book-1"), some("a@example.com"), Some(json!(value % 5 + 1)))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(repo.aggregate("book-1").await.unwrap().count, 1);
    }

    #[test]
    fn whole_ratings_stay_integers() {
        assert_eq!(rating_value(4.0), json!(4));
        assert_eq!(rating_value(4.5), json!(4.5));
    }
}
