use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shelfmark_core::{DocumentId, DomainError, DomainResult, timestamp};

use crate::non_blank;

/// A book a user wants to keep track of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub user_email: String,
    pub book_id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl WishlistEntry {
    pub fn new(
        user_email: Option<String>,
        book_id: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let user_email = non_blank(user_email)
            .ok_or_else(|| DomainError::invalid_input("userEmail is required"))?;
        let book_id =
            non_blank(book_id).ok_or_else(|| DomainError::invalid_input("bookId is required"))?;

        Ok(Self {
            id: DocumentId::new(),
            user_email,
            book_id,
            created_at: now,
        })
    }
}
