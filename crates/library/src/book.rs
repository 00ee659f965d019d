use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shelfmark_core::{DocumentId, DomainError, DomainResult, timestamp};

use crate::{Extra, non_blank, strip_reserved};

/// Publication state of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    #[default]
    Draft,
    Published,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Draft => "draft",
            BookStatus::Published => "published",
        }
    }
}

impl core::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(BookStatus::Draft),
            "published" => Ok(BookStatus::Published),
            other => Err(DomainError::invalid_input(format!(
                "unknown book status `{other}` (expected draft or published)"
            ))),
        }
    }
}

/// Stored book document: a few typed fields plus free-form metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub librarian_email: Option<String>,
    #[serde(default)]
    pub status: BookStatus,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewBook {
    pub title: Option<String>,
    pub librarian_email: Option<String>,
    pub status: Option<String>,
    pub extra: Extra,
}

const RESERVED: &[&str] = &["_id", "title", "librarianEmail", "status", "createdAt"];

/// Fields the server owns and an edit may never touch.
const IMMUTABLE: &[&str] = &["_id", "createdAt"];

impl Book {
    pub fn create(input: NewBook, now: DateTime<Utc>) -> DomainResult<Book> {
        let title = non_blank(input.title)
            .ok_or_else(|| DomainError::invalid_input("title is required"))?;
        let status = match non_blank(input.status) {
            Some(raw) => raw.parse()?,
            None => BookStatus::default(),
        };

        Ok(Book {
            id: DocumentId::new(),
            title,
            librarian_email: non_blank(input.librarian_email),
            status,
            created_at: now,
            extra: strip_reserved(input.extra, RESERVED),
        })
    }
}

/// Clean up a merge-edit payload.
///
/// Drops server-owned keys, checks the typed fields (`status`, `title`,
/// `librarianEmail`) when present, and refuses an edit that changes nothing.
pub fn sanitize_edit(fields: Extra) -> DomainResult<Extra> {
    let mut fields = strip_reserved(fields, IMMUTABLE);

    if let Some(status) = fields.get("status") {
        let raw = status
            .as_str()
            .ok_or_else(|| DomainError::invalid_input("status must be a string"))?;
        let status: BookStatus = raw.parse()?;
        fields.insert("status".into(), status.as_str().into());
    }

    if let Some(title) = fields.get("title") {
        let blank = title.as_str().map(|t| t.trim().is_empty()).unwrap_or(true);
        if blank {
            return Err(DomainError::invalid_input("title cannot be empty"));
        }
    }

    if let Some(email) = fields.get("librarianEmail") {
        if !(email.is_string() || email.is_null()) {
            return Err(DomainError::invalid_input(
                "librarianEmail must be a string or null",
            ));
        }
    }

    if fields.is_empty() {
        return Err(DomainError::invalid_input("no editable fields supplied"));
    }
    Ok(fields)
}
