//! `shelfmark-core`: shared domain building blocks.
//!
//! Pure types only: identifiers, the domain error model and the timestamp
//! wire format. No storage or HTTP concerns live here.

pub mod error;
pub mod id;
pub mod timestamp;

pub use error::{DomainError, DomainResult};
pub use id::DocumentId;
