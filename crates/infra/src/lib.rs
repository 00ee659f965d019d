//! Infrastructure layer: document storage and the repositories that run every
//! domain operation against it.

pub mod repositories;
pub mod store;

pub use repositories::{ServiceError, ServiceResult};
pub use store::{DocumentStore, StoreError};
