//! `shelfmark-auth`: caller identity and role vocabulary.
//!
//! No HTTP or storage here: this crate knows how to
//! verify a bearer token and what roles exist, nothing more.

pub mod claims;
pub mod roles;
pub mod validator;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use roles::{Role, UnknownRole};
pub use validator::{Hs256JwtValidator, JwtValidator};
