//! `shelfmark-library`: the library/bookstore domain.
//!
//! Entity shapes as they are stored, plus the little real logic the system
//! has: the order status machine, rating aggregation and input checks.
//! Everything here is pure; persistence lives in `shelfmark-infra`.

pub mod book;
pub mod order;
pub mod rating;
pub mod user;
pub mod wishlist;

pub use book::{Book, BookStatus, NewBook};
pub use order::{NewOrder, Order, OrderStatus, PaymentStatus};
pub use rating::{Rating, RatingSubmission, RatingSummary};
pub use user::{NewUser, ProfileUpdate, User};
pub use wishlist::WishlistEntry;

/// Free-form fields carried alongside the typed ones.
pub type Extra = serde_json::Map<String, serde_json::Value>;

/// Drop keys the server owns from client-supplied free-form fields.
pub(crate) fn strip_reserved(mut extra: Extra, reserved: &[&str]) -> Extra {
    for key in reserved {
        extra.remove(*key);
    }
    extra
}

/// Trimmed, non-empty string or `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
