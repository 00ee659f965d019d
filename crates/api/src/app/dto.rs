use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use shelfmark_infra::store::UpdateResult;
use shelfmark_library::{Extra, NewBook, NewOrder, NewUser};

use crate::app::errors;

// -------------------------
// Body extraction
// -------------------------

/// `Json` whose rejections use the API error shape with a 400 status.
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = axum::response::Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_body",
                rejection.body_text(),
            )),
        }
    }
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl From<CreateUserRequest> for NewUser {
    fn from(body: CreateUserRequest) -> Self {
        NewUser {
            email: body.email,
            name: body.name,
            image: body.image,
            role: body.role,
            extra: body.extra,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookRequest {
    pub title: Option<String>,
    pub librarian_email: Option<String>,
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl From<CreateBookRequest> for NewBook {
    fn from(body: CreateBookRequest) -> Self {
        NewBook {
            title: body.title,
            librarian_email: body.librarian_email,
            status: body.status,
            extra: body.extra,
        }
    }
}

/// Body of status-only updates (books and orders).
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWishlistRequest {
    pub book_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub book_id: Option<String>,
    pub buyer_email: Option<String>,
    pub librarian_email: Option<String>,
    pub payment_status: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl From<CreateOrderRequest> for NewOrder {
    fn from(body: CreateOrderRequest) -> Self {
        NewOrder {
            book_id: body.book_id,
            buyer_email: body.buyer_email,
            librarian_email: body.librarian_email,
            payment_status: body.payment_status,
            extra: body.extra,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRatingRequest {
    pub book_id: Option<String>,
    pub user_email: Option<String>,
    pub rating: Option<Value>,
}

// -------------------------
// Query DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistQuery {
    pub user_email: Option<String>,
    pub book_id: Option<String>,
}

/// Non-empty query value, if supplied.
pub fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// -------------------------
// Response mapping
// -------------------------

pub fn inserted_json(id: impl ToString) -> Value {
    json!({
        "acknowledged": true,
        "insertedId": id.to_string(),
    })
}

pub fn update_result_json(result: UpdateResult) -> Value {
    json!({
        "acknowledged": true,
        "matchedCount": result.matched,
        "modifiedCount": result.modified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_book_fields_land_in_extra() {
        let body: CreateBookRequest = serde_json::from_value(json!({
            "title": "Dune",
            "librarianEmail": "lib@example.com",
            "author": "Herbert"
        }))
        .unwrap();
        let book: NewBook = body.into();
        assert_eq!(book.librarian_email.as_deref(), Some("lib@example.com"));
        assert_eq!(book.extra["author"], "Herbert");
        assert!(!book.extra.contains_key("title"));
    }

    #[test]
    fn update_counts_use_camel_case() {
        let body = update_result_json(UpdateResult {
            matched: 1,
            modified: 0,
        });
        assert_eq!(body["matchedCount"], 1);
        assert_eq!(body["modifiedCount"], 0);
    }
}
