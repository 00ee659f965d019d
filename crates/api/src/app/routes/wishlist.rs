use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::app::dto::{self, JsonBody};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::CallerContext;

/// Add a book to the caller's wishlist.
pub async fn add_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    JsonBody(body): JsonBody<dto::AddWishlistRequest>,
) -> axum::response::Response {
    match services
        .wishlist
        .add(Some(caller.email().to_string()), body.book_id)
        .await
    {
        Ok((entry, true)) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "acknowledged": true,
                "insertedId": entry.id.to_string(),
            })),
        )
            .into_response(),
        Ok((entry, false)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "insertedId": null,
                "message": "already in wishlist",
                "entry": entry,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// The caller's own wishlist, newest first.
pub async fn list_mine(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<dto::WishlistQuery>,
) -> axum::response::Response {
    let Some(user_email) = dto::present(query.user_email) else {
        return errors::missing_param("userEmail");
    };
    if user_email != caller.email() {
        return errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "cannot read another user's wishlist",
        );
    }

    match services.wishlist.list_for_user(&user_email).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_entries(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::WishlistQuery>,
) -> axum::response::Response {
    let user_email = dto::present(query.user_email);
    let book_id = dto::present(query.book_id);

    match services
        .wishlist
        .list(user_email.as_deref(), book_id.as_deref())
        .await
    {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn remove_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Path(book_id): Path<String>,
    Query(query): Query<dto::WishlistQuery>,
) -> axum::response::Response {
    let Some(user_email) = dto::present(query.user_email) else {
        return errors::missing_param("userEmail");
    };

    match services.wishlist.remove(&user_email, &book_id).await {
        Ok(removed) => (
            StatusCode::OK,
            Json(serde_json::json!({ "deletedCount": removed })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
