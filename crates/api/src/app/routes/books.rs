use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use shelfmark_library::Extra;

use crate::app::dto::{self, JsonBody};
use crate::app::errors;
use crate::app::services::AppServices;

pub async fn create_book(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<dto::CreateBookRequest>,
) -> axum::response::Response {
    match services.books.create(body.into()).await {
        Ok(book) => (StatusCode::CREATED, Json(dto::inserted_json(book.id))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_books(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.books.list().await {
        Ok(books) => (StatusCode::OK, Json(books)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_book(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.books.get(&id).await {
        Ok(book) => (StatusCode::OK, Json(book)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn my_books(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::EmailQuery>,
) -> axum::response::Response {
    let Some(email) = dto::present(query.email) else {
        return errors::missing_param("email");
    };

    match services.books.list_by_librarian(&email).await {
        Ok(books) => (StatusCode::OK, Json(books)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Publish / unpublish.
pub async fn set_book_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<dto::StatusRequest>,
) -> axum::response::Response {
    let Some(status) = dto::present(body.status) else {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "status is required");
    };

    match services.books.set_status(&id, &status).await {
        Ok(result) => (StatusCode::OK, Json(dto::update_result_json(result))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn edit_book(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    JsonBody(fields): JsonBody<Extra>,
) -> axum::response::Response {
    match services.books.edit(&id, fields).await {
        Ok(result) => (StatusCode::OK, Json(dto::update_result_json(result))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Deletes the book and every order placed for it.
pub async fn delete_book(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.books.delete_book(&id).await {
        Ok(deletion) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "deletedCount": deletion.deleted,
                "ordersRemoved": deletion.orders_removed,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
