use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use shelfmark_infra::store::UpsertOutcome;

use crate::app::dto::{self, JsonBody};
use crate::app::errors;
use crate::app::services::AppServices;

/// Create or replace the caller-supplied rating for a book.
pub async fn submit_rating(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<dto::SubmitRatingRequest>,
) -> axum::response::Response {
    let outcome = services
        .ratings
        .submit(body.book_id, body.user_email, body.rating)
        .await;

    let (id, upserted) = match outcome {
        Ok(UpsertOutcome::Inserted(id)) => (id, true),
        Ok(UpsertOutcome::Updated(id)) => (id, false),
        Err(e) => return errors::service_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "acknowledged": true,
            "upserted": upserted,
            "id": id,
        })),
    )
        .into_response()
}

pub async fn book_ratings(
    Extension(services): Extension<Arc<AppServices>>,
    Path(book_id): Path<String>,
) -> axum::response::Response {
    match services.ratings.aggregate(&book_id).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
