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

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<dto::CreateOrderRequest>,
) -> axum::response::Response {
    match services.orders.place(body.into()).await {
        Ok(order) => (StatusCode::CREATED, Json(dto::inserted_json(order.id))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.orders.get(&id).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn my_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::EmailQuery>,
) -> axum::response::Response {
    let Some(email) = dto::present(query.email) else {
        return errors::missing_param("email");
    };

    match services.orders.list_by_buyer(&email).await {
        Ok(orders) => (StatusCode::OK, Json(orders)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn librarian_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Path(email): Path<String>,
) -> axum::response::Response {
    match services.orders.list_by_librarian(&email).await {
        Ok(orders) => (StatusCode::OK, Json(orders)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.orders.cancel(&id).await {
        Ok(result) => (StatusCode::OK, Json(dto::update_result_json(result))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Move an order to the next fulfilment status.
pub async fn advance_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<dto::StatusRequest>,
) -> axum::response::Response {
    let Some(status) = dto::present(body.status) else {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "status is required");
    };

    match services.orders.advance(&id, &status).await {
        Ok(result) => (StatusCode::OK, Json(dto::update_result_json(result))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
