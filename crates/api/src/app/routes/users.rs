use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use shelfmark_infra::repositories::UserCreation;
use shelfmark_library::ProfileUpdate;

use crate::app::dto::{self, JsonBody};
use crate::app::errors;
use crate::app::services::AppServices;

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<dto::CreateUserRequest>,
) -> axum::response::Response {
    match services.users.create(body.into()).await {
        Ok(UserCreation::Created(user)) => {
            (StatusCode::CREATED, Json(dto::inserted_json(user.id))).into_response()
        }
        Ok(UserCreation::AlreadyExists(_)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "insertedId": null,
                "message": "user already exists",
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_users(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.users.list().await {
        Ok(users) => (StatusCode::OK, Json(users)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(email): Path<String>,
) -> axum::response::Response {
    match services.users.role_of(&email).await {
        Ok(Some(role)) => Json(serde_json::json!({ "role": role })).into_response(),
        Ok(None) => Json(serde_json::json!({
            "role": null,
            "message": "user not found",
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Path(email): Path<String>,
) -> axum::response::Response {
    match services.users.profile(&email).await {
        Ok(user) => (StatusCode::OK, Json(user)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Path(email): Path<String>,
    JsonBody(body): JsonBody<dto::UpdateProfileRequest>,
) -> axum::response::Response {
    let update = match ProfileUpdate::new(body.name, body.image) {
        Ok(update) => update,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.users.update_profile(&email, update).await {
        Ok(result) => (StatusCode::OK, Json(dto::update_result_json(result))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn set_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<dto::SetRoleRequest>,
) -> axum::response::Response {
    let Some(role) = dto::present(body.role) else {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "role is required");
    };

    match services.users.set_role(&id, &role).await {
        Ok(result) => (StatusCode::OK, Json(dto::update_result_json(result))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
