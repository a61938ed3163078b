use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use stockbook_core::CategoryId;
use stockbook_inventory::NewCategory;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:id", get(get_category).put(update_category).delete(delete_category))
}

fn parse_id(id: &str) -> Result<CategoryId, axum::response::Response> {
    id.parse().map_err(|_| errors::invalid_id("category"))
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.catalog.list_categories(principal.principal()).await {
        Ok(categories) => Json(categories).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewCategory>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    match services.catalog.create_category(principal.principal(), body).await {
        Ok(category) => (StatusCode::CREATED, Json(category)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog.get_category(principal.principal(), id).await {
        Ok(category) => Json(category).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<NewCategory>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    match services.catalog.update_category(principal.principal(), id, body).await {
        Ok(category) => Json(category).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Products in the category stay, with no category.
pub async fn delete_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog.delete_category(principal.principal(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
