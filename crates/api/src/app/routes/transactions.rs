use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockbook_infra::{Recorded, ServiceError};
use stockbook_inventory::StockRequest;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_entries))
        .route("/purchase", post(record_purchase))
        .route("/sale", post(record_sale))
        .route("/return", post(record_return))
        .route("/transfer", post(record_transfer))
        .route("/adjustment", post(record_adjustment))
}

fn movement(
    body: Result<Json<dto::StockMovementRequest>, JsonRejection>,
) -> Result<StockRequest, axum::response::Response> {
    let Json(body) = body.map_err(errors::json_rejection)?;
    body.into_request()
}

fn recorded_response(result: Result<Recorded, ServiceError>) -> axum::response::Response {
    match result {
        Ok(recorded) => (StatusCode::CREATED, Json(recorded)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_entries(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::EntryListQuery>,
) -> axum::response::Response {
    let filter = match query.into_filter() {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    match services.recorder.list_entries(principal.principal(), &filter).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn record_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::StockMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match movement(body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    recorded_response(services.recorder.record_purchase(principal.principal(), request).await)
}

pub async fn record_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::StockMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match movement(body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    recorded_response(services.recorder.record_sale(principal.principal(), request).await)
}

pub async fn record_return(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::StockMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match movement(body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    recorded_response(services.recorder.record_return(principal.principal(), request).await)
}

pub async fn record_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::StockMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match movement(body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    recorded_response(services.recorder.record_transfer(principal.principal(), request).await)
}

pub async fn record_adjustment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::AdjustmentRequest>, JsonRejection>,
) -> axum::response::Response {
    let parts = body
        .map_err(errors::json_rejection)
        .and_then(|Json(body)| body.into_parts());
    let (direction, request) = match parts {
        Ok(parts) => parts,
        Err(resp) => return resp,
    };
    recorded_response(
        services
            .recorder
            .record_adjustment(principal.principal(), direction, request)
            .await,
    )
}
