use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use stockbook_core::ProductId;
use stockbook_inventory::{NewProduct, ProductUpdate};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/low-stock", get(low_stock))
        .route("/reconciliation", get(reconcile_all))
        .route("/:id", get(get_product).put(update_product).delete(delete_product))
        .route("/:id/reconciliation", get(reconcile_product))
}

fn parse_id(id: &str) -> Result<ProductId, axum::response::Response> {
    id.parse().map_err(|_| errors::invalid_id("product"))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ProductListQuery>,
) -> axum::response::Response {
    let filter = match query.into_filter() {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    match services.catalog.list_products(principal.principal(), &filter).await {
        Ok(products) => Json(products.into_iter().map(dto::ProductView::from).collect::<Vec<_>>()).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewProduct>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };
    match services.catalog.create_product(principal.principal(), body).await {
        Ok(created) => (StatusCode::CREATED, Json(dto::ProductView::from(created))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.catalog.low_stock(principal.principal()).await {
        Ok(products) => Json(products.into_iter().map(dto::ProductView::from).collect::<Vec<_>>()).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog.get_product(principal.principal(), id).await {
        Ok(detail) => Json(dto::ProductDetailView::from(detail)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<ProductUpdate>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    match services.catalog.update_product(principal.principal(), id, body).await {
        Ok(updated) => Json(dto::ProductView::from(updated)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog.delete_product(principal.principal(), id).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn reconcile_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.auditor.reconcile(principal.principal(), id).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn reconcile_all(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.auditor.reconcile_all(principal.principal()).await {
        Ok(reports) => {
            let drifted = reports.iter().filter(|r| !r.consistent).count();
            Json(serde_json::json!({
                "products": reports.len(),
                "drifted": drifted,
                "reports": reports,
            }))
            .into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}
