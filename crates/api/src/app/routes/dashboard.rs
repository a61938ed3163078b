use std::sync::Arc;

use axum::{Json, Router, extract::Extension, response::IntoResponse, routing::get};
use chrono::Utc;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/stats", get(stats))
}

pub async fn stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.dashboard.stats(principal.principal(), Utc::now()).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
