use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "user_id": principal.user_id().to_string(),
        "role": principal.role().as_str(),
        "permissions": principal.role().permissions().iter().map(|p| p.as_str()).collect::<Vec<_>>(),
    }))
}
