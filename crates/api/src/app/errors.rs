use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockbook_infra::ServiceError;
use stockbook_inventory::LedgerError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Forbidden(e) => json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()),
        ServiceError::Ledger(e) => ledger_error_to_response(e),
        ServiceError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        ServiceError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        ServiceError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        // Details stay in the log; clients get a fixed message.
        ServiceError::Storage(msg) => {
            tracing::error!(error = %msg, "storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", "storage failure")
        }
    }
}

fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        LedgerError::ProductNotFound(_) => json_error(StatusCode::NOT_FOUND, "product_not_found", message),
        LedgerError::InvalidQuantity(_) => json_error(StatusCode::BAD_REQUEST, "invalid_quantity", message),
        LedgerError::InvalidUnitPrice(_) => json_error(StatusCode::BAD_REQUEST, "invalid_unit_price", message),
        LedgerError::DirectionMismatch(..) => json_error(StatusCode::BAD_REQUEST, "invalid_direction", message),
        LedgerError::InsufficientStock {
            product_id,
            requested,
            available,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": message,
                "product_id": product_id,
                "requested": requested,
                "available": available,
            })),
        )
            .into_response(),
        LedgerError::AmountOverflow => json_error(StatusCode::UNPROCESSABLE_ENTITY, "amount_overflow", message),
        LedgerError::ProductMismatch { .. } => {
            tracing::error!(error = %message, "entry routed to the wrong balance");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Unreadable request bodies get the same JSON error shape as everything else.
pub fn json_rejection(rejection: JsonRejection) -> axum::response::Response {
    match rejection {
        JsonRejection::MissingJsonContentType(e) => {
            json_error(StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_media_type", e.body_text())
        }
        other => json_error(StatusCode::BAD_REQUEST, "invalid_request", other.body_text()),
    }
}

pub fn invalid_id(what: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}
