use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

use convey_auth::MembershipError;
use convey_billing::BillingError;
use convey_core::StoreError;

const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred";

pub fn billing_error_to_response(err: BillingError) -> Response {
    match err {
        BillingError::UnsupportedGateway => {
            json_error(StatusCode::FORBIDDEN, "unsupported_gateway", err.to_string())
        }
        BillingError::PlanNotFound | BillingError::PaymentNotFound | BillingError::UserNotFound => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        BillingError::Confirmation(e) => {
            json_error(StatusCode::BAD_REQUEST, "payment_not_confirmed", e.to_string())
        }
        BillingError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        BillingError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        BillingError::Store(e) => store_error_to_response(e),
    }
}

pub fn membership_error_to_response(err: MembershipError) -> Response {
    match err {
        MembershipError::InsufficientPermission => {
            json_error(StatusCode::UNAUTHORIZED, "insufficient_permission", err.to_string())
        }
        MembershipError::OrganizationNotFound
        | MembershipError::UserNotFound
        | MembershipError::RoleNotFound => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        MembershipError::InvalidRole => json_error(StatusCode::BAD_REQUEST, "invalid_role", err.to_string()),
        MembershipError::NotInRole => json_error(StatusCode::FORBIDDEN, "not_in_role", err.to_string()),
        MembershipError::Store(e) => store_error_to_response(e),
    }
}

/// Store failures never leak their detail to the client.
pub fn store_error_to_response(err: StoreError) -> Response {
    match err {
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Backend(detail) => {
            tracing::error!(%detail, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", INTERNAL_ERROR_MESSAGE)
        }
    }
}

pub fn unauthenticated() -> Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "Not authenticated")
}

pub fn superadmin_required() -> Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", "Superadmin access required")
}

pub fn invalid_id(what: &str) -> Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "status_code": status.as_u16(),
            "success": false,
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn success_response(status: StatusCode, message: impl Into<String>, data: impl Serialize) -> Response {
    (
        status,
        axum::Json(json!({
            "status_code": status.as_u16(),
            "success": true,
            "message": message.into(),
            "data": data,
        })),
    )
        .into_response()
}
