use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection, rejection::QueryRejection},
    http::StatusCode,
    routing::get,
};

use convey_billing::{BillingError, CallbackPayload, PaymentFilter, PaymentGateway, PaymentUpdate};
use convey_core::{BillingPlanId, PaymentId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_payments))
        .route("/current-user", get(current_user_payments))
        .route("/configure/:plan_id/:gateway", get(configure_payment))
        .route("/handle/:plan_id/:gateway", get(handle_payment))
        .route(
            "/:payment_id",
            get(get_payment).patch(update_payment).delete(delete_payment),
        )
}

/// Unknown gateways are rejected before the plan id is even looked at, so an
/// unsupported gateway always answers 403. An unparseable plan id can never
/// name a plan and reads as "not found".
fn checkout_target(plan_id: &str, gateway: &str) -> Result<BillingPlanId, axum::response::Response> {
    PaymentGateway::supported(gateway).map_err(errors::billing_error_to_response)?;
    plan_id
        .parse()
        .map_err(|_| errors::billing_error_to_response(BillingError::PlanNotFound))
}

fn query_rejected(e: QueryRejection) -> axum::response::Response {
    errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text())
}

pub async fn configure_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path((plan_id, gateway)): Path<(String, String)>,
) -> axum::response::Response {
    let plan_id = match checkout_target(&plan_id, &gateway) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.checkout.configure(plan_id, &gateway, current.user()).await {
        Ok(data) => errors::success_response(StatusCode::OK, "Payment data configured successfully", data),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn handle_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path((plan_id, gateway)): Path<(String, String)>,
    payload: Result<Query<CallbackPayload>, QueryRejection>,
) -> axum::response::Response {
    let plan_id = match checkout_target(&plan_id, &gateway) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Query(payload) = match payload {
        Ok(q) => q,
        Err(e) => return query_rejected(e),
    };

    match services.checkout.handle(plan_id, &gateway, &payload, current.user()).await {
        Ok(payment) => errors::success_response(StatusCode::CREATED, "Payment added successfully", payment),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn current_user_payments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    query: Result<Query<dto::PageQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return query_rejected(e),
    };

    let user_id = current.user().id;
    let page = match services
        .payments
        .fetch_by_user(user_id, query.limit(), query.page())
        .await
    {
        Ok(page) => page,
        Err(e) => return errors::billing_error_to_response(e),
    };

    if page.is_empty() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "Payments not found for user");
    }

    errors::success_response(
        StatusCode::OK,
        "Payments fetched successfully",
        dto::UserPaymentsData::new(user_id, page),
    )
}

pub async fn get_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(payment_id): Path<String>,
) -> axum::response::Response {
    let id: PaymentId = match payment_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("payment"),
    };

    match services.payments.fetch(id).await {
        Ok(payment) => errors::success_response(StatusCode::OK, "Payment fetched successfully", payment),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn list_payments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> axum::response::Response {
    if !current.is_superadmin() {
        return errors::superadmin_required();
    }
    let Query(pairs) = match pairs {
        Ok(q) => q,
        Err(e) => return query_rejected(e),
    };

    let filter = match PaymentFilter::from_pairs(pairs) {
        Ok(f) => f,
        Err(e) => return errors::billing_error_to_response(e.into()),
    };

    match services.payments.fetch_all(&filter).await {
        Ok(payments) => errors::success_response(StatusCode::OK, "Payments fetched successfully", payments),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn update_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(payment_id): Path<String>,
    body: Result<Json<PaymentUpdate>, JsonRejection>,
) -> axum::response::Response {
    if !current.is_superadmin() {
        return errors::superadmin_required();
    }
    let id: PaymentId = match payment_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("payment"),
    };
    let Json(update) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()),
    };

    match services.payments.update(id, update).await {
        Ok(payment) => errors::success_response(StatusCode::OK, "Payment updated successfully", payment),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn delete_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(payment_id): Path<String>,
) -> axum::response::Response {
    if !current.is_superadmin() {
        return errors::superadmin_required();
    }
    let id: PaymentId = match payment_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("payment"),
    };

    match services.payments.delete(id).await {
        Ok(()) => errors::success_response(StatusCode::OK, "Payment deleted successfully", serde_json::Value::Null),
        Err(e) => errors::billing_error_to_response(e),
    }
}
