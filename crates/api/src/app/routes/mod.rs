use axum::Router;

pub mod organizations;
pub mod payments;
pub mod system;

/// Router for all authenticated endpoints (mounted under `/api/v1`).
pub fn router() -> Router {
    Router::new()
        .nest("/payments", payments::router())
        .nest("/organizations", organizations::router())
}
