use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::put,
};

use convey_core::{OrganizationId, RoleId, UserId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new().route("/:org_id/users/:user_id/roles/:role_id", put(remove_user_from_role))
}

pub async fn remove_user_from_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path((org_id, user_id, role_id)): Path<(String, String, String)>,
) -> axum::response::Response {
    let org_id: OrganizationId = match org_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("organization"),
    };
    let user_id: UserId = match user_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("user"),
    };
    let role_id: RoleId = match role_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("role"),
    };

    match services
        .memberships
        .remove(org_id, user_id, role_id, current.user())
        .await
    {
        Ok(edge) => errors::success_response(
            StatusCode::OK,
            "User successfully removed from role",
            dto::RoleRemovalData::from(edge),
        ),
        Err(e) => errors::membership_error_to_response(e),
    }
}
