//! Organization role memberships and the admin-guarded removal flow.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use convey_core::{OrganizationId, RoleId, StoreError, UserId};

use crate::roles::Role;
use crate::user::{User, UserDirectory};

/// An organization that users can hold roles in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
}

/// The association granting `user_id` the role `role_id` within `organization_id`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MembershipEdge {
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub role_id: RoleId,
}

/// Storage for organizations, roles and membership edges.
#[async_trait::async_trait]
pub trait MembershipStore: Send + Sync {
    async fn organization(&self, id: OrganizationId) -> Result<Option<Organization>, StoreError>;

    async fn role(&self, id: RoleId) -> Result<Option<Role>, StoreError>;

    /// Roles `user_id` currently holds in `organization_id`.
    async fn roles_in_organization(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Vec<Role>, StoreError>;

    async fn edge_exists(&self, edge: &MembershipEdge) -> Result<bool, StoreError>;

    /// Delete an edge. Returns `false` when there was nothing to delete.
    async fn remove_edge(&self, edge: &MembershipEdge) -> Result<bool, StoreError>;
}

/// Reasons a role removal is refused. The display text is user-facing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MembershipError {
    #[error("Insufficient permission. Admin required.")]
    InsufficientPermission,

    #[error("Organization does not exist")]
    OrganizationNotFound,

    #[error("User does not exist")]
    UserNotFound,

    #[error("Role does not exist")]
    RoleNotFound,

    #[error("Invalid role")]
    InvalidRole,

    #[error("User not found in role")]
    NotInRole,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Checks and applies "remove user from role" requests.
///
/// Checks run in a fixed order and stop at the first failure:
/// requester is an org admin, organization exists, target user exists,
/// role exists, role name is recognized, edge exists.
#[derive(Clone)]
pub struct RoleMembershipAuthorizer {
    memberships: Arc<dyn MembershipStore>,
    users: Arc<dyn UserDirectory>,
}

impl RoleMembershipAuthorizer {
    pub fn new(memberships: Arc<dyn MembershipStore>, users: Arc<dyn UserDirectory>) -> Self {
        Self { memberships, users }
    }

    #[instrument(
        skip(self, requester),
        fields(requester = %requester.id),
        err(Display)
    )]
    pub async fn remove(
        &self,
        organization_id: OrganizationId,
        target_user_id: UserId,
        role_id: RoleId,
        requester: &User,
    ) -> Result<MembershipEdge, MembershipError> {
        let requester_roles = self
            .memberships
            .roles_in_organization(organization_id, requester.id)
            .await?;
        if !requester_roles.iter().any(Role::is_admin) {
            return Err(MembershipError::InsufficientPermission);
        }

        if self.memberships.organization(organization_id).await?.is_none() {
            return Err(MembershipError::OrganizationNotFound);
        }

        if !self.users.exists(target_user_id).await? {
            return Err(MembershipError::UserNotFound);
        }

        let role = self
            .memberships
            .role(role_id)
            .await?
            .ok_or(MembershipError::RoleNotFound)?;
        if role.recognized_name().is_err() {
            return Err(MembershipError::InvalidRole);
        }

        let edge = MembershipEdge {
            organization_id,
            user_id: target_user_id,
            role_id,
        };
        if !self.memberships.edge_exists(&edge).await? {
            return Err(MembershipError::NotInRole);
        }

        // A concurrent removal between the check and the delete reads as "not in role".
        if !self.memberships.remove_edge(&edge).await? {
            return Err(MembershipError::NotInRole);
        }

        tracing::info!(
            organization_id = %organization_id,
            user_id = %target_user_id,
            role = %role.name,
            "user removed from role"
        );
        Ok(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Fixture {
        users: HashMap<UserId, User>,
        orgs: HashMap<OrganizationId, Organization>,
        roles: HashMap<RoleId, Role>,
        edges: Mutex<HashSet<MembershipEdge>>,
    }

    #[async_trait::async_trait]
    impl UserDirectory for Fixture {
        async fn get(&self, id: UserId) -> Result<Option<User>, StoreError> {
            Ok(self.users.get(&id).cloned())
        }
    }

    #[async_trait::async_trait]
    impl MembershipStore for Fixture {
        async fn organization(&self, id: OrganizationId) -> Result<Option<Organization>, StoreError> {
            Ok(self.orgs.get(&id).cloned())
        }

        async fn role(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
            Ok(self.roles.get(&id).cloned())
        }

        async fn roles_in_organization(
            &self,
            organization_id: OrganizationId,
            user_id: UserId,
        ) -> Result<Vec<Role>, StoreError> {
            let edges = self.edges.lock().unwrap();
            Ok(edges
                .iter()
                .filter(|e| e.organization_id == organization_id && e.user_id == user_id)
                .filter_map(|e| self.roles.get(&e.role_id).cloned())
                .collect())
        }

        async fn edge_exists(&self, edge: &MembershipEdge) -> Result<bool, StoreError> {
            Ok(self.edges.lock().unwrap().contains(edge))
        }

        async fn remove_edge(&self, edge: &MembershipEdge) -> Result<bool, StoreError> {
            Ok(self.edges.lock().unwrap().remove(edge))
        }
    }

    fn user(first: &str) -> User {
        User {
            id: UserId::new(),
            email: format!("{first}@example.com"),
            first_name: first.to_string(),
            last_name: "test".to_string(),
            is_active: true,
            is_superadmin: false,
        }
    }

    struct Scenario {
        fixture: Arc<Fixture>,
        admin: User,
        member: User,
        org: OrganizationId,
        user_role: RoleId,
    }

    impl Scenario {
        fn build(admin_is_admin: bool, member_in_role: bool, user_role_name: &str) -> Self {
            let admin = user("admin");
            let member = user("member");
            let org = Organization {
                id: OrganizationId::new(),
                name: "Org 1".to_string(),
            };
            let admin_role = Role::new(RoleId::new(), if admin_is_admin { "admin" } else { "user" });
            let user_role = Role::new(RoleId::new(), user_role_name);

            let mut edges = HashSet::new();
            edges.insert(MembershipEdge {
                organization_id: org.id,
                user_id: admin.id,
                role_id: admin_role.id,
            });
            if member_in_role {
                edges.insert(MembershipEdge {
                    organization_id: org.id,
                    user_id: member.id,
                    role_id: user_role.id,
                });
            }

            let fixture = Fixture {
                users: [(admin.id, admin.clone()), (member.id, member.clone())].into(),
                orgs: [(org.id, org.clone())].into(),
                roles: [(admin_role.id, admin_role), (user_role.id, user_role.clone())].into(),
                edges: Mutex::new(edges),
            };

            Self {
                fixture: Arc::new(fixture),
                admin,
                member,
                org: org.id,
                user_role: user_role.id,
            }
        }

        fn authorizer(&self) -> RoleMembershipAuthorizer {
            RoleMembershipAuthorizer::new(self.fixture.clone(), self.fixture.clone())
        }
    }

    #[tokio::test]
    async fn admin_removes_member_from_role() {
        let s = Scenario::build(true, true, "user");
        let edge = s
            .authorizer()
            .remove(s.org, s.member.id, s.user_role, &s.admin)
            .await
            .unwrap();

        assert_eq!(edge.user_id, s.member.id);
        assert!(!s.fixture.edge_exists(&edge).await.unwrap());
    }

    #[tokio::test]
    async fn non_admin_is_refused_even_when_everything_exists() {
        let s = Scenario::build(false, true, "user");
        let err = s
            .authorizer()
            .remove(s.org, s.member.id, s.user_role, &s.admin)
            .await
            .unwrap_err();
        assert_eq!(err, MembershipError::InsufficientPermission);
    }

    #[tokio::test]
    async fn admin_check_runs_before_organization_lookup() {
        let s = Scenario::build(true, true, "user");
        let err = s
            .authorizer()
            .remove(OrganizationId::new(), s.member.id, s.user_role, &s.admin)
            .await
            .unwrap_err();
        // The requester is not an admin of an unknown organization.
        assert_eq!(err, MembershipError::InsufficientPermission);
    }

    #[tokio::test]
    async fn admin_edge_in_deleted_organization_reports_missing_organization() {
        let s = Scenario::build(true, true, "user");
        let ghost_org = OrganizationId::new();
        let admin_role = s
            .fixture
            .roles_in_organization(s.org, s.admin.id)
            .await
            .unwrap()
            .remove(0);
        s.fixture.edges.lock().unwrap().insert(MembershipEdge {
            organization_id: ghost_org,
            user_id: s.admin.id,
            role_id: admin_role.id,
        });

        let err = s
            .authorizer()
            .remove(ghost_org, s.member.id, s.user_role, &s.admin)
            .await
            .unwrap_err();
        assert_eq!(err, MembershipError::OrganizationNotFound);
        assert_eq!(err.to_string(), "Organization does not exist");
    }

    #[tokio::test]
    async fn unknown_user_and_role_are_reported_separately() {
        let s = Scenario::build(true, true, "user");
        let authz = s.authorizer();

        let err = authz
            .remove(s.org, UserId::new(), s.user_role, &s.admin)
            .await
            .unwrap_err();
        assert_eq!(err, MembershipError::UserNotFound);

        let err = authz
            .remove(s.org, s.member.id, RoleId::new(), &s.admin)
            .await
            .unwrap_err();
        assert_eq!(err, MembershipError::RoleNotFound);
    }

    #[tokio::test]
    async fn missing_edge_is_distinct_from_missing_entities() {
        let s = Scenario::build(true, false, "user");
        let err = s
            .authorizer()
            .remove(s.org, s.member.id, s.user_role, &s.admin)
            .await
            .unwrap_err();
        assert_eq!(err, MembershipError::NotInRole);
    }

    #[tokio::test]
    async fn unrecognized_role_name_is_invalid() {
        let s = Scenario::build(true, true, "ghost");
        let err = s
            .authorizer()
            .remove(s.org, s.member.id, s.user_role, &s.admin)
            .await
            .unwrap_err();
        assert_eq!(err, MembershipError::InvalidRole);
        assert_eq!(err.to_string(), "Invalid role");
    }
}
