//! `convey-auth`: authentication and role-membership authorization.
//!
//! Decoupled from HTTP and storage: token checks are pure, and directory
//! access goes through the [`UserDirectory`] and [`MembershipStore`] traits.

pub mod claims;
pub mod jwt;
pub mod membership;
pub mod roles;
pub mod user;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use membership::{
    MembershipEdge, MembershipError, MembershipStore, Organization, RoleMembershipAuthorizer,
};
pub use roles::{InvalidRoleName, Role, RoleName};
pub use user::{User, UserDirectory};
