//! `convey-core`: shared foundation types.
//!
//! Strongly-typed identifiers, the domain error model and pagination. No
//! infrastructure concerns live here.

pub mod error;
pub mod id;
pub mod pagination;
pub mod store;

pub use error::{DomainError, DomainResult};
pub use id::{BillingPlanId, OrganizationId, PaymentId, RoleId, UserId};
pub use pagination::{Page, PageMeta, PageRequest};
pub use store::StoreError;
