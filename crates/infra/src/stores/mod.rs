//! Store implementations behind the domain store traits.
//!
//! `in_memory` backs tests and local development; `postgres` is the
//! persistent implementation selected with `USE_PERSISTENT_STORES=true`.

pub mod in_memory;
pub mod postgres;

pub use in_memory::{
    InMemoryBillingPlanStore, InMemoryMembershipStore, InMemoryPaymentStore, InMemoryUserDirectory,
};
pub use postgres::{
    PostgresBillingPlanStore, PostgresMembershipStore, PostgresPaymentStore, PostgresUserDirectory,
};
