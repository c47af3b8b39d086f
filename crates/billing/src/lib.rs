//! `convey-billing`: subscription billing through a hosted payment gateway.
//!
//! - `plan`: billing plans and their lookup
//! - `payment`: payment records, field filters and the record store contract
//! - `gateway`: gateway names, callback payloads and the verification seam
//! - `confirmation`: the checks a callback must pass before a payment is recorded
//! - `orchestrator`: the configure/handle checkout flows
//! - `service`: payment record queries and admin edits

pub mod confirmation;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod payment;
pub mod plan;
pub mod service;

pub use confirmation::{ConfirmationError, confirm_payment};
pub use error::BillingError;
pub use gateway::{CallbackPayload, GatewayError, GatewayVerifier, PaymentGateway, VerifiedTransaction};
pub use orchestrator::{CheckoutSettings, PaymentConfigData, PaymentOrchestrator};
pub use payment::{NewPayment, Payment, PaymentField, PaymentFilter, PaymentStore, PaymentUpdate};
pub use plan::{BillingPlan, BillingPlanStore};
pub use service::PaymentService;
