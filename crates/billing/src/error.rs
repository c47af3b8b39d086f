use thiserror::Error;

use convey_core::{DomainError, StoreError};

use crate::confirmation::ConfirmationError;

/// Failures of the billing flows. Display text is user-facing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BillingError {
    #[error("Only flutterwave supported for now")]
    UnsupportedGateway,

    #[error("Billing plan not found.")]
    PlanNotFound,

    #[error("Payment not found")]
    PaymentNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error(transparent)]
    Confirmation(#[from] ConfirmationError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for BillingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => BillingError::Conflict(msg),
            other => BillingError::Store(other),
        }
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        BillingError::Validation(err.to_string())
    }
}
