//! Callback confirmation: the checks a gateway callback must pass before a
//! payment is recorded.
//!
//! Checks run in order and stop at the first failure. The callback payload is
//! checked first (cheap, local), then the gateway is asked for its own record
//! of the transaction, which must agree with the billing plan to the cent.

use thiserror::Error;
use tracing::instrument;

use convey_core::UserId;

use crate::gateway::{CallbackPayload, GatewayError, GatewayVerifier, VerifiedTransaction};
use crate::plan::BillingPlan;

/// Callback statuses that mean the payer finished checkout.
const CALLBACK_SUCCESS_STATUSES: [&str; 2] = ["successful", "completed"];

/// Status the verification API reports for a found transaction.
const VERIFIED_SUCCESS_STATUS: &str = "success";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfirmationError {
    #[error("Transaction reference error.")]
    CallbackReferenceMismatch,

    #[error("Transaction not successful.")]
    CallbackNotSuccessful,

    #[error("Transaction id not found.")]
    MissingTransactionId,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Invalid response txn ref. If you were debited, contact your bank.")]
    VerifiedReferenceMismatch,

    #[error("No success response. If you were debited, contact your bank.")]
    VerifiedNotSuccessful,

    #[error("Incomplete transaction. If you were debited, contact your bank.")]
    IncompleteTransaction,

    #[error("Invalid payment amount. If you were debited, contact your bank.")]
    AmountMismatch,

    #[error("Invalid currency. If you were debited, contact your bank.")]
    CurrencyMismatch,
}

/// Confirm that `payload` describes a completed payment of `plan` by `user_id`.
///
/// Returns the gateway's verified transaction on success.
#[instrument(skip(verifier, payload, plan), fields(plan_id = %plan.id), err(level = "warn", Display))]
pub async fn confirm_payment(
    verifier: &dyn GatewayVerifier,
    user_id: UserId,
    payload: &CallbackPayload,
    plan: &BillingPlan,
) -> Result<VerifiedTransaction, ConfirmationError> {
    let expected_ref = user_id.to_string();

    check_callback(&expected_ref, payload)?;

    let verified = verifier.verify(&expected_ref).await?;

    check_verified(&expected_ref, &verified, plan)?;

    Ok(verified)
}

fn check_callback(expected_ref: &str, payload: &CallbackPayload) -> Result<(), ConfirmationError> {
    if payload.tx_ref.as_deref() != Some(expected_ref) {
        return Err(ConfirmationError::CallbackReferenceMismatch);
    }

    let status = payload.status.as_deref().unwrap_or_default();
    if !CALLBACK_SUCCESS_STATUSES.contains(&status) {
        return Err(ConfirmationError::CallbackNotSuccessful);
    }

    if payload.transaction_id.as_deref().is_none_or(str::is_empty) {
        return Err(ConfirmationError::MissingTransactionId);
    }

    Ok(())
}

fn check_verified(
    expected_ref: &str,
    verified: &VerifiedTransaction,
    plan: &BillingPlan,
) -> Result<(), ConfirmationError> {
    if verified.tx_ref != expected_ref {
        return Err(ConfirmationError::VerifiedReferenceMismatch);
    }
    if verified.status != VERIFIED_SUCCESS_STATUS {
        return Err(ConfirmationError::VerifiedNotSuccessful);
    }
    if !verified.transaction_complete {
        return Err(ConfirmationError::IncompleteTransaction);
    }
    // Decimal equality ignores scale: 5000 == 5000.00.
    if verified.price != plan.price {
        return Err(ConfirmationError::AmountMismatch);
    }
    if verified.currency != plan.currency {
        return Err(ConfirmationError::CurrencyMismatch);
    }
    Ok(())
}
