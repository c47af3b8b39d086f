//! Payment gateway names, callback payloads and the verification seam.

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::BillingError;

/// Gateways the product knows about. Only Flutterwave can take payments today.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentGateway {
    Stripe,
    Flutterwave,
    Lemonsqueezy,
}

impl PaymentGateway {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentGateway::Stripe => "stripe",
            PaymentGateway::Flutterwave => "flutterwave",
            PaymentGateway::Lemonsqueezy => "lemonsqueezy",
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, PaymentGateway::Flutterwave)
    }

    /// Parse a gateway path segment and require it to be supported.
    ///
    /// Unknown names and known-but-unsupported gateways fail the same way.
    pub fn supported(name: &str) -> Result<Self, BillingError> {
        match name.parse::<PaymentGateway>() {
            Ok(gateway) if gateway.is_supported() => Ok(gateway),
            _ => Err(BillingError::UnsupportedGateway),
        }
    }
}

impl core::fmt::Display for PaymentGateway {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown payment gateway '{0}'")]
pub struct UnknownGateway(pub String);

impl FromStr for PaymentGateway {
    type Err = UnknownGateway;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stripe" => Ok(PaymentGateway::Stripe),
            "flutterwave" => Ok(PaymentGateway::Flutterwave),
            "lemonsqueezy" => Ok(PaymentGateway::Lemonsqueezy),
            other => Err(UnknownGateway(other.to_string())),
        }
    }
}

/// What the gateway hands back to us after checkout (redirect query string).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub tx_ref: Option<String>,
    pub status: Option<String>,
    pub transaction_id: Option<String>,
}

/// The gateway's own view of a transaction, fetched server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedTransaction {
    pub tx_ref: String,
    pub status: String,
    pub transaction_complete: bool,
    pub price: Decimal,
    pub currency: String,
}

/// Gateway verification failures. Display text is shown to the payer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway answered and refused the verification.
    #[error("Error: {message} [{reference}].")]
    Rejected { message: String, reference: String },

    /// The gateway could not be reached.
    #[error("Error: {0}.")]
    Transport(String),

    /// The gateway answered with something we could not read.
    #[error("Error: unreadable gateway response ({0}).")]
    Malformed(String),
}

/// Server-side transaction verification against the gateway.
#[async_trait::async_trait]
pub trait GatewayVerifier: Send + Sync {
    /// Look up the transaction registered under `tx_ref`. Single attempt.
    async fn verify(&self, tx_ref: &str) -> Result<VerifiedTransaction, GatewayError>;
}
