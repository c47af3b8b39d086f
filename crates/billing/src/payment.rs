//! Payment records and the store contract behind them.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use convey_core::{DomainError, Page, PageRequest, PaymentId, StoreError, UserId};

/// Status written for payments recorded after a confirmed gateway callback.
pub const STATUS_COMPLETED: &str = "completed";

/// A persisted payment. Only created once the gateway has confirmed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    pub status: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when recording a payment; id and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub user_id: UserId,
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    pub status: String,
    pub transaction_id: String,
}

impl NewPayment {
    pub fn into_payment(self, id: PaymentId, now: DateTime<Utc>) -> Payment {
        Payment {
            id,
            user_id: self.user_id,
            amount: self.amount,
            currency: self.currency,
            method: self.method,
            status: self.status,
            transaction_id: self.transaction_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentUpdate {
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub method: Option<String>,
    pub status: Option<String>,
}

impl PaymentUpdate {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none() && self.currency.is_none() && self.method.is_none() && self.status.is_none()
    }

    pub fn apply(self, payment: &mut Payment, now: DateTime<Utc>) {
        if let Some(amount) = self.amount {
            payment.amount = amount;
        }
        if let Some(currency) = self.currency {
            payment.currency = currency;
        }
        if let Some(method) = self.method {
            payment.method = method;
        }
        if let Some(status) = self.status {
            payment.status = status;
        }
        payment.updated_at = now;
    }
}

/// Payment fields that list queries may filter on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentField {
    UserId,
    Currency,
    Method,
    Status,
    TransactionId,
}

impl PaymentField {
    const BY_NAME: [(&'static str, PaymentField); 5] = [
        ("user_id", PaymentField::UserId),
        ("currency", PaymentField::Currency),
        ("method", PaymentField::Method),
        ("status", PaymentField::Status),
        ("transaction_id", PaymentField::TransactionId),
    ];

    pub fn name(&self) -> &'static str {
        Self::BY_NAME
            .iter()
            .find(|(_, f)| f == self)
            .map(|(n, _)| *n)
            .unwrap_or_default()
    }

    /// Column backing this field in the `payments` table.
    pub fn column(&self) -> &'static str {
        self.name()
    }

    /// Text form of the field on a record, as compared by filters.
    pub fn value_of(&self, payment: &Payment) -> String {
        match self {
            PaymentField::UserId => payment.user_id.to_string(),
            PaymentField::Currency => payment.currency.clone(),
            PaymentField::Method => payment.method.clone(),
            PaymentField::Status => payment.status.clone(),
            PaymentField::TransactionId => payment.transaction_id.clone(),
        }
    }
}

impl FromStr for PaymentField {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::BY_NAME
            .iter()
            .find(|(n, _)| *n == s)
            .map(|(_, f)| *f)
            .ok_or_else(|| DomainError::validation(format!("unknown payment filter field '{s}'")))
    }
}

/// Conjunction of case-insensitive substring matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentFilter {
    criteria: Vec<(PaymentField, String)>,
}

impl PaymentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a criterion. Empty values are ignored.
    pub fn with(mut self, field: PaymentField, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.criteria.push((field, value));
        }
        self
    }

    /// Build a filter from raw `name=value` pairs, rejecting unknown field names.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        pairs.into_iter().try_fold(Self::new(), |filter, (name, value)| {
            let field: PaymentField = name.as_ref().parse()?;
            Ok(filter.with(field, value))
        })
    }

    pub fn criteria(&self) -> &[(PaymentField, String)] {
        &self.criteria
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn matches(&self, payment: &Payment) -> bool {
        self.criteria.iter().all(|(field, needle)| {
            field
                .value_of(payment)
                .to_lowercase()
                .contains(&needle.to_lowercase())
        })
    }
}

/// Storage for payment records.
#[async_trait::async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persist a new payment. Fails with `StoreError::Conflict` when the
    /// transaction id was already recorded.
    async fn create(&self, payment: NewPayment) -> Result<Payment, StoreError>;

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>, StoreError>;

    async fn get_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>, StoreError>;

    /// One page of a user's payments, oldest first.
    async fn list_by_user(&self, user_id: UserId, page: PageRequest) -> Result<Page<Payment>, StoreError>;

    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, StoreError>;

    /// Returns `None` when no payment has this id.
    async fn update(&self, id: PaymentId, update: PaymentUpdate) -> Result<Option<Payment>, StoreError>;

    /// Returns `false` when no payment has this id.
    async fn delete(&self, id: PaymentId) -> Result<bool, StoreError>;
}
