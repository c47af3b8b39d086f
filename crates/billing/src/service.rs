use std::sync::Arc;

use tracing::instrument;

use convey_auth::UserDirectory;
use convey_core::{Page, PageRequest, PaymentId, UserId};

use crate::error::BillingError;
use crate::payment::{NewPayment, Payment, PaymentFilter, PaymentStore, PaymentUpdate};

/// Record-level payment operations (lookup, listing, admin edits).
#[derive(Clone)]
pub struct PaymentService {
    payments: Arc<dyn PaymentStore>,
    users: Arc<dyn UserDirectory>,
}

impl PaymentService {
    pub fn new(payments: Arc<dyn PaymentStore>, users: Arc<dyn UserDirectory>) -> Self {
        Self { payments, users }
    }

    #[instrument(skip(self, payment), fields(user_id = %payment.user_id), err(Display))]
    pub async fn create(&self, payment: NewPayment) -> Result<Payment, BillingError> {
        let payment = self.payments.create(payment).await?;
        tracing::info!(payment_id = %payment.id, "payment created");
        Ok(payment)
    }

    pub async fn fetch(&self, id: PaymentId) -> Result<Payment, BillingError> {
        self.payments.get(id).await?.ok_or(BillingError::PaymentNotFound)
    }

    pub async fn fetch_by_transaction_id(&self, transaction_id: &str) -> Result<Payment, BillingError> {
        self.payments
            .get_by_transaction_id(transaction_id)
            .await?
            .ok_or(BillingError::PaymentNotFound)
    }

    /// One page of `user_id`'s payments. `limit` and `page` must both be at least 1.
    #[instrument(skip(self), err(Display))]
    pub async fn fetch_by_user(
        &self,
        user_id: UserId,
        limit: u32,
        page: u32,
    ) -> Result<Page<Payment>, BillingError> {
        let request = PageRequest::new(limit, page)?;
        if !self.users.exists(user_id).await? {
            return Err(BillingError::UserNotFound);
        }
        Ok(self.payments.list_by_user(user_id, request).await?)
    }

    pub async fn fetch_all(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, BillingError> {
        Ok(self.payments.list(filter).await?)
    }

    #[instrument(skip(self, update), err(Display))]
    pub async fn update(&self, id: PaymentId, update: PaymentUpdate) -> Result<Payment, BillingError> {
        if update.is_empty() {
            return Err(BillingError::Validation("no fields to update".to_string()));
        }
        let payment = self
            .payments
            .update(id, update)
            .await?
            .ok_or(BillingError::PaymentNotFound)?;
        tracing::info!(payment_id = %id, status = %payment.status, "payment updated");
        Ok(payment)
    }

    #[instrument(skip(self), err(Display))]
    pub async fn delete(&self, id: PaymentId) -> Result<(), BillingError> {
        if !self.payments.delete(id).await? {
            return Err(BillingError::PaymentNotFound);
        }
        tracing::info!(payment_id = %id, "payment deleted");
        Ok(())
    }
}
