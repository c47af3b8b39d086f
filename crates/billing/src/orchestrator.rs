//! Hosted-checkout flows: prepare the data the client needs to redirect the
//! payer to the gateway, and record the payment once the gateway calls back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use convey_auth::User;
use convey_core::BillingPlanId;

use crate::confirmation::confirm_payment;
use crate::error::BillingError;
use crate::gateway::{CallbackPayload, GatewayVerifier, PaymentGateway};
use crate::payment::{NewPayment, Payment, PaymentStore, STATUS_COMPLETED};
use crate::plan::{BillingPlan, BillingPlanStore};

/// Flutterwave's hosted one-off payment page.
pub const FLUTTERWAVE_ONE_OFF_PAY_URL: &str = "https://checkout.flutterwave.com/v3/hosted/pay";

/// Static checkout presentation and gateway credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSettings {
    /// Externally reachable origin of this API, without a trailing slash.
    pub public_base_url: String,
    /// Gateway public key handed to the client.
    pub public_key: String,
    pub action_url: String,
    pub payment_title: String,
    pub payment_description: String,
}

impl CheckoutSettings {
    pub fn new(public_base_url: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            public_key: public_key.into(),
            action_url: FLUTTERWAVE_ONE_OFF_PAY_URL.to_string(),
            payment_title: "Convey AI Video Suites".to_string(),
            payment_description: "User subscription payment".to_string(),
        }
    }

    /// Where the gateway sends the payer back to after checkout.
    pub fn redirect_url(&self, plan_id: BillingPlanId, gateway: PaymentGateway) -> String {
        format!(
            "{}/api/v1/payments/handle/{}/{}",
            self.public_base_url, plan_id, gateway
        )
    }
}

/// Everything the client needs to start a hosted checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfigData {
    pub tx_ref: String,
    pub price: Decimal,
    pub currency: String,
    pub redirect_url: String,
    pub public_key: String,
    pub action_url: String,
    pub payment_title: String,
    pub payment_description: String,
    pub user_email: String,
    pub user_name: String,
}

/// Transaction reference handed to the gateway: `{user_id}#{unix_seconds}`.
pub fn transaction_reference(user: &User, now: DateTime<Utc>) -> String {
    format!("{}#{}", user.id, now.timestamp())
}

#[derive(Clone)]
pub struct PaymentOrchestrator {
    plans: Arc<dyn BillingPlanStore>,
    payments: Arc<dyn PaymentStore>,
    verifier: Arc<dyn GatewayVerifier>,
    checkout: CheckoutSettings,
}

impl PaymentOrchestrator {
    pub fn new(
        plans: Arc<dyn BillingPlanStore>,
        payments: Arc<dyn PaymentStore>,
        verifier: Arc<dyn GatewayVerifier>,
        checkout: CheckoutSettings,
    ) -> Self {
        Self {
            plans,
            payments,
            verifier,
            checkout,
        }
    }

    /// Build checkout data for `user` buying `plan_id`. Persists nothing.
    #[instrument(skip(self, user), fields(user_id = %user.id), err(Display))]
    pub async fn configure(
        &self,
        plan_id: BillingPlanId,
        gateway: &str,
        user: &User,
    ) -> Result<PaymentConfigData, BillingError> {
        let gateway = PaymentGateway::supported(gateway)?;
        let plan = self.plan(plan_id).await?;

        Ok(PaymentConfigData {
            tx_ref: transaction_reference(user, Utc::now()),
            price: plan.price,
            currency: plan.currency,
            redirect_url: self.checkout.redirect_url(plan_id, gateway),
            public_key: self.checkout.public_key.clone(),
            action_url: self.checkout.action_url.clone(),
            payment_title: self.checkout.payment_title.clone(),
            payment_description: self.checkout.payment_description.clone(),
            user_email: user.email.clone(),
            user_name: user.full_name(),
        })
    }

    /// Confirm a gateway callback and record the payment.
    ///
    /// A rejected callback is logged once, by [`confirm_payment`].
    #[instrument(skip(self, payload, user), fields(user_id = %user.id))]
    pub async fn handle(
        &self,
        plan_id: BillingPlanId,
        gateway: &str,
        payload: &CallbackPayload,
        user: &User,
    ) -> Result<Payment, BillingError> {
        let gateway = PaymentGateway::supported(gateway)?;
        let plan = self.plan(plan_id).await?;

        confirm_payment(self.verifier.as_ref(), user.id, payload, &plan).await?;

        let transaction_id = payload.transaction_id.clone().unwrap_or_default();
        let payment = self
            .payments
            .create(NewPayment {
                user_id: user.id,
                amount: plan.price,
                currency: plan.currency,
                method: gateway.as_str().to_string(),
                status: STATUS_COMPLETED.to_string(),
                transaction_id,
            })
            .await?;

        tracing::info!(
            payment_id = %payment.id,
            transaction_id = %payment.transaction_id,
            amount = %payment.amount,
            currency = %payment.currency,
            "payment recorded"
        );
        Ok(payment)
    }

    async fn plan(&self, id: BillingPlanId) -> Result<BillingPlan, BillingError> {
        self.plans.get(id).await?.ok_or(BillingError::PlanNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use convey_core::{OrganizationId, Page, PageRequest, PaymentId, StoreError, UserId};
    use rust_decimal_macros::dec;

    use crate::confirmation::ConfirmationError;
    use crate::gateway::{GatewayError, VerifiedTransaction};
    use crate::payment::{PaymentFilter, PaymentUpdate};

    struct Plans(HashMap<BillingPlanId, BillingPlan>);

    #[async_trait::async_trait]
    impl BillingPlanStore for Plans {
        async fn get(&self, id: BillingPlanId) -> Result<Option<BillingPlan>, StoreError> {
            Ok(self.0.get(&id).cloned())
        }
    }

    #[derive(Default)]
    struct Payments(Mutex<Vec<Payment>>);

    #[async_trait::async_trait]
    impl PaymentStore for Payments {
        async fn create(&self, payment: NewPayment) -> Result<Payment, StoreError> {
            let mut all = self.0.lock().unwrap();
            if all.iter().any(|p| p.transaction_id == payment.transaction_id) {
                return Err(StoreError::Conflict("duplicate transaction".to_string()));
            }
            let payment = payment.into_payment(PaymentId::new(), Utc::now());
            all.push(payment.clone());
            Ok(payment)
        }

        async fn get(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
            Ok(self.0.lock().unwrap().iter().find(|p| p.id == id).cloned())
        }

        async fn get_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>, StoreError> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.transaction_id == transaction_id)
                .cloned())
        }

        async fn list_by_user(&self, user_id: UserId, page: PageRequest) -> Result<Page<Payment>, StoreError> {
            let mine: Vec<Payment> = self
                .0
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.user_id == user_id)
                .cloned()
                .collect();
            Ok(Page::from_slice(&mine, page))
        }

        async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, StoreError> {
            Ok(self.0.lock().unwrap().iter().filter(|p| filter.matches(p)).cloned().collect())
        }

        async fn update(&self, _id: PaymentId, _update: PaymentUpdate) -> Result<Option<Payment>, StoreError> {
            unimplemented!("not used by the checkout flows")
        }

        async fn delete(&self, _id: PaymentId) -> Result<bool, StoreError> {
            unimplemented!("not used by the checkout flows")
        }
    }

    struct Verifier(Result<VerifiedTransaction, GatewayError>);

    #[async_trait::async_trait]
    impl GatewayVerifier for Verifier {
        async fn verify(&self, _tx_ref: &str) -> Result<VerifiedTransaction, GatewayError> {
            self.0.clone()
        }
    }

    fn user() -> User {
        User {
            id: UserId::new(),
            email: "testuser@gmail.com".to_string(),
            first_name: "test".to_string(),
            last_name: "user".to_string(),
            is_active: true,
            is_superadmin: false,
        }
    }

    fn plan() -> BillingPlan {
        BillingPlan {
            id: BillingPlanId::new(),
            organisation_id: OrganizationId::new(),
            name: "BP 1".to_string(),
            price: dec!(5000),
            currency: "NGN".to_string(),
            duration: "Monthly".to_string(),
            description: String::new(),
        }
    }

    fn gateway_answer(user: &User, price: Decimal, currency: &str) -> Result<VerifiedTransaction, GatewayError> {
        Ok(VerifiedTransaction {
            tx_ref: user.id.to_string(),
            status: "success".to_string(),
            transaction_complete: true,
            price,
            currency: currency.to_string(),
        })
    }

    fn callback(user: &User) -> CallbackPayload {
        CallbackPayload {
            tx_ref: Some(user.id.to_string()),
            status: Some("successful".to_string()),
            transaction_id: Some("4410583".to_string()),
        }
    }

    fn orchestrator(
        plan: &BillingPlan,
        answer: Result<VerifiedTransaction, GatewayError>,
    ) -> (PaymentOrchestrator, Arc<Payments>) {
        let payments = Arc::new(Payments::default());
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(Plans([(plan.id, plan.clone())].into())),
            payments.clone(),
            Arc::new(Verifier(answer)),
            CheckoutSettings::new("http://testserver/", "FLWPUBK_TEST-abc"),
        );
        (orchestrator, payments)
    }

    #[tokio::test]
    async fn configure_returns_checkout_bundle_for_plan() {
        let user = user();
        let plan = plan();
        let (orch, payments) = orchestrator(&plan, gateway_answer(&user, dec!(5000), "NGN"));

        let data = orch.configure(plan.id, "flutterwave", &user).await.unwrap();

        assert!(data.tx_ref.starts_with(&format!("{}#", user.id)));
        assert_eq!(data.price, plan.price);
        assert_eq!(data.currency, "NGN");
        assert_eq!(data.user_email, user.email);
        assert_eq!(data.user_name, "test user");
        assert_eq!(data.public_key, "FLWPUBK_TEST-abc");
        assert_eq!(data.action_url, FLUTTERWAVE_ONE_OFF_PAY_URL);
        assert_eq!(data.payment_title, "Convey AI Video Suites");
        assert_eq!(
            data.redirect_url,
            format!("http://testserver/api/v1/payments/handle/{}/flutterwave", plan.id)
        );
        assert!(payments.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsupported_gateway_wins_over_missing_plan() {
        let user = user();
        let plan = plan();
        let (orch, _) = orchestrator(&plan, gateway_answer(&user, dec!(5000), "NGN"));

        let err = orch.configure(BillingPlanId::new(), "stripe", &user).await.unwrap_err();
        assert_eq!(err, BillingError::UnsupportedGateway);

        let err = orch
            .handle(BillingPlanId::new(), "paypal", &callback(&user), &user)
            .await
            .unwrap_err();
        assert_eq!(err, BillingError::UnsupportedGateway);
    }

    #[tokio::test]
    async fn unknown_plan_is_not_found() {
        let user = user();
        let plan = plan();
        let (orch, _) = orchestrator(&plan, gateway_answer(&user, dec!(5000), "NGN"));

        let err = orch.configure(BillingPlanId::new(), "flutterwave", &user).await.unwrap_err();
        assert_eq!(err, BillingError::PlanNotFound);
        assert_eq!(err.to_string(), "Billing plan not found.");
    }

    #[tokio::test]
    async fn confirmed_callback_records_completed_payment() {
        let user = user();
        let plan = plan();
        let (orch, payments) = orchestrator(&plan, gateway_answer(&user, dec!(5000), "NGN"));

        let payment = orch.handle(plan.id, "flutterwave", &callback(&user), &user).await.unwrap();

        assert_eq!(payment.status, "completed");
        assert_eq!(payment.method, "flutterwave");
        assert_eq!(payment.amount, dec!(5000));
        assert_eq!(payment.currency, "NGN");
        assert_eq!(payment.transaction_id, "4410583");
        assert_eq!(payment.user_id, user.id);
        assert_eq!(payments.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tampered_price_or_currency_persists_nothing() {
        let user = user();
        let plan = plan();

        for (price, currency, expected) in [
            (dec!(4000), "NGN", ConfirmationError::AmountMismatch),
            (dec!(5000), "USD", ConfirmationError::CurrencyMismatch),
        ] {
            let (orch, payments) = orchestrator(&plan, gateway_answer(&user, price, currency));
            let err = orch
                .handle(plan.id, "flutterwave", &callback(&user), &user)
                .await
                .unwrap_err();
            assert_eq!(err, BillingError::Confirmation(expected));
            assert!(payments.0.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn replayed_callback_is_a_conflict() {
        let user = user();
        let plan = plan();
        let (orch, payments) = orchestrator(&plan, gateway_answer(&user, dec!(5000), "NGN"));

        orch.handle(plan.id, "flutterwave", &callback(&user), &user).await.unwrap();
        let err = orch
            .handle(plan.id, "flutterwave", &callback(&user), &user)
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::Conflict(_)));
        assert_eq!(payments.0.lock().unwrap().len(), 1);
    }
}
