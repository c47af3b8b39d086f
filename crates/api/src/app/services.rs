use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use convey_auth::{MembershipStore, RoleMembershipAuthorizer, UserDirectory};
use convey_billing::{
    BillingPlanStore, CheckoutSettings, GatewayVerifier, PaymentOrchestrator, PaymentService, PaymentStore,
};
use convey_infra::stores::{
    InMemoryBillingPlanStore, InMemoryMembershipStore, InMemoryPaymentStore, InMemoryUserDirectory,
    PostgresBillingPlanStore, PostgresMembershipStore, PostgresPaymentStore, PostgresUserDirectory,
};
use convey_infra::{FlutterwaveClient, Settings};

const MAX_DB_CONNECTIONS: u32 = 10;

/// The store set every service is built from.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserDirectory>,
    pub memberships: Arc<dyn MembershipStore>,
    pub plans: Arc<dyn BillingPlanStore>,
    pub payments: Arc<dyn PaymentStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserDirectory::new()),
            memberships: Arc::new(InMemoryMembershipStore::new()),
            plans: Arc::new(InMemoryBillingPlanStore::new()),
            payments: Arc::new(InMemoryPaymentStore::new()),
        }
    }

    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self {
            users: Arc::new(PostgresUserDirectory::new(pool.clone())),
            memberships: Arc::new(PostgresMembershipStore::new(pool.clone())),
            plans: Arc::new(PostgresBillingPlanStore::new(pool.clone())),
            payments: Arc::new(PostgresPaymentStore::new(pool)),
        }
    }
}

/// Everything the handlers need, built once per process.
#[derive(Clone)]
pub struct AppServices {
    pub users: Arc<dyn UserDirectory>,
    pub checkout: PaymentOrchestrator,
    pub payments: PaymentService,
    pub memberships: RoleMembershipAuthorizer,
}

impl AppServices {
    pub fn new(stores: Stores, verifier: Arc<dyn GatewayVerifier>, checkout: CheckoutSettings) -> Self {
        Self {
            checkout: PaymentOrchestrator::new(
                stores.plans.clone(),
                stores.payments.clone(),
                verifier,
                checkout,
            ),
            payments: PaymentService::new(stores.payments, stores.users.clone()),
            memberships: RoleMembershipAuthorizer::new(stores.memberships, stores.users.clone()),
            users: stores.users,
        }
    }
}

pub async fn build_services(settings: &Settings) -> anyhow::Result<AppServices> {
    let stores = if settings.use_persistent_stores {
        let url = settings
            .database_url
            .as_deref()
            .context("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")?;
        let pool = PgPoolOptions::new()
            .max_connections(MAX_DB_CONNECTIONS)
            .connect(url)
            .await
            .context("failed to connect to Postgres")?;
        tracing::info!("using Postgres stores");
        Stores::postgres(pool)
    } else {
        tracing::warn!("USE_PERSISTENT_STORES not set; using empty in-memory stores");
        Stores::in_memory()
    };

    let verifier = FlutterwaveClient::new(
        settings.gateway_environment,
        settings.rave_secret_key.clone(),
        settings.gateway_timeout,
    )
    .context("failed to build Flutterwave client")?;

    let checkout = CheckoutSettings::new(settings.public_base_url.clone(), settings.rave_public_key.clone());

    Ok(AppServices::new(stores, Arc::new(verifier), checkout))
}
