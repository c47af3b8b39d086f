use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use convey_core::{BillingPlanId, OrganizationId, StoreError};

/// A priced subscription tier offered by an organisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPlan {
    pub id: BillingPlanId,
    pub organisation_id: OrganizationId,
    pub name: String,
    pub price: Decimal,
    pub currency: String,
    pub duration: String,
    pub description: String,
}

/// Read-only plan lookup.
#[async_trait::async_trait]
pub trait BillingPlanStore: Send + Sync {
    async fn get(&self, id: BillingPlanId) -> Result<Option<BillingPlan>, StoreError>;
}
