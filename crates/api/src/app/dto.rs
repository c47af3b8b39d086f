use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use convey_auth::MembershipEdge;
use convey_billing::Payment;
use convey_core::{OrganizationId, Page, PageMeta, PageRequest, RoleId, UserId};

// -------------------------
// Request DTOs
// -------------------------

/// `?limit=&page=`; absent values fall back to the first page of ten.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub page: Option<u32>,
}

impl PageQuery {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(PageRequest::DEFAULT_LIMIT)
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct PaymentSummary {
    pub amount: String,
    pub currency: String,
    pub status: String,
    pub method: String,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentSummary {
    fn from(p: Payment) -> Self {
        Self {
            amount: p.amount.to_string(),
            currency: p.currency,
            status: p.status,
            method: p.method,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserPaymentsData {
    pub pagination: PageMeta,
    pub payments: Vec<PaymentSummary>,
    pub user_id: UserId,
}

impl UserPaymentsData {
    pub fn new(user_id: UserId, page: Page<Payment>) -> Self {
        let page = page.map(PaymentSummary::from);
        Self {
            pagination: page.meta,
            payments: page.items,
            user_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoleRemovalData {
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub role_id: RoleId,
}

impl From<MembershipEdge> for RoleRemovalData {
    fn from(edge: MembershipEdge) -> Self {
        Self {
            organization_id: edge.organization_id,
            user_id: edge.user_id,
            role_id: edge.role_id,
        }
    }
}
