use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use convey_auth::{MembershipEdge, MembershipStore, Organization, Role, User, UserDirectory};
use convey_billing::{
    BillingPlan, BillingPlanStore, NewPayment, Payment, PaymentFilter, PaymentStore, PaymentUpdate,
};
use convey_core::{
    BillingPlanId, OrganizationId, Page, PageRequest, PaymentId, RoleId, StoreError, UserId,
};

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read().map_err(|_| StoreError::backend("lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write().map_err(|_| StoreError::backend("lock poisoned"))
}

/// In-memory payment store. Keeps insertion order, which is creation order.
#[derive(Debug, Default)]
pub struct InMemoryPaymentStore {
    payments: RwLock<Vec<Payment>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn create(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        let mut payments = write(&self.payments)?;
        if payments
            .iter()
            .any(|p| p.transaction_id == payment.transaction_id)
        {
            return Err(StoreError::Conflict(format!(
                "transaction {} already recorded",
                payment.transaction_id
            )));
        }
        let payment = payment.into_payment(PaymentId::new(), Utc::now());
        payments.push(payment.clone());
        Ok(payment)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        Ok(read(&self.payments)?.iter().find(|p| p.id == id).cloned())
    }

    async fn get_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>, StoreError> {
        Ok(read(&self.payments)?
            .iter()
            .find(|p| p.transaction_id == transaction_id)
            .cloned())
    }

    async fn list_by_user(&self, user_id: UserId, page: PageRequest) -> Result<Page<Payment>, StoreError> {
        let mine: Vec<Payment> = read(&self.payments)?
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        Ok(Page::from_slice(&mine, page))
    }

    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, StoreError> {
        Ok(read(&self.payments)?
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn update(&self, id: PaymentId, update: PaymentUpdate) -> Result<Option<Payment>, StoreError> {
        let mut payments = write(&self.payments)?;
        Ok(payments.iter_mut().find(|p| p.id == id).map(|p| {
            update.apply(p, Utc::now());
            p.clone()
        }))
    }

    async fn delete(&self, id: PaymentId) -> Result<bool, StoreError> {
        let mut payments = write(&self.payments)?;
        let before = payments.len();
        payments.retain(|p| p.id != id);
        Ok(payments.len() != before)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBillingPlanStore {
    plans: RwLock<HashMap<BillingPlanId, BillingPlan>>,
}

impl InMemoryBillingPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, plan: BillingPlan) -> Result<(), StoreError> {
        write(&self.plans)?.insert(plan.id, plan);
        Ok(())
    }
}

#[async_trait::async_trait]
impl BillingPlanStore for InMemoryBillingPlanStore {
    async fn get(&self, id: BillingPlanId) -> Result<Option<BillingPlan>, StoreError> {
        Ok(read(&self.plans)?.get(&id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) -> Result<(), StoreError> {
        write(&self.users)?.insert(user.id, user);
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(read(&self.users)?.get(&id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMembershipStore {
    organizations: RwLock<HashMap<OrganizationId, Organization>>,
    roles: RwLock<HashMap<RoleId, Role>>,
    edges: RwLock<HashSet<MembershipEdge>>,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_organization(&self, organization: Organization) -> Result<(), StoreError> {
        write(&self.organizations)?.insert(organization.id, organization);
        Ok(())
    }

    pub fn insert_role(&self, role: Role) -> Result<(), StoreError> {
        write(&self.roles)?.insert(role.id, role);
        Ok(())
    }

    pub fn grant(&self, edge: MembershipEdge) -> Result<(), StoreError> {
        write(&self.edges)?.insert(edge);
        Ok(())
    }
}

#[async_trait::async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn organization(&self, id: OrganizationId) -> Result<Option<Organization>, StoreError> {
        Ok(read(&self.organizations)?.get(&id).cloned())
    }

    async fn role(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        Ok(read(&self.roles)?.get(&id).cloned())
    }

    async fn roles_in_organization(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Vec<Role>, StoreError> {
        let edges = read(&self.edges)?;
        let roles = read(&self.roles)?;
        Ok(edges
            .iter()
            .filter(|e| e.organization_id == organization_id && e.user_id == user_id)
            .filter_map(|e| roles.get(&e.role_id).cloned())
            .collect())
    }

    async fn edge_exists(&self, edge: &MembershipEdge) -> Result<bool, StoreError> {
        Ok(read(&self.edges)?.contains(edge))
    }

    async fn remove_edge(&self, edge: &MembershipEdge) -> Result<bool, StoreError> {
        Ok(write(&self.edges)?.remove(edge))
    }
}
