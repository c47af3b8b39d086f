//! Postgres-backed stores.
//!
//! The schema lives in `crates/infra/migrations/`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / RowNotFound / Other | N/A | `Backend` |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row};
use tracing::instrument;

use convey_auth::{MembershipEdge, MembershipStore, Organization, Role, User, UserDirectory};
use convey_billing::{
    BillingPlan, BillingPlanStore, NewPayment, Payment, PaymentFilter, PaymentStore, PaymentUpdate,
};
use convey_core::{
    BillingPlanId, OrganizationId, Page, PageRequest, PaymentId, RoleId, StoreError, UserId,
};

const PAYMENT_COLUMNS: &str =
    "id, user_id, amount, currency, method, status, transaction_id, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresPaymentStore {
    pool: Arc<PgPool>,
}

impl PostgresPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl PaymentStore for PostgresPaymentStore {
    #[instrument(skip(self, payment), fields(user_id = %payment.user_id), err)]
    async fn create(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payments (id, user_id, amount, currency, method, status, transaction_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(*PaymentId::new().as_uuid())
        .bind(*payment.user_id.as_uuid())
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.method)
        .bind(&payment.status)
        .bind(&payment.transaction_id)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_payment", e))?;

        decode_payment(&row)
    }

    #[instrument(skip(self), err)]
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_payment", e))?;

        row.as_ref().map(decode_payment).transpose()
    }

    #[instrument(skip(self), err)]
    async fn get_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_payment_by_transaction_id", e))?;

        row.as_ref().map(decode_payment).transpose()
    }

    #[instrument(skip(self), fields(limit = page.limit(), page = page.page()), err)]
    async fn list_by_user(&self, user_id: UserId, page: PageRequest) -> Result<Page<Payment>, StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE user_id = $1")
            .bind(*user_id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_user_payments", e))?;

        let offset = i64::try_from(page.offset())
            .map_err(|_| StoreError::backend("page offset out of range"))?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE user_id = $1
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(*user_id.as_uuid())
        .bind(i64::from(page.limit()))
        .bind(offset)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_user_payments", e))?;

        let items = rows.iter().map(decode_payment).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total.max(0) as u64, page))
    }

    #[instrument(skip(self, filter), fields(criteria = filter.criteria().len()), err)]
    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, StoreError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE TRUE"));
        for (field, value) in filter.criteria() {
            // Columns come from a closed enum, values are always bound.
            query
                .push(format!(" AND {}::text ILIKE ", field.column()))
                .push_bind(format!("%{}%", escape_like(value)));
        }
        query.push(" ORDER BY created_at ASC, id ASC");

        let rows = query
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_payments", e))?;

        rows.iter().map(decode_payment).collect()
    }

    #[instrument(skip(self, update), err)]
    async fn update(&self, id: PaymentId, update: PaymentUpdate) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE payments SET
                amount = COALESCE($2, amount),
                currency = COALESCE($3, currency),
                method = COALESCE($4, method),
                status = COALESCE($5, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(*id.as_uuid())
        .bind(update.amount)
        .bind(update.currency)
        .bind(update.method)
        .bind(update.status)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_payment", e))?;

        row.as_ref().map(decode_payment).transpose()
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, id: PaymentId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_payment", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
pub struct PostgresBillingPlanStore {
    pool: Arc<PgPool>,
}

impl PostgresBillingPlanStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl BillingPlanStore for PostgresBillingPlanStore {
    #[instrument(skip(self), err)]
    async fn get(&self, id: BillingPlanId) -> Result<Option<BillingPlan>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, organisation_id, name, price, currency, duration, description
            FROM billing_plans
            WHERE id = $1
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_billing_plan", e))?;

        row.as_ref()
            .map(|row| {
                let plan = BillingPlanRow::from_row(row).map_err(|e| decode_error("billing_plans", e))?;
                Ok(plan.into())
            })
            .transpose()
    }
}

#[derive(Debug, Clone)]
pub struct PostgresUserDirectory {
    pool: Arc<PgPool>,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl UserDirectory for PostgresUserDirectory {
    #[instrument(skip(self), err)]
    async fn get(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, first_name, last_name, is_active, is_superadmin
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_user", e))?;

        row.as_ref()
            .map(|row| {
                Ok(User {
                    id: UserId::from_uuid(row.try_get("id").map_err(|e| decode_error("users", e))?),
                    email: row.try_get("email").map_err(|e| decode_error("users", e))?,
                    first_name: row.try_get("first_name").map_err(|e| decode_error("users", e))?,
                    last_name: row.try_get("last_name").map_err(|e| decode_error("users", e))?,
                    is_active: row.try_get("is_active").map_err(|e| decode_error("users", e))?,
                    is_superadmin: row
                        .try_get("is_superadmin")
                        .map_err(|e| decode_error("users", e))?,
                })
            })
            .transpose()
    }

    #[instrument(skip(self), err)]
    async fn exists(&self, id: UserId) -> Result<bool, StoreError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(*id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("user_exists", e))
    }
}

#[derive(Debug, Clone)]
pub struct PostgresMembershipStore {
    pool: Arc<PgPool>,
}

impl PostgresMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl MembershipStore for PostgresMembershipStore {
    #[instrument(skip(self), err)]
    async fn organization(&self, id: OrganizationId) -> Result<Option<Organization>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM organisations WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_organisation", e))?;

        row.as_ref()
            .map(|row| {
                Ok(Organization {
                    id: OrganizationId::from_uuid(
                        row.try_get("id").map_err(|e| decode_error("organisations", e))?,
                    ),
                    name: row.try_get("name").map_err(|e| decode_error("organisations", e))?,
                })
            })
            .transpose()
    }

    #[instrument(skip(self), err)]
    async fn role(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM roles WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_role", e))?;

        row.as_ref().map(decode_role).transpose()
    }

    #[instrument(skip(self), err)]
    async fn roles_in_organization(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Vec<Role>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name
            FROM roles r
            JOIN user_organisation_roles uor ON uor.role_id = r.id
            WHERE uor.organisation_id = $1 AND uor.user_id = $2
            "#,
        )
        .bind(*organization_id.as_uuid())
        .bind(*user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("roles_in_organisation", e))?;

        rows.iter().map(decode_role).collect()
    }

    #[instrument(skip(self), err)]
    async fn edge_exists(&self, edge: &MembershipEdge) -> Result<bool, StoreError> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_organisation_roles
                WHERE organisation_id = $1 AND user_id = $2 AND role_id = $3
            )
            "#,
        )
        .bind(*edge.organization_id.as_uuid())
        .bind(*edge.user_id.as_uuid())
        .bind(*edge.role_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("membership_exists", e))
    }

    #[instrument(skip(self), err)]
    async fn remove_edge(&self, edge: &MembershipEdge) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM user_organisation_roles
            WHERE organisation_id = $1 AND user_id = $2 AND role_id = $3
            "#,
        )
        .bind(*edge.organization_id.as_uuid())
        .bind(*edge.user_id.as_uuid())
        .bind(*edge.role_id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("remove_membership", e))?;

        Ok(result.rows_affected() > 0)
    }
}

/// Escape LIKE metacharacters so filter values match literally.
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code() {
                Some(code) if code.as_ref() == "23505" => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn decode_error(table: &str, err: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("failed to decode {table} row: {err}"))
}

fn decode_payment(row: &PgRow) -> Result<Payment, StoreError> {
    PaymentRow::from_row(row)
        .map(Into::into)
        .map_err(|e| decode_error("payments", e))
}

fn decode_role(row: &PgRow) -> Result<Role, StoreError> {
    let id: uuid::Uuid = row.try_get("id").map_err(|e| decode_error("roles", e))?;
    let name: String = row.try_get("name").map_err(|e| decode_error("roles", e))?;
    Ok(Role::new(RoleId::from_uuid(id), name))
}

// SQLx row types

#[derive(Debug)]
struct PaymentRow {
    id: uuid::Uuid,
    user_id: uuid::Uuid,
    amount: Decimal,
    currency: String,
    method: String,
    status: String,
    transaction_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for PaymentRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(PaymentRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            amount: row.try_get("amount")?,
            currency: row.try_get("currency")?,
            method: row.try_get("method")?,
            status: row.try_get("status")?,
            transaction_id: row.try_get("transaction_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            id: PaymentId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            amount: row.amount,
            currency: row.currency,
            method: row.method,
            status: row.status,
            transaction_id: row.transaction_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug)]
struct BillingPlanRow {
    id: uuid::Uuid,
    organisation_id: uuid::Uuid,
    name: String,
    price: Decimal,
    currency: String,
    duration: String,
    description: Option<String>,
}

impl<'r> FromRow<'r, PgRow> for BillingPlanRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(BillingPlanRow {
            id: row.try_get("id")?,
            organisation_id: row.try_get("organisation_id")?,
            name: row.try_get("name")?,
            price: row.try_get("price")?,
            currency: row.try_get("currency")?,
            duration: row.try_get("duration")?,
            description: row.try_get("description")?,
        })
    }
}

impl From<BillingPlanRow> for BillingPlan {
    fn from(row: BillingPlanRow) -> Self {
        BillingPlan {
            id: BillingPlanId::from_uuid(row.id),
            organisation_id: OrganizationId::from_uuid(row.organisation_id),
            name: row.name,
            price: row.price,
            currency: row.currency,
            duration: row.duration,
            description: row.description.unwrap_or_default(),
        }
    }
}
