//! User identity as seen by authentication and billing.

use serde::{Deserialize, Serialize};

use convey_core::{StoreError, UserId};

/// A registered user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_superadmin: bool,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Read access to user accounts.
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn exists(&self, id: UserId) -> Result<bool, StoreError> {
        Ok(self.get(id).await?.is_some())
    }
}
