use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use convey_core::RoleId;

/// Role names the system knows how to grant and revoke.
///
/// Role rows are free-form in storage; anything outside this set is treated
/// as an invalid role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleName {
    Admin,
    User,
    Guest,
}

impl RoleName {
    pub const ALL: [RoleName; 3] = [RoleName::Admin, RoleName::User, RoleName::Guest];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Admin => "admin",
            RoleName::User => "user",
            RoleName::Guest => "guest",
        }
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognized role name '{0}'")]
pub struct InvalidRoleName(pub String);

impl FromStr for RoleName {
    type Err = InvalidRoleName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleName::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| InvalidRoleName(s.to_string()))
    }
}

/// A stored role definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

impl Role {
    pub fn new(id: RoleId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn recognized_name(&self) -> Result<RoleName, InvalidRoleName> {
        self.name.parse()
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.recognized_name(), Ok(RoleName::Admin))
    }
}
