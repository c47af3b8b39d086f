use convey_auth::User;

/// The authenticated, active user behind a request.
///
/// Inserted by the auth middleware; present for every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(User);

impl CurrentUser {
    pub fn new(user: User) -> Self {
        Self(user)
    }

    pub fn user(&self) -> &User {
        &self.0
    }

    pub fn is_superadmin(&self) -> bool {
        self.0.is_superadmin
    }
}
