//! Principal types resolved from the identity store.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Role name that grants administrative access.
pub const ADMIN_ROLE_NAME: &str = "Admin";

/// Integer identifier of a principal in the identity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(i64);

impl UserId {
    /// Creates a user identifier from its stored integer value.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the stored integer value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Authenticated user entity together with its role memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    id: UserId,
    username: String,
    first_name: String,
    last_name: String,
    email: Option<String>,
    active: bool,
    roles: BTreeSet<String>,
}

impl Principal {
    /// Creates a principal without email or roles.
    #[must_use]
    pub fn new(
        id: UserId,
        username: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        active: bool,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: None,
            active,
            roles: BTreeSet::new(),
        }
    }

    /// Attaches an email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Replaces the role memberships.
    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the principal identifier.
    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Returns the login name.
    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_str()
    }

    /// Returns the email, when the identity store has one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns whether the principal may authenticate.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns the role memberships.
    #[must_use]
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// Returns whether the principal is a member of the administrative role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.contains(ADMIN_ROLE_NAME)
    }

    /// Returns `"First Last (username)"`, or the bare username without a full name.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full_name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return self.username.clone();
        }

        format!("{full_name} ({})", self.username)
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}(id: {})", self.username, self.id)
    }
}
