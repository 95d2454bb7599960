//! User authentication.
//!
//! Callers are resolved to a [`UserGroup`] by HTTP Digest authentication
//! (RFC 2617, `qop="auth"`). Handlers are registered with the minimum group
//! they require, and a caller is admitted when its resolved group is greater
//! than or equal to that requirement.

pub mod credentials;
pub mod digest;

use serde::Deserialize;

pub use credentials::CredentialStore;
pub use digest::{authenticate, calculate_ha1};

/// Access groups, ordered from least to most privileged.
///
/// ```
/// # use camweb::auth::UserGroup;
/// assert!(UserGroup::Anyone < UserGroup::User);
/// assert!(UserGroup::User < UserGroup::Admin);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserGroup {
    /// Unauthenticated callers
    #[default]
    Anyone = 0,
    /// Any known user
    User = 1,
    /// Administrators
    Admin = 2,
}

impl UserGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserGroup::Anyone => "anyone",
            UserGroup::User => "user",
            UserGroup::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
