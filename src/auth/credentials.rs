//! In-memory user table.

use std::collections::HashMap;

use crate::auth::UserGroup;

/// A stored user: the precomputed HA1 digest and the user's group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub ha1: String,
    pub group: UserGroup,
}

/// Maps user names to their HA1 digest and group.
///
/// The store never sees plaintext passwords; hosts compute HA1 with
/// [`calculate_ha1`](crate::auth::calculate_ha1). It does no locking of its
/// own, the owning server keeps it behind its configuration mutex.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    users: HashMap<String, UserRecord>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user, replacing any existing record with the same name.
    pub fn add_or_replace(&mut self, name: impl Into<String>, ha1: impl Into<String>, group: UserGroup) {
        self.users.insert(
            name.into(),
            UserRecord {
                ha1: ha1.into(),
                group,
            },
        );
    }

    pub fn remove(&mut self, name: &str) {
        self.users.remove(name);
    }

    pub fn lookup(&self, name: &str) -> Option<(&str, UserGroup)> {
        self.users
            .get(name)
            .map(|record| (record.ha1.as_str(), record.group))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
