//! Type definitions for directory entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of entity a repository manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Person accounts.
    User,
    /// Groups of users.
    Group,
    /// Role-typed groups.
    Role,
    /// Organizational units (services).
    OrganizationalUnit,
    /// User creation templates.
    Template,
}

impl EntityKind {
    /// Get all entity kinds.
    #[must_use]
    pub fn all() -> &'static [EntityKind] {
        &[
            EntityKind::User,
            EntityKind::Group,
            EntityKind::Role,
            EntityKind::OrganizationalUnit,
            EntityKind::Template,
        ]
    }

    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Group => "group",
            EntityKind::Role => "role",
            EntityKind::OrganizationalUnit => "organizational_unit",
            EntityKind::Template => "template",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ParseEntityKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" | "users" => Ok(EntityKind::User),
            "group" | "groups" => Ok(EntityKind::Group),
            "role" | "roles" => Ok(EntityKind::Role),
            "organizational_unit" | "ou" | "service" => Ok(EntityKind::OrganizationalUnit),
            "template" | "templates" => Ok(EntityKind::Template),
            _ => Err(ParseEntityKindError(s.to_string())),
        }
    }
}

/// Error parsing entity kind from string.
#[derive(Debug, Clone)]
pub struct ParseEntityKindError(String);

impl fmt::Display for ParseEntityKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid entity kind '{}', expected one of: user, group, role, ou, template",
            self.0
        )
    }
}

impl std::error::Error for ParseEntityKindError {}

/// Lifecycle state of a user account, derived from the subtree holding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountState {
    /// In the staging or to-process subtree.
    Pending,
    /// In the active users subtree.
    Active,
    /// In the inactive users subtree.
    Inactive,
    /// Outside every known subtree.
    #[default]
    Unknown,
}

impl AccountState {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountState::Pending => "pending",
            AccountState::Active => "active",
            AccountState::Inactive => "inactive",
            AccountState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_roundtrip() {
        for kind in EntityKind::all() {
            let parsed: EntityKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, *kind);
        }
    }

    #[test]
    fn test_entity_kind_aliases() {
        assert_eq!("OU".parse::<EntityKind>().unwrap(), EntityKind::OrganizationalUnit);
        assert_eq!("Users".parse::<EntityKind>().unwrap(), EntityKind::User);
    }

    #[test]
    fn test_entity_kind_invalid() {
        let err = "printer".parse::<EntityKind>().unwrap_err();
        assert!(err.to_string().contains("printer"));
    }

    #[test]
    fn test_account_state_display() {
        assert_eq!(AccountState::Inactive.to_string(), "inactive");
        assert_eq!(AccountState::default(), AccountState::Unknown);
    }
}
