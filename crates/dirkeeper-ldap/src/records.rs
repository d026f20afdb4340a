//! Typed records built from directory entries.
//!
//! Every field is optional: schemas are sparse and an absent attribute
//! reads as `None` or an empty list. Records are built once, at the point
//! an entry leaves the repository layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use dirkeeper_directory::operation::DirectoryEntry;
use dirkeeper_directory::time::parse_directory_time;
use dirkeeper_directory::types::AccountState;

use crate::config::SourceConfig;
use crate::repository::TEMPLATE_USER_TYPE_ATTRIBUTE;

/// Parse a `YES`/`NO` flag. Anything else is `None`.
pub fn parse_flag(value: Option<&str>) -> Option<bool> {
    match value.map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("YES") || v.eq_ignore_ascii_case("TRUE") => Some(true),
        Some(v) if v.eq_ignore_ascii_case("NO") || v.eq_ignore_ascii_case("FALSE") => Some(false),
        _ => None,
    }
}

/// Render a flag as the directory stores it.
pub fn format_flag(value: bool) -> &'static str {
    if value {
        "YES"
    } else {
        "NO"
    }
}

/// A person account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub dn: String,
    pub identifier: Option<String>,
    pub given_name: Option<String>,
    pub surname: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub title: Option<String>,
    pub department: Option<String>,
    pub national_id: Option<String>,
    pub employee_type: Option<String>,
    pub manager: Option<String>,
    pub memberships: Vec<String>,
    pub login_disabled: Option<bool>,
    pub login_time: Option<DateTime<Utc>>,
    pub password_expiration: Option<DateTime<Utc>>,
    pub state: AccountState,
}

impl UserRecord {
    /// Build a record from an entry, deriving the state from its subtree.
    pub fn from_entry(entry: &DirectoryEntry, config: &SourceConfig) -> Self {
        let schema = &config.schema;
        Self {
            dn: entry.dn.clone(),
            identifier: entry.first_owned(&schema.naming),
            given_name: entry.first_owned("givenName"),
            surname: entry.first_owned("sn"),
            full_name: entry.first_owned("fullName"),
            email: entry.first_owned("mail"),
            title: entry.first_owned("title"),
            department: entry.first_owned("ou"),
            national_id: entry.first_owned("workforceID"),
            employee_type: entry.first_owned("employeeType"),
            manager: entry.first_owned("manager"),
            memberships: entry.values(&schema.membership).to_vec(),
            login_disabled: parse_flag(entry.first(&schema.login_disabled)),
            login_time: entry.first(&schema.login_time).and_then(parse_directory_time),
            password_expiration: entry
                .first(&schema.password_expiration)
                .and_then(parse_directory_time),
            state: config.account_state(&entry.dn),
        }
    }

    /// Check whether the account is a member of a group.
    pub fn is_member_of(&self, group_dn: &str) -> bool {
        self.memberships
            .iter()
            .any(|g| dirkeeper_directory::dn::same(g, group_dn))
    }

    /// Whether the password has expired at `now`.
    pub fn password_expired(&self, now: DateTime<Utc>) -> bool {
        self.password_expiration.is_some_and(|at| at <= now)
    }
}

/// A group or role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub dn: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub members: Vec<String>,
    pub equivalents: Vec<String>,
    pub is_role: bool,
}

impl GroupRecord {
    /// Build a record from a group or role entry.
    pub fn from_entry(entry: &DirectoryEntry, config: &SourceConfig) -> Self {
        let schema = &config.schema;
        Self {
            dn: entry.dn.clone(),
            name: entry.first_owned(&schema.naming),
            description: entry.first_owned("description"),
            members: entry.values(&schema.member).to_vec(),
            equivalents: entry.values(&schema.equivalence).to_vec(),
            is_role: entry.has_object_class(&schema.role_object_class),
        }
    }

    /// Members missing from the equivalence list of a role.
    ///
    /// Always empty for plain groups.
    pub fn unsynchronized_members(&self) -> Vec<&str> {
        if !self.is_role {
            return Vec::new();
        }
        self.members
            .iter()
            .filter(|m| {
                !self
                    .equivalents
                    .iter()
                    .any(|e| dirkeeper_directory::dn::same(e, m))
            })
            .map(String::as_str)
            .collect()
    }
}

/// A user creation template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub dn: String,
    pub name: Option<String>,
    pub user_type: Option<String>,
    /// Attribute values copied onto new users.
    pub defaults: BTreeMap<String, Vec<String>>,
    /// Groups attached to new users.
    pub groups: Vec<String>,
}

impl TemplateRecord {
    /// Build a record from a template entry.
    ///
    /// Everything except the naming, object class, user type and membership
    /// attributes is treated as a default value.
    pub fn from_entry(entry: &DirectoryEntry, config: &SourceConfig) -> Self {
        let schema = &config.schema;
        let reserved = [
            schema.naming.as_str(),
            "objectClass",
            "description",
            TEMPLATE_USER_TYPE_ATTRIBUTE,
            schema.membership.as_str(),
        ];

        let defaults = entry
            .iter()
            .filter(|(name, _)| !reserved.iter().any(|r| r.eq_ignore_ascii_case(name)))
            .map(|(name, values)| (name.clone(), values.clone()))
            .collect();

        Self {
            dn: entry.dn.clone(),
            name: entry.first_owned(&schema.naming),
            user_type: entry.first_owned(TEMPLATE_USER_TYPE_ATTRIBUTE),
            defaults,
            groups: entry.values(&schema.membership).to_vec(),
        }
    }

    /// Group names of the attached groups (the value of each DN's RDN).
    pub fn group_names(&self) -> Vec<String> {
        self.groups
            .iter()
            .map(|g| dirkeeper_directory::dn::rdn_value(g).to_string())
            .filter(|n| !n.is_empty())
            .collect()
    }
}
