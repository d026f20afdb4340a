//! Bidirectional membership maintenance.
//!
//! Membership of a user in a group is recorded three times: the group DN on
//! the user's membership list, the user DN on the group's member list and,
//! for role-typed groups, the user DN on the role-equivalence list. The
//! three writes are independent requests; a failure part-way leaves them
//! out of step and is reported, not rolled back.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use dirkeeper_directory::error::{DirectoryError, DirectoryResult};
use dirkeeper_directory::operation::AttributeDelta;
use dirkeeper_directory::traits::DirectoryClient;

use crate::config::SchemaNames;

/// Per-attribute result of a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MembershipReport {
    /// Membership list on the user entry.
    pub user_side: bool,
    /// Member list on the group entry.
    pub group_side: bool,
    /// Equivalence list; `None` when the group is not role-typed.
    pub equivalence: Option<bool>,
}

impl MembershipReport {
    /// Whether every attempted write succeeded.
    pub fn succeeded(&self) -> bool {
        self.user_side && self.group_side && self.equivalence.unwrap_or(true)
    }

    /// Whether some writes succeeded and others failed.
    pub fn is_partial(&self) -> bool {
        let attempted = [Some(self.user_side), Some(self.group_side), self.equivalence];
        let results: Vec<bool> = attempted.into_iter().flatten().collect();
        results.iter().any(|r| *r) && results.iter().any(|r| !*r)
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Add,
    Remove,
}

/// Keeps the three membership attributes in agreement.
#[derive(Clone)]
pub struct MembershipEnforcer {
    client: Arc<dyn DirectoryClient>,
    schema: SchemaNames,
}

impl MembershipEnforcer {
    pub fn new(client: Arc<dyn DirectoryClient>, schema: SchemaNames) -> Self {
        Self { client, schema }
    }

    /// Add a user to a group on every side.
    ///
    /// A value that is already present counts as success.
    #[instrument(skip(self))]
    pub async fn add_membership(&self, user_dn: &str, group_dn: &str) -> MembershipReport {
        self.apply(user_dn, group_dn, Direction::Add).await
    }

    /// Remove a user from a group on every side.
    ///
    /// A value that is already absent counts as success.
    #[instrument(skip(self))]
    pub async fn remove_membership(&self, user_dn: &str, group_dn: &str) -> MembershipReport {
        self.apply(user_dn, group_dn, Direction::Remove).await
    }

    /// Check whether a group carries the role marker object class.
    pub async fn is_role(&self, group_dn: &str) -> DirectoryResult<bool> {
        let entry = self.client.read(group_dn, &["objectClass"]).await?;
        Ok(entry.is_some_and(|e| e.has_object_class(&self.schema.role_object_class)))
    }

    async fn apply(&self, user_dn: &str, group_dn: &str, direction: Direction) -> MembershipReport {
        let user_side = self
            .write(user_dn, &self.schema.membership, group_dn, direction)
            .await;
        let group_side = self
            .write(group_dn, &self.schema.member, user_dn, direction)
            .await;

        let equivalence = match self.is_role(group_dn).await {
            Ok(true) => Some(
                self.write(group_dn, &self.schema.equivalence, user_dn, direction)
                    .await,
            ),
            Ok(false) => None,
            Err(e) => {
                warn!(error = %e, "Could not check role marker");
                Some(false)
            }
        };

        let report = MembershipReport {
            user_side,
            group_side,
            equivalence,
        };

        if report.succeeded() {
            info!(?direction, "Membership updated");
        } else {
            warn!(?direction, ?report, "Membership only partially updated");
        }
        report
    }

    async fn write(&self, target: &str, attribute: &str, value: &str, direction: Direction) -> bool {
        let delta = match direction {
            Direction::Add => AttributeDelta::new().add(attribute, value),
            Direction::Remove => AttributeDelta::new().delete(attribute, value),
        };

        match self.client.modify(target, &delta).await {
            Ok(()) => true,
            Err(DirectoryError::ValueExists { .. }) if matches!(direction, Direction::Add) => true,
            Err(DirectoryError::NoSuchValue { .. }) if matches!(direction, Direction::Remove) => {
                true
            }
            Err(e) => {
                warn!(dn = %target, attribute = %attribute, error = %e, "Membership write failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for MembershipEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipEnforcer")
            .field("backend", &self.client.backend_name())
            .field("membership", &self.schema.membership)
            .field("member", &self.schema.member)
            .field("equivalence", &self.schema.equivalence)
            .finish()
    }
}
