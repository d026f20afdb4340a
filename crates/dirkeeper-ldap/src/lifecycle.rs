//! Account lifecycle: registration, provisioning, deactivation.
//!
//! Accounts are created in the staging subtree, moved into the active
//! subtree once provisioned, and moved to the inactive subtree when
//! disabled. Every step is a separate directory request. Nothing is rolled
//! back; the returned counters and flags say what happened.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use dirkeeper_directory::dn;
use dirkeeper_directory::error::{DirectoryError, DirectoryResult};
use dirkeeper_directory::operation::{AttributeDelta, DirectoryEntry, Filter, Outcome, SearchScope};
use dirkeeper_directory::traits::DirectoryClient;
use dirkeeper_directory::types::EntityKind;

use crate::config::SourceConfig;
use crate::credential::{derive_password, is_short_name};
use crate::identifier::IdentifierGenerator;
use crate::membership::MembershipEnforcer;
use crate::records::{format_flag, TemplateRecord, UserRecord};
use crate::repository::{Repository, TEMPLATE_USER_TYPE_ATTRIBUTE};

/// Request to finish provisioning a pending account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisioningRequest {
    /// DN of the pending entry.
    pub pending_dn: String,
    /// Container the entry is moved to.
    pub target_container: String,
    /// Attributes replaced after the move; empty values are skipped.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Names of the groups to attach.
    #[serde(default)]
    pub group_names: Vec<String>,
    /// Derive and set the initial password.
    #[serde(default)]
    pub set_password: bool,
}

/// Aggregate result of a provisioning run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisioningOutcome {
    /// Move, attribute and password steps all succeeded.
    pub ok: bool,
    pub message: String,
    pub moved_dn: Option<String>,
    pub attributes_failed: Vec<String>,
    pub password_set: bool,
    pub groups_added: usize,
    pub groups_failed: usize,
}

impl ProvisioningOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            ..Self::default()
        }
    }

    /// Collapse into the plain `(success, message)` pair.
    pub fn to_outcome(&self) -> Outcome {
        Outcome {
            success: self.ok,
            message: self.message.clone(),
        }
    }
}

/// Request to register a new account in the staging area.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub given_name: String,
    pub surname: String,
    /// Selects the template whose defaults and groups apply.
    #[serde(default)]
    pub user_type: Option<String>,
    /// Extra attributes; they win over template defaults.
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
}

/// A newly registered account.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub user: UserRecord,
    /// Group names from the template, to pass to provisioning.
    pub group_names: Vec<String>,
}

/// Drives accounts through their lifecycle for one source.
#[derive(Clone)]
pub struct LifecycleCoordinator {
    client: Arc<dyn DirectoryClient>,
    config: Arc<SourceConfig>,
    membership: MembershipEnforcer,
    identifiers: IdentifierGenerator,
    users: Repository,
}

impl LifecycleCoordinator {
    pub fn new(client: Arc<dyn DirectoryClient>, config: Arc<SourceConfig>) -> Self {
        Self {
            membership: MembershipEnforcer::new(Arc::clone(&client), config.schema.clone()),
            identifiers: IdentifierGenerator::from_config(Arc::clone(&client), &config),
            users: Repository::for_kind(EntityKind::User, Arc::clone(&client), Arc::clone(&config)),
            client,
            config,
        }
    }

    /// Resolve a group name to a DN, probing the group containers in order.
    pub async fn resolve_group(&self, name: &str) -> Option<String> {
        let filter = Filter::eq(self.config.schema.naming.as_str(), name);

        for base in self.config.group_search_bases() {
            match self
                .client
                .search(&base, SearchScope::Subtree, &filter, &["objectClass"])
                .await
            {
                Ok(entries) => {
                    if let Some(entry) = entries.into_iter().next() {
                        return Some(entry.dn);
                    }
                }
                Err(e) => warn!(base = %base, error = %e, "Group lookup failed on base"),
            }
        }
        None
    }

    /// Move a pending account into place, set its attributes, password and groups.
    ///
    /// Never fails outright; group failures are counted but do not clear `ok`.
    #[instrument(skip(self, request), fields(pending_dn = %request.pending_dn))]
    pub async fn complete_provisioning(&self, request: &ProvisioningRequest) -> ProvisioningOutcome {
        match self.client.exists(&request.pending_dn).await {
            Ok(true) => {}
            Ok(false) => {
                return ProvisioningOutcome::failed(format!(
                    "pending entry {} not found",
                    request.pending_dn
                ))
            }
            Err(e) => {
                warn!(error = %e, "Failed to check pending entry");
                return ProvisioningOutcome::failed(format!("cannot read pending entry: {e}"));
            }
        }

        let moved_dn = match self
            .users
            .move_to(&request.pending_dn, &request.target_container)
            .await
        {
            Ok(moved_dn) => moved_dn,
            Err(e) => {
                warn!(error = %e, "Failed to move pending entry");
                return ProvisioningOutcome::failed(format!("move failed: {e}"));
            }
        };
        info!(moved_dn = %moved_dn, "Pending entry moved");

        let mut outcome = ProvisioningOutcome {
            ok: true,
            moved_dn: Some(moved_dn.clone()),
            ..ProvisioningOutcome::default()
        };

        for (attribute, value) in &request.attributes {
            if value.trim().is_empty() {
                continue;
            }
            let delta = AttributeDelta::new().replace(attribute.as_str(), value.as_str());
            if let Err(e) = self.client.modify(&moved_dn, &delta).await {
                warn!(attribute = %attribute, error = %e, "Attribute replace failed");
                outcome.attributes_failed.push(attribute.clone());
            }
        }

        if request.set_password {
            match self.assign_initial_password(&moved_dn).await {
                Ok(()) => outcome.password_set = true,
                Err(e) => warn!(error = %e, "Initial password not set"),
            }
        }

        for name in &request.group_names {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            match self.resolve_group(name).await {
                Some(group_dn) => {
                    if self
                        .membership
                        .add_membership(&moved_dn, &group_dn)
                        .await
                        .succeeded()
                    {
                        outcome.groups_added += 1;
                    } else {
                        outcome.groups_failed += 1;
                    }
                }
                None => {
                    debug!(group = %name, "Group name did not resolve");
                    outcome.groups_failed += 1;
                }
            }
        }

        outcome.ok = outcome.attributes_failed.is_empty()
            && (outcome.password_set || !request.set_password);
        outcome.message = provisioning_message(&outcome, request.set_password);

        if outcome.ok {
            info!(
                groups_added = outcome.groups_added,
                groups_failed = outcome.groups_failed,
                "Provisioning completed"
            );
        } else {
            warn!(message = %outcome.message, "Provisioning completed with failures");
        }
        outcome
    }

    /// Derive the initial password from the entry's identifier and set it.
    pub async fn assign_initial_password(&self, user_dn: &str) -> DirectoryResult<()> {
        let schema = &self.config.schema;
        let entry = self
            .client
            .read(user_dn, &[schema.naming.as_str(), "givenName", "sn"])
            .await?
            .ok_or_else(|| DirectoryError::not_found(user_dn))?;

        let identifier = entry
            .first_owned(&schema.naming)
            .unwrap_or_else(|| dn::unescape_dn_value(dn::rdn_value(user_dn)));
        let short_name = ["givenName", "sn"]
            .iter()
            .filter_map(|name| entry.first(name))
            .any(is_short_name);

        let password = derive_password(&identifier, short_name);
        let delta = AttributeDelta::new().replace(schema.password.as_str(), password);
        self.client.modify(user_dn, &delta).await?;

        info!(short_name, "Initial password assigned");
        Ok(())
    }

    /// Move an account to the inactive subtree and disable login.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, user_dn: &str) -> Outcome {
        self.transition(user_dn, &self.config.inactive_users_dn, true)
            .await
    }

    /// Move an account back to the active subtree and enable login.
    #[instrument(skip(self))]
    pub async fn reactivate(&self, user_dn: &str) -> Outcome {
        self.transition(user_dn, &self.config.active_users_dn, false)
            .await
    }

    async fn transition(&self, user_dn: &str, container: &str, disabled: bool) -> Outcome {
        let moved_dn = if dn::parent(user_dn).is_some_and(|p| dn::same(&p, container)) {
            user_dn.to_string()
        } else {
            match self.users.move_to(user_dn, container).await {
                Ok(moved_dn) => moved_dn,
                Err(e) => return Outcome::from_result(Err::<(), _>(e), ""),
            }
        };

        let delta = AttributeDelta::new().replace(
            self.config.schema.login_disabled.as_str(),
            format_flag(disabled),
        );
        Outcome::from_result(
            self.client.modify(&moved_dn, &delta).await,
            format!("{moved_dn} login disabled: {}", format_flag(disabled)),
        )
    }

    /// Find the template for a user type.
    pub async fn find_template(&self, user_type: &str) -> DirectoryResult<Option<TemplateRecord>> {
        let filter = Filter::and(vec![
            Filter::present(self.config.schema.naming.as_str()),
            Filter::eq(TEMPLATE_USER_TYPE_ATTRIBUTE, user_type),
        ]);
        let entries = self
            .client
            .search(&self.config.template_dn, SearchScope::Subtree, &filter, &[])
            .await?;
        Ok(entries
            .first()
            .map(|entry| TemplateRecord::from_entry(entry, &self.config)))
    }

    /// Create a new account in the staging area.
    ///
    /// Generates the identifier, applies the template of the user type and
    /// validates the entry before adding it.
    #[instrument(skip(self, request), fields(user_type = ?request.user_type))]
    pub async fn register(&self, request: &RegistrationRequest) -> DirectoryResult<Registration> {
        let identifier = self
            .identifiers
            .generate(&request.given_name, &request.surname)
            .await?;

        let mut attributes: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut group_names = Vec::new();

        if let Some(user_type) = request.user_type.as_deref().filter(|t| !t.is_empty()) {
            let template = self.find_template(user_type).await?.ok_or_else(|| {
                DirectoryError::validation(format!("no template for user type '{user_type}'"))
            })?;
            attributes.extend(template.defaults.clone());
            attributes.insert(
                TEMPLATE_USER_TYPE_ATTRIBUTE.to_string(),
                vec![user_type.to_string()],
            );
            group_names = template.group_names();
        }

        let mut entry = DirectoryEntry::new("");
        entry.attributes = attributes;
        for (name, values) in &request.attributes {
            entry.set(name.as_str(), values.clone());
        }
        let given_name = request.given_name.trim();
        let surname = request.surname.trim();
        entry.set(self.config.schema.naming.as_str(), vec![identifier.clone()]);
        entry.set("givenName", vec![given_name.to_string()]);
        entry.set("sn", vec![surname.to_string()]);
        if !entry.has("fullName") {
            entry.set("fullName", vec![format!("{given_name} {surname}")]);
        }

        let entry = self
            .users
            .validate_new(&self.config.creation_dn, entry.attributes)?;
        self.client.add(&entry).await?;
        info!(dn = %entry.dn, identifier = %identifier, "Account registered");

        Ok(Registration {
            user: UserRecord::from_entry(&entry, &self.config),
            group_names,
        })
    }

    /// The membership enforcer used for group attachment.
    pub fn membership(&self) -> &MembershipEnforcer {
        &self.membership
    }

    /// The identifier generator used for registration.
    pub fn identifiers(&self) -> &IdentifierGenerator {
        &self.identifiers
    }
}

fn provisioning_message(outcome: &ProvisioningOutcome, set_password: bool) -> String {
    let mut parts = Vec::new();
    if let Some(moved_dn) = &outcome.moved_dn {
        parts.push(format!("moved to {moved_dn}"));
    }
    if !outcome.attributes_failed.is_empty() {
        parts.push(format!(
            "attributes failed: {}",
            outcome.attributes_failed.join(", ")
        ));
    }
    if set_password {
        parts.push(if outcome.password_set {
            "password set".to_string()
        } else {
            "password not set".to_string()
        });
    }
    parts.push(format!(
        "groups added: {}, groups failed: {}",
        outcome.groups_added, outcome.groups_failed
    ));
    parts.join("; ")
}

impl std::fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("backend", &self.client.backend_name())
            .field("active_users_dn", &self.config.active_users_dn)
            .finish_non_exhaustive()
    }
}
