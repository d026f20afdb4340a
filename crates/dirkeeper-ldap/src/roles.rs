//! Role repository with resource associations.
//!
//! A role grants resources (other groups). The association is stored in a
//! separate entry under the resource-association base, keyed by the role
//! DN and listing the resource group DNs.

use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use dirkeeper_directory::dn;
use dirkeeper_directory::error::{DirectoryError, DirectoryResult};
use dirkeeper_directory::operation::{
    AttributeDelta, DirectoryEntry, Filter, Outcome, SearchScope,
};
use dirkeeper_directory::traits::DirectoryClient;
use dirkeeper_directory::types::EntityKind;

use crate::config::SourceConfig;
use crate::records::GroupRecord;
use crate::repository::Repository;

/// Role lookups plus role → resource associations.
#[derive(Clone, Debug)]
pub struct RoleRepository {
    inner: Repository,
}

impl RoleRepository {
    pub fn new(client: Arc<dyn DirectoryClient>, config: Arc<SourceConfig>) -> Self {
        Self {
            inner: Repository::for_kind(EntityKind::Role, client, config),
        }
    }

    /// Wrap an existing role repository.
    pub fn from_repository(inner: Repository) -> DirectoryResult<Self> {
        if inner.kind() != EntityKind::Role {
            return Err(DirectoryError::Internal {
                message: format!("expected a role repository, got {}", inner.kind()),
            });
        }
        Ok(Self { inner })
    }

    /// Find a role and return it as a typed record.
    pub async fn find_role(&self, name: &str) -> Option<GroupRecord> {
        self.inner
            .find_by_identifier(name)
            .await
            .map(|entry| GroupRecord::from_entry(&entry, self.inner.config()))
    }

    async fn association(&self, role_dn: &str) -> DirectoryResult<Option<DirectoryEntry>> {
        let config = self.inner.config();
        if config.resource_base_dn.is_empty() {
            return Err(DirectoryError::invalid_configuration(
                "resource_base_dn is not configured",
            ));
        }

        let filter = Filter::eq(config.schema.resource_role.as_str(), role_dn);
        let entries = self
            .inner
            .client()
            .search(&config.resource_base_dn, SearchScope::Subtree, &filter, &[])
            .await?;
        Ok(entries.into_iter().next())
    }

    /// Resource group DNs associated with a role.
    #[instrument(skip(self))]
    pub async fn resources(&self, role_dn: &str) -> Vec<String> {
        match self.association(role_dn).await {
            Ok(Some(entry)) => entry
                .values(&self.inner.config().schema.resource)
                .to_vec(),
            Ok(None) => {
                debug!("Role has no resource association");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Failed to read role resources");
                Vec::new()
            }
        }
    }

    /// Associate a resource group with a role, creating the association entry when needed.
    #[instrument(skip(self))]
    pub async fn attach_resource(&self, role_dn: &str, resource_dn: &str) -> Outcome {
        Outcome::from_result(
            self.try_attach(role_dn, resource_dn).await,
            format!("attached {resource_dn}"),
        )
    }

    async fn try_attach(&self, role_dn: &str, resource_dn: &str) -> DirectoryResult<()> {
        let schema = &self.inner.config().schema;
        let client = self.inner.client();

        match self.association(role_dn).await? {
            Some(entry) => {
                if entry.has_value(&schema.resource, resource_dn) {
                    return Ok(());
                }
                let delta = AttributeDelta::new().add(schema.resource.as_str(), resource_dn);
                match client.modify(&entry.dn, &delta).await {
                    Ok(()) | Err(DirectoryError::ValueExists { .. }) => Ok(()),
                    Err(e) => Err(e),
                }
            }
            None => {
                let name = dn::rdn_value(role_dn);
                let entry_dn = dn::join(
                    &format!("{}={}", schema.naming, dn::escape_dn_value(name)),
                    &self.inner.config().resource_base_dn,
                );
                let entry = DirectoryEntry::new(entry_dn)
                    .with_values("objectClass", ["top", schema.resource_object_class.as_str()])
                    .with(schema.naming.as_str(), name)
                    .with(schema.resource_role.as_str(), role_dn)
                    .with(schema.resource.as_str(), resource_dn);
                client.add(&entry).await?;
                info!(dn = %entry.dn, "Created resource association");
                Ok(())
            }
        }
    }

    /// Remove a resource group from a role's association.
    #[instrument(skip(self))]
    pub async fn detach_resource(&self, role_dn: &str, resource_dn: &str) -> Outcome {
        Outcome::from_result(
            self.try_detach(role_dn, resource_dn).await,
            format!("detached {resource_dn}"),
        )
    }

    async fn try_detach(&self, role_dn: &str, resource_dn: &str) -> DirectoryResult<()> {
        let schema = &self.inner.config().schema;
        let Some(entry) = self.association(role_dn).await? else {
            return Ok(());
        };

        let delta = AttributeDelta::new().delete(schema.resource.as_str(), resource_dn);
        match self.inner.client().modify(&entry.dn, &delta).await {
            Ok(()) | Err(DirectoryError::NoSuchValue { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Deref for RoleRepository {
    type Target = Repository;

    fn deref(&self) -> &Repository {
        &self.inner
    }
}
