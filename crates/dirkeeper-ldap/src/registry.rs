//! Multi-source registry.
//!
//! Holds one client (and so one connection pool) per configured source and
//! hands out repositories and services bound to it. Repositories are built
//! on first use and cached by `(source, kind)`.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use dirkeeper_directory::error::{DirectoryError, DirectoryResult};
use dirkeeper_directory::traits::DirectoryClient;
use dirkeeper_directory::types::EntityKind;

use crate::client::LdapDirectory;
use crate::config::{SourceConfig, SourcesFile};
use crate::identifier::IdentifierGenerator;
use crate::lifecycle::LifecycleCoordinator;
use crate::membership::MembershipEnforcer;
use crate::pool::PoolStatus;
use crate::repository::Repository;
use crate::roles::RoleRepository;

#[derive(Clone)]
struct Source {
    config: Arc<SourceConfig>,
    client: Arc<dyn DirectoryClient>,
    ldap: Option<Arc<LdapDirectory>>,
}

/// Registry of configured directory sources.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: Arc<RwLock<HashMap<String, Source>>>,
    repositories: Arc<RwLock<HashMap<(String, EntityKind), Repository>>>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every source of a sources file.
    pub async fn from_file(file: &SourcesFile) -> DirectoryResult<Self> {
        let registry = Self::new();
        for (name, config) in &file.sources {
            registry.configure_source(name, config.clone()).await?;
        }
        Ok(registry)
    }

    /// Configure (or reconfigure) a source backed by an LDAP pool.
    pub async fn configure_source(&self, name: &str, config: SourceConfig) -> DirectoryResult<()> {
        let ldap = Arc::new(LdapDirectory::new(&config)?);
        let client: Arc<dyn DirectoryClient> = ldap.clone();
        self.insert(name, config, client, Some(ldap)).await;
        Ok(())
    }

    /// Configure a source with an explicit client.
    pub async fn configure_source_with_client(
        &self,
        name: &str,
        config: SourceConfig,
        client: Arc<dyn DirectoryClient>,
    ) -> DirectoryResult<()> {
        config.validate()?;
        self.insert(name, config, client, None).await;
        Ok(())
    }

    async fn insert(
        &self,
        name: &str,
        config: SourceConfig,
        client: Arc<dyn DirectoryClient>,
        ldap: Option<Arc<LdapDirectory>>,
    ) {
        let source = Source {
            config: Arc::new(config),
            client,
            ldap,
        };
        let previous = {
            let mut sources = self.sources.write().await;
            let previous = sources.insert(name.to_string(), source);
            // Cleared under the sources lock so no lookup can re-cache the old client.
            self.clear_cache(name).await;
            previous
        };

        if let Some(Source { ldap: Some(ldap), .. }) = previous {
            ldap.dispose().await;
        }
        info!(source = %name, "Directory source configured");
    }

    async fn source(&self, name: &str) -> DirectoryResult<Source> {
        self.sources
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| DirectoryError::UnknownSource {
                source_name: name.to_string(),
            })
    }

    /// Names of every configured source, sorted.
    pub async fn source_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Configuration of a source.
    pub async fn config(&self, source: &str) -> DirectoryResult<Arc<SourceConfig>> {
        Ok(self.source(source).await?.config)
    }

    /// Repository for an entity kind of a source.
    pub async fn get_repository(&self, kind: EntityKind, source: &str) -> DirectoryResult<Repository> {
        let key = (source.to_string(), kind);
        {
            let cache = self.repositories.read().await;
            if let Some(repository) = cache.get(&key) {
                return Ok(repository.clone());
            }
        }

        // Lock order: sources, then repositories.
        let sources = self.sources.read().await;
        let entry = sources
            .get(source)
            .ok_or_else(|| DirectoryError::UnknownSource {
                source_name: source.to_string(),
            })?;
        let mut cache = self.repositories.write().await;

        // Double-check after acquiring write lock
        if let Some(repository) = cache.get(&key) {
            return Ok(repository.clone());
        }

        debug!(source = %source, kind = %kind, "Building repository");
        let repository =
            Repository::for_kind(kind, Arc::clone(&entry.client), Arc::clone(&entry.config));
        cache.insert(key, repository.clone());
        Ok(repository)
    }

    /// Role repository with resource associations.
    pub async fn roles(&self, source: &str) -> DirectoryResult<RoleRepository> {
        RoleRepository::from_repository(self.get_repository(EntityKind::Role, source).await?)
    }

    /// Membership enforcer of a source.
    pub async fn membership(&self, source: &str) -> DirectoryResult<MembershipEnforcer> {
        let entry = self.source(source).await?;
        Ok(MembershipEnforcer::new(entry.client, entry.config.schema.clone()))
    }

    /// Identifier generator of a source.
    pub async fn identifiers(&self, source: &str) -> DirectoryResult<IdentifierGenerator> {
        let entry = self.source(source).await?;
        Ok(IdentifierGenerator::from_config(entry.client, &entry.config))
    }

    /// Lifecycle coordinator of a source.
    pub async fn lifecycle(&self, source: &str) -> DirectoryResult<LifecycleCoordinator> {
        let entry = self.source(source).await?;
        Ok(LifecycleCoordinator::new(entry.client, entry.config))
    }

    /// Pool counters of a source; `None` for sources with an injected client.
    pub async fn pool_status(&self, source: &str) -> DirectoryResult<Option<PoolStatus>> {
        match self.source(source).await?.ldap {
            Some(ldap) => Ok(Some(ldap.pool_status().await)),
            None => Ok(None),
        }
    }

    /// Drop cached repositories of one source.
    pub async fn clear_cache(&self, source: &str) {
        self.repositories
            .write()
            .await
            .retain(|(name, _), _| name != source);
    }

    /// Drop every cached repository.
    pub async fn clear_all(&self) {
        self.repositories.write().await.clear();
    }

    /// Number of cached repositories.
    pub async fn cached_repositories(&self) -> usize {
        self.repositories.read().await.len()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry").finish_non_exhaustive()
    }
}
