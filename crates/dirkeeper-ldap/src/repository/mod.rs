//! Entity repositories.
//!
//! One [`Repository`] type serves every entity kind; the kind-specific
//! rules come from an injected [`EntityProfile`]. Repository operations are
//! the boundary toward callers: failures are logged and reduced to `None`,
//! an empty list or a failed [`Outcome`].

mod profiles;

pub use profiles::{
    profile_for, EntityProfile, GroupProfile, OrgUnitProfile, RoleProfile, SearchField,
    TemplateProfile, UserProfile, TEMPLATE_USER_TYPE_ATTRIBUTE,
};

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use dirkeeper_directory::dn;
use dirkeeper_directory::error::{DirectoryError, DirectoryResult};
use dirkeeper_directory::operation::{AttributeDelta, DirectoryEntry, Filter, Outcome, SearchScope};
use dirkeeper_directory::traits::DirectoryClient;
use dirkeeper_directory::types::EntityKind;

use crate::config::SourceConfig;

/// Directory operations for one entity kind of one source.
#[derive(Clone)]
pub struct Repository {
    client: Arc<dyn DirectoryClient>,
    config: Arc<SourceConfig>,
    profile: Arc<dyn EntityProfile>,
}

impl Repository {
    /// Create a repository with an explicit profile.
    pub fn new(
        client: Arc<dyn DirectoryClient>,
        config: Arc<SourceConfig>,
        profile: Arc<dyn EntityProfile>,
    ) -> Self {
        Self {
            client,
            config,
            profile,
        }
    }

    /// Create a repository with the default profile of an entity kind.
    pub fn for_kind(
        kind: EntityKind,
        client: Arc<dyn DirectoryClient>,
        config: Arc<SourceConfig>,
    ) -> Self {
        Self::new(client, config, Arc::from(profile_for(kind)))
    }

    /// The entity kind this repository serves.
    pub fn kind(&self) -> EntityKind {
        self.profile.kind()
    }

    /// The source configuration.
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// The underlying client.
    pub fn client(&self) -> &Arc<dyn DirectoryClient> {
        &self.client
    }

    /// Find an entry by its naming attribute value, probing every base in order.
    #[instrument(skip(self), fields(kind = %self.kind()))]
    pub async fn find_by_identifier(&self, identifier: &str) -> Option<DirectoryEntry> {
        let filter = self
            .profile
            .object_filter(&self.config)
            .and_with(Filter::eq(
                self.profile.naming_attribute(&self.config),
                identifier,
            ));

        for base in self.profile.search_bases(&self.config) {
            match self
                .client
                .search(&base, SearchScope::Subtree, &filter, &[])
                .await
            {
                Ok(entries) => {
                    if let Some(entry) = entries.into_iter().next() {
                        return Some(entry);
                    }
                }
                Err(e) => warn!(base = %base, error = %e, "Identifier lookup failed on base"),
            }
        }

        debug!("No entry found for identifier");
        None
    }

    /// Fetch an entry by DN.
    #[instrument(skip(self), fields(kind = %self.kind()))]
    pub async fn find_by_dn(&self, entry_dn: &str) -> Option<DirectoryEntry> {
        match self.client.read(entry_dn, &[]).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Failed to read entry");
                None
            }
        }
    }

    /// Free-text search across every base of the entity kind.
    ///
    /// An empty term lists every entry of the kind. Results from all bases
    /// are unioned; a failing base is logged and skipped.
    #[instrument(skip(self), fields(kind = %self.kind()))]
    pub async fn search(&self, term: &str, field: SearchField) -> Vec<DirectoryEntry> {
        let filter = self.search_filter(term, field);
        let mut seen = HashSet::new();
        let mut results = Vec::new();

        for base in self.profile.search_bases(&self.config) {
            match self
                .client
                .search(&base, SearchScope::Subtree, &filter, &[])
                .await
            {
                Ok(entries) => {
                    for entry in entries {
                        if seen.insert(dn::normalize(&entry.dn)) {
                            results.push(entry);
                        }
                    }
                }
                Err(e) => warn!(base = %base, error = %e, "Search failed on base, continuing"),
            }
        }

        debug!(found = results.len(), "Search completed");
        results
    }

    fn search_filter(&self, term: &str, field: SearchField) -> Filter {
        let object_filter = self.profile.object_filter(&self.config);
        let term = term.trim();
        if term.is_empty() {
            return object_filter;
        }

        let mut clauses: Vec<Filter> = self
            .profile
            .search_attributes(&self.config, field)
            .into_iter()
            .map(|attribute| Filter::contains(attribute, term))
            .collect();

        let term_filter = if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            Filter::or(clauses)
        };
        object_filter.and_with(term_filter)
    }

    /// Immediate children of a container, of any kind.
    #[instrument(skip(self))]
    pub async fn list_children(&self, container: &str) -> Vec<DirectoryEntry> {
        match self
            .client
            .search(container, SearchScope::OneLevel, &Filter::any(), &[])
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to list container children");
                Vec::new()
            }
        }
    }

    /// Build the entry `create` would add, without touching the directory.
    ///
    /// The naming attribute is required. Object classes of the kind are
    /// added when absent and empty attributes are dropped.
    pub fn validate_new(
        &self,
        parent: &str,
        attributes: BTreeMap<String, Vec<String>>,
    ) -> DirectoryResult<DirectoryEntry> {
        let naming = self.profile.naming_attribute(&self.config);
        let mut entry = DirectoryEntry::new("");
        for (name, values) in attributes {
            let values: Vec<String> = values.into_iter().filter(|v| !v.is_empty()).collect();
            entry.set(name, values);
        }

        let naming_value = entry
            .first_owned(&naming)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                DirectoryError::validation(format!("missing required attribute '{naming}'"))
            })?;

        if parent.trim().is_empty() {
            return Err(DirectoryError::validation("missing parent container"));
        }

        for class in self.profile.object_classes(&self.config) {
            entry.add_value("objectClass", class);
        }

        entry.dn = dn::join(
            &format!("{naming}={}", dn::escape_dn_value(&naming_value)),
            parent,
        );
        Ok(entry)
    }

    /// Create an entry in the kind's creation container.
    pub async fn create(&self, attributes: BTreeMap<String, Vec<String>>) -> Option<DirectoryEntry> {
        let parent = self.profile.creation_parent(&self.config);
        self.create_in(&parent, attributes).await
    }

    /// Create an entry under an explicit parent.
    #[instrument(skip(self, attributes), fields(kind = %self.kind()))]
    pub async fn create_in(
        &self,
        parent: &str,
        attributes: BTreeMap<String, Vec<String>>,
    ) -> Option<DirectoryEntry> {
        let entry = match self.validate_new(parent, attributes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Rejected new entry");
                return None;
            }
        };

        match self.client.add(&entry).await {
            Ok(()) => Some(entry),
            Err(e) => {
                warn!(dn = %entry.dn, error = %e, "Failed to create entry");
                None
            }
        }
    }

    /// Apply attribute changes to an entry.
    #[instrument(skip(self, delta), fields(kind = %self.kind()))]
    pub async fn update(&self, entry_dn: &str, delta: &AttributeDelta) -> Outcome {
        Outcome::from_result(
            self.client.modify(entry_dn, delta).await,
            format!("updated {entry_dn}"),
        )
    }

    /// Delete an entry.
    #[instrument(skip(self), fields(kind = %self.kind()))]
    pub async fn delete(&self, entry_dn: &str) -> Outcome {
        Outcome::from_result(
            self.client.delete(entry_dn).await,
            format!("deleted {entry_dn}"),
        )
    }

    /// Move an entry under a new parent, keeping its RDN.
    #[instrument(skip(self), fields(kind = %self.kind()))]
    pub async fn move_entry(&self, entry_dn: &str, new_parent: &str) -> Outcome {
        match self.move_to(entry_dn, new_parent).await {
            Ok(new_dn) => Outcome::ok(format!("moved to {new_dn}")),
            Err(e) => Outcome::from_result(Err::<(), _>(e), ""),
        }
    }

    /// Move an entry and return its new DN.
    pub async fn move_to(&self, entry_dn: &str, new_parent: &str) -> DirectoryResult<String> {
        let rdn = dn::rdn(entry_dn);
        if rdn.is_empty() {
            return Err(DirectoryError::validation(format!("invalid DN '{entry_dn}'")));
        }
        self.client.rename(entry_dn, rdn, new_parent).await
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("kind", &self.kind())
            .field("backend", &self.client.backend_name())
            .finish_non_exhaustive()
    }
}
