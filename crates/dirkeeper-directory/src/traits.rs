//! Directory client capability trait
//!
//! The single seam between the identity algorithms and a directory backend.
//! Every method runs on one leased connection and returns plain records.

use async_trait::async_trait;

use crate::error::{DirectoryError, DirectoryResult};
use crate::operation::{AttributeDelta, DirectoryEntry, Filter, SearchScope};

/// Primitive operations against a hierarchical directory.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Search below `base` with the given scope and filter.
    ///
    /// `attributes` limits the returned attributes; an empty slice asks for
    /// all user attributes. A missing base yields `NotFound`.
    async fn search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &Filter,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>>;

    /// Add a new entry.
    async fn add(&self, entry: &DirectoryEntry) -> DirectoryResult<()>;

    /// Apply attribute modifications to an entry in one request.
    async fn modify(&self, dn: &str, delta: &AttributeDelta) -> DirectoryResult<()>;

    /// Delete an entry.
    async fn delete(&self, dn: &str) -> DirectoryResult<()>;

    /// Rename an entry and place it under `new_superior`.
    ///
    /// Returns the new DN.
    async fn rename(&self, dn: &str, new_rdn: &str, new_superior: &str) -> DirectoryResult<String>;

    /// Read one entry with a BASE-scoped search.
    async fn read(&self, dn: &str, attributes: &[&str]) -> DirectoryResult<Option<DirectoryEntry>> {
        match self
            .search(dn, SearchScope::Base, &Filter::any(), attributes)
            .await
        {
            Ok(entries) => Ok(entries.into_iter().next()),
            Err(DirectoryError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check whether an entry exists.
    async fn exists(&self, dn: &str) -> DirectoryResult<bool> {
        Ok(self.read(dn, &["objectClass"]).await?.is_some())
    }

    /// Short name of the backend, for logs.
    fn backend_name(&self) -> &str {
        "directory"
    }
}
