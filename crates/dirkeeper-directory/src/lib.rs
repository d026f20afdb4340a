//! # Directory Framework
//!
//! Backend-agnostic abstractions for administering identities held in a
//! hierarchical directory.
//!
//! The directory is treated as a tree of entries addressed by distinguished
//! name, searched with scoped filters and mutated with add/replace/delete
//! attribute changes and rename/move operations.
//!
//! ## Crate Organization
//!
//! - [`error`] - Error types with transient/permanent classification
//! - [`operation`] - Entries, deltas, filters, scopes and outcomes
//! - [`traits`] - The [`DirectoryClient`](traits::DirectoryClient) capability trait
//! - [`dn`] - Distinguished name helpers
//! - [`config`] - Connection and TLS settings
//! - [`types`] - Entity kinds and account states
//! - [`time`] - Generalized-time attribute helpers

pub mod config;
pub mod dn;
pub mod error;
pub mod operation;
pub mod time;
pub mod traits;
pub mod types;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{ConnectionSettings, TlsConfig};
    pub use crate::error::{DirectoryError, DirectoryResult};
    pub use crate::operation::{
        AttributeChange, AttributeDelta, ChangeKind, DirectoryEntry, Filter, Outcome, SearchScope,
    };
    pub use crate::traits::DirectoryClient;
    pub use crate::types::{AccountState, EntityKind};
}

// Re-export async_trait for backend implementors
pub use async_trait::async_trait;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let _kind = EntityKind::User;
        let _state = AccountState::Active;
        let _entry = DirectoryEntry::new("cn=test,o=org").with("cn", "test");
        let _filter = Filter::eq("cn", "test");
        let _delta = AttributeDelta::new().replace("title", "Analyst");
        let _outcome = Outcome::ok("done");
        let _settings = ConnectionSettings::default();
    }
}
