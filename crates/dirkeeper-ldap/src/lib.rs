//! # LDAP Identity Lifecycle
//!
//! LDAP backend for dirkeeper: pooled connections to a directory server and
//! the identity lifecycle built on top of them.
//!
//! ## Features
//!
//! - Bounded connection pool with lifetime expiry and overflow connections
//! - Repositories for users, groups, roles, organizational units and templates
//! - Membership kept consistent across user, group and role-equivalence lists
//! - Collision-checked identifier generation and initial password derivation
//! - Pending → active → inactive account transitions
//! - Several independently configured sources side by side
//!
//! ## Example
//!
//! ```ignore
//! use dirkeeper_ldap::{SourceConfig, SourceRegistry, ProvisioningRequest};
//! use dirkeeper_directory::types::EntityKind;
//!
//! let registry = SourceRegistry::new();
//! registry
//!     .configure_source(
//!         "north",
//!         SourceConfig::new("ldap.north.example", "o=north", "cn=admin,o=north")
//!             .with_password("secret"),
//!     )
//!     .await?;
//!
//! let users = registry.get_repository(EntityKind::User, "north").await?;
//! let found = users.find_by_identifier("JEADUP").await;
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod credential;
pub mod identifier;
pub mod lifecycle;
pub mod membership;
pub mod pool;
pub mod records;
pub mod registry;
pub mod repository;
pub mod roles;

// Re-exports
pub use client::LdapDirectory;
pub use config::{SchemaNames, SourceConfig, SourcesFile};
pub use credential::{derive_password, needs_short_variant};
pub use identifier::IdentifierGenerator;
pub use lifecycle::{
    LifecycleCoordinator, ProvisioningOutcome, ProvisioningRequest, Registration,
    RegistrationRequest,
};
pub use membership::{MembershipEnforcer, MembershipReport};
pub use pool::{ConnectionFactory, ConnectionPool, PoolStatus, PooledConnection};
pub use records::{GroupRecord, TemplateRecord, UserRecord};
pub use registry::SourceRegistry;
pub use repository::{Repository, SearchField};
pub use roles::RoleRepository;
