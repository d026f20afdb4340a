//! Directory source configuration
//!
//! One [`SourceConfig`] describes one directory back-end: where the server
//! is, how to bind, and the DN of every functional subtree the identity
//! lifecycle works with.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use dirkeeper_directory::config::{ConnectionSettings, TlsConfig};
use dirkeeper_directory::dn;
use dirkeeper_directory::error::{DirectoryError, DirectoryResult};
use dirkeeper_directory::types::AccountState;

/// Names of the schema attributes and object classes the engine relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaNames {
    /// Naming attribute of user, group and template entries.
    #[serde(default = "default_naming_attribute")]
    pub naming: String,

    /// Membership list on user entries (group DNs).
    #[serde(default = "default_membership_attribute")]
    pub membership: String,

    /// Member list on group entries (user DNs).
    #[serde(default = "default_member_attribute")]
    pub member: String,

    /// Role-equivalence list on role-typed groups (user DNs).
    #[serde(default = "default_equivalence_attribute")]
    pub equivalence: String,

    /// Object class marking a group as role-typed.
    #[serde(default = "default_role_object_class")]
    pub role_object_class: String,

    /// Structural object class of group entries.
    #[serde(default = "default_group_object_class")]
    pub group_object_class: String,

    /// Object classes given to new user entries.
    #[serde(default = "default_user_object_classes")]
    pub user_object_classes: Vec<String>,

    /// Password attribute.
    #[serde(default = "default_password_attribute")]
    pub password: String,

    /// Login-disabled flag, holding `YES` or `NO`.
    #[serde(default = "default_login_disabled_attribute")]
    pub login_disabled: String,

    /// Last login timestamp.
    #[serde(default = "default_login_time_attribute")]
    pub login_time: String,

    /// Password expiration timestamp.
    #[serde(default = "default_password_expiration_attribute")]
    pub password_expiration: String,

    /// Attribute on a resource association entry naming the role DN.
    #[serde(default = "default_resource_role_attribute")]
    pub resource_role: String,

    /// Attribute on a resource association entry listing resource group DNs.
    #[serde(default = "default_resource_attribute")]
    pub resource: String,

    /// Object class of resource association entries.
    #[serde(default = "default_resource_object_class")]
    pub resource_object_class: String,
}

fn default_naming_attribute() -> String {
    "cn".to_string()
}

fn default_membership_attribute() -> String {
    "groupMembership".to_string()
}

fn default_member_attribute() -> String {
    "member".to_string()
}

fn default_equivalence_attribute() -> String {
    "equivalentToMe".to_string()
}

fn default_role_object_class() -> String {
    "nrfRole".to_string()
}

fn default_group_object_class() -> String {
    "groupOfNames".to_string()
}

fn default_user_object_classes() -> Vec<String> {
    vec![
        "top".to_string(),
        "person".to_string(),
        "organizationalPerson".to_string(),
        "inetOrgPerson".to_string(),
    ]
}

fn default_password_attribute() -> String {
    "userPassword".to_string()
}

fn default_login_disabled_attribute() -> String {
    "loginDisabled".to_string()
}

fn default_login_time_attribute() -> String {
    "loginTime".to_string()
}

fn default_password_expiration_attribute() -> String {
    "passwordExpirationTime".to_string()
}

fn default_resource_role_attribute() -> String {
    "roleDN".to_string()
}

fn default_resource_attribute() -> String {
    "resourceDN".to_string()
}

fn default_resource_object_class() -> String {
    "nrfResourceAssociation".to_string()
}

impl Default for SchemaNames {
    fn default() -> Self {
        Self {
            naming: default_naming_attribute(),
            membership: default_membership_attribute(),
            member: default_member_attribute(),
            equivalence: default_equivalence_attribute(),
            role_object_class: default_role_object_class(),
            group_object_class: default_group_object_class(),
            user_object_classes: default_user_object_classes(),
            password: default_password_attribute(),
            login_disabled: default_login_disabled_attribute(),
            login_time: default_login_time_attribute(),
            password_expiration: default_password_expiration_attribute(),
            resource_role: default_resource_role_attribute(),
            resource: default_resource_attribute(),
            resource_object_class: default_resource_object_class(),
        }
    }
}

/// Configuration for one directory source.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory server hostname or IP address.
    pub host: String,

    /// Server port (389 for LDAP, 636 for LDAPS).
    #[serde(default = "default_ldap_port")]
    pub port: u16,

    /// Use SSL/TLS (LDAPS).
    #[serde(default)]
    pub use_ssl: bool,

    /// Use STARTTLS upgrade on plain LDAP connection.
    #[serde(default)]
    pub use_starttls: bool,

    /// Bind DN for authentication.
    pub bind_dn: String,

    /// Bind password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,

    /// Root of the tree this source administers.
    pub base_dn: String,

    /// Active users subtree.
    pub active_users_dn: String,

    /// Inactive users subtree.
    pub inactive_users_dn: String,

    /// Superset holding every user; identifier uniqueness is checked here.
    pub all_users_dn: String,

    /// Pending / to-process subtree.
    pub pending_dn: String,

    /// Staging area where new user entries are created.
    pub creation_dn: String,

    /// Root of the user templates.
    pub template_dn: String,

    /// Group granting administration rights.
    #[serde(default)]
    pub admin_group_dn: String,

    /// Group granting read-only rights.
    #[serde(default)]
    pub reader_group_dn: String,

    /// Group containers, searched in order to resolve a group name.
    #[serde(default)]
    pub group_base_dns: Vec<String>,

    /// Role definition roots.
    #[serde(default)]
    pub role_base_dns: Vec<String>,

    /// Root of the role → resource association entries.
    #[serde(default)]
    pub resource_base_dn: String,

    /// Application base DN.
    #[serde(default)]
    pub app_base_dn: String,

    /// Surname prefixes stripped when generating identifiers (e.g. "de ", "van ").
    #[serde(default = "default_name_prefixes")]
    pub name_prefixes: Vec<String>,

    /// Connection settings (timeouts, pool size, lifetime).
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// TLS configuration.
    #[serde(default)]
    pub tls: TlsConfig,

    /// Attribute and object class names.
    #[serde(default)]
    pub schema: SchemaNames,
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("use_starttls", &self.use_starttls)
            .field("bind_dn", &self.bind_dn)
            .field(
                "bind_password",
                &self.bind_password.as_ref().map(|_| "***REDACTED***"),
            )
            .field("base_dn", &self.base_dn)
            .field("active_users_dn", &self.active_users_dn)
            .field("inactive_users_dn", &self.inactive_users_dn)
            .field("all_users_dn", &self.all_users_dn)
            .field("pending_dn", &self.pending_dn)
            .field("creation_dn", &self.creation_dn)
            .field("template_dn", &self.template_dn)
            .field("group_base_dns", &self.group_base_dns)
            .field("role_base_dns", &self.role_base_dns)
            .field("resource_base_dn", &self.resource_base_dn)
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

fn default_ldap_port() -> u16 {
    389
}

fn default_name_prefixes() -> Vec<String> {
    ["de la ", "de ", "du ", "des ", "d'", "le ", "la ", "van ", "von ", "van der "]
        .iter()
        .map(|p| (*p).to_string())
        .collect()
}

impl SourceConfig {
    /// Create a config whose functional subtrees are the conventional
    /// `ou=` containers under `base_dn`.
    pub fn new(
        host: impl Into<String>,
        base_dn: impl Into<String>,
        bind_dn: impl Into<String>,
    ) -> Self {
        let base_dn = base_dn.into();
        let under = |ou: &str| format!("ou={ou},{base_dn}");

        Self {
            host: host.into(),
            port: default_ldap_port(),
            use_ssl: false,
            use_starttls: false,
            bind_dn: bind_dn.into(),
            bind_password: None,
            active_users_dn: under("active,ou=users"),
            inactive_users_dn: under("inactive,ou=users"),
            all_users_dn: under("users"),
            pending_dn: under("pending,ou=users"),
            creation_dn: under("creation,ou=users"),
            template_dn: under("templates"),
            admin_group_dn: String::new(),
            reader_group_dn: String::new(),
            group_base_dns: vec![under("groups")],
            role_base_dns: vec![under("roles")],
            resource_base_dn: under("resources"),
            app_base_dn: String::new(),
            name_prefixes: default_name_prefixes(),
            connection: ConnectionSettings::default(),
            tls: TlsConfig::default(),
            schema: SchemaNames::default(),
            base_dn,
        }
    }

    /// Set bind password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.bind_password = Some(password.into());
        self
    }

    /// Enable SSL (LDAPS).
    #[must_use]
    pub fn with_ssl(mut self) -> Self {
        self.use_ssl = true;
        self.port = 636;
        self
    }

    /// Enable STARTTLS.
    #[must_use]
    pub fn with_starttls(mut self) -> Self {
        self.use_starttls = true;
        self
    }

    /// Set connection settings.
    #[must_use]
    pub fn with_connection(mut self, connection: ConnectionSettings) -> Self {
        self.connection = connection;
        self
    }

    /// Set the group containers searched when resolving group names.
    #[must_use]
    pub fn with_group_bases(mut self, bases: Vec<String>) -> Self {
        self.group_base_dns = bases;
        self
    }

    /// Set the role definition roots.
    #[must_use]
    pub fn with_role_bases(mut self, bases: Vec<String>) -> Self {
        self.role_base_dns = bases;
        self
    }

    /// Set the surname prefixes.
    #[must_use]
    pub fn with_name_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.name_prefixes = prefixes;
        self
    }

    /// Get the LDAP URL.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Bases searched when searching users: active then inactive.
    #[must_use]
    pub fn user_search_bases(&self) -> Vec<String> {
        dedup_bases([&self.active_users_dn, &self.inactive_users_dn])
    }

    /// Bases searched when searching groups.
    #[must_use]
    pub fn group_search_bases(&self) -> Vec<String> {
        if self.group_base_dns.is_empty() {
            vec![self.base_dn.clone()]
        } else {
            dedup_bases(self.group_base_dns.iter())
        }
    }

    /// Bases searched when searching roles.
    #[must_use]
    pub fn role_search_bases(&self) -> Vec<String> {
        if self.role_base_dns.is_empty() {
            vec![self.base_dn.clone()]
        } else {
            dedup_bases(self.role_base_dns.iter())
        }
    }

    /// Derive the lifecycle state of a user from the subtree holding it.
    ///
    /// The most specific matching subtree wins, so nested layouts such as
    /// `ou=pending,ou=users` inside an `ou=users` active tree resolve correctly.
    #[must_use]
    pub fn account_state(&self, user_dn: &str) -> AccountState {
        let candidates = [
            (&self.pending_dn, AccountState::Pending),
            (&self.creation_dn, AccountState::Pending),
            (&self.inactive_users_dn, AccountState::Inactive),
            (&self.active_users_dn, AccountState::Active),
        ];

        candidates
            .iter()
            .filter(|(base, _)| !base.is_empty() && dn::is_descendant_of(user_dn, base))
            .max_by_key(|(base, _)| dn::components(base).len())
            .map(|(_, state)| *state)
            .unwrap_or(AccountState::Unknown)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> DirectoryResult<()> {
        let required = [
            ("host", &self.host),
            ("bind_dn", &self.bind_dn),
            ("base_dn", &self.base_dn),
            ("active_users_dn", &self.active_users_dn),
            ("inactive_users_dn", &self.inactive_users_dn),
            ("all_users_dn", &self.all_users_dn),
            ("pending_dn", &self.pending_dn),
            ("creation_dn", &self.creation_dn),
            ("template_dn", &self.template_dn),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(DirectoryError::invalid_configuration(format!(
                    "{name} is required"
                )));
            }
        }

        if self.use_ssl && self.use_starttls {
            return Err(DirectoryError::invalid_configuration(
                "cannot use both SSL and STARTTLS",
            ));
        }

        for user_base in [&self.active_users_dn, &self.inactive_users_dn] {
            if !dn::is_within(user_base, &self.all_users_dn) {
                tracing::warn!(
                    user_base = %user_base,
                    all_users_dn = %self.all_users_dn,
                    "User subtree is outside the all-users superset; identifier uniqueness will not cover it"
                );
            }
        }

        self.connection.validate()?;
        self.tls.validate_security();
        Ok(())
    }

    /// Create a redacted copy (for logging/display).
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.bind_password.is_some() {
            config.bind_password = Some("***REDACTED***".to_string());
        }
        config
    }
}

fn dedup_bases<'a>(bases: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for base in bases {
        if !base.is_empty() && !out.iter().any(|b| dn::same(b, base)) {
            out.push(base.clone());
        }
    }
    out
}

/// A file describing every configured source.
///
/// ```json
/// { "sources": { "north": { "host": "ldap.north.example", ... } } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesFile {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
}

impl SourcesFile {
    /// Environment variable naming the sources file.
    pub const ENV_VAR: &'static str = "DIRKEEPER_SOURCES";

    /// Parse and validate a sources document.
    pub fn from_json(text: &str) -> DirectoryResult<Self> {
        let file: SourcesFile = serde_json::from_str(text).map_err(|e| {
            DirectoryError::invalid_configuration(format!("malformed sources file: {e}"))
        })?;
        file.validate()?;
        Ok(file)
    }

    /// Read, parse and validate a sources file.
    pub fn load(path: impl AsRef<Path>) -> DirectoryResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DirectoryError::invalid_configuration(format!(
                "cannot read sources file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&text)
    }

    /// Validate every source, naming the offending one on failure.
    pub fn validate(&self) -> DirectoryResult<()> {
        if self.sources.is_empty() {
            return Err(DirectoryError::invalid_configuration(
                "sources file defines no sources",
            ));
        }
        for (name, source) in &self.sources {
            source.validate().map_err(|e| {
                DirectoryError::invalid_configuration(format!("source '{name}': {e}"))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SourceConfig {
        SourceConfig::new("ldap.example.org", "o=org", "cn=admin,o=org").with_password("secret")
    }

    #[test]
    fn test_new_derives_subtrees() {
        let config = sample();
        assert_eq!(config.active_users_dn, "ou=active,ou=users,o=org");
        assert_eq!(config.all_users_dn, "ou=users,o=org");
        assert_eq!(config.group_search_bases(), vec!["ou=groups,o=org"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_url() {
        assert_eq!(sample().url(), "ldap://ldap.example.org:389");
        assert_eq!(sample().with_ssl().url(), "ldaps://ldap.example.org:636");
    }

    #[test]
    fn test_ssl_and_starttls_conflict() {
        let config = sample().with_ssl().with_starttls();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_required_dn() {
        let mut config = sample();
        config.pending_dn = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pending_dn"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("REDACTED"));
        assert_eq!(
            sample().redacted().bind_password.as_deref(),
            Some("***REDACTED***")
        );
    }

    #[test]
    fn test_account_state_most_specific_wins() {
        let mut config = sample();
        config.active_users_dn = "ou=users,o=org".to_string();
        config.pending_dn = "ou=pending,ou=users,o=org".to_string();
        config.inactive_users_dn = "ou=inactive,o=org".to_string();

        assert_eq!(
            config.account_state("cn=A,ou=pending,ou=users,o=org"),
            AccountState::Pending
        );
        assert_eq!(
            config.account_state("cn=A,ou=users,o=org"),
            AccountState::Active
        );
        assert_eq!(
            config.account_state("cn=A,ou=inactive,o=org"),
            AccountState::Inactive
        );
        assert_eq!(
            config.account_state("cn=A,ou=elsewhere,o=org"),
            AccountState::Unknown
        );
    }

    #[test]
    fn test_user_search_bases_dedup() {
        let mut config = sample();
        config.inactive_users_dn = config.active_users_dn.to_uppercase();
        assert_eq!(config.user_search_bases().len(), 1);
    }

    #[test]
    fn test_sources_file_parse() {
        let json = r#"{
            "sources": {
                "north": {
                    "host": "ldap.north.example",
                    "bind_dn": "cn=admin,o=north",
                    "bind_password": "pw",
                    "base_dn": "o=north",
                    "active_users_dn": "ou=active,o=north",
                    "inactive_users_dn": "ou=inactive,o=north",
                    "all_users_dn": "o=north",
                    "pending_dn": "ou=pending,o=north",
                    "creation_dn": "ou=creation,o=north",
                    "template_dn": "ou=templates,o=north",
                    "role_base_dns": ["ou=roles,o=north", "ou=apps,o=north"],
                    "connection": { "pool_size": 3 },
                    "schema": { "role_object_class": "roleGroup" }
                }
            }
        }"#;

        let file = SourcesFile::from_json(json).unwrap();
        let north = &file.sources["north"];
        assert_eq!(north.port, 389);
        assert_eq!(north.connection.pool_size, 3);
        assert_eq!(north.role_search_bases().len(), 2);
        assert_eq!(north.schema.role_object_class, "roleGroup");
        assert_eq!(north.schema.membership, "groupMembership");
        assert!(!north.name_prefixes.is_empty());
    }

    #[test]
    fn test_sources_file_rejects_invalid_source() {
        let json = r#"{ "sources": { "bad": {
            "host": "", "bind_dn": "cn=a", "base_dn": "o=x",
            "active_users_dn": "a", "inactive_users_dn": "b", "all_users_dn": "c",
            "pending_dn": "d", "creation_dn": "e", "template_dn": "f"
        } } }"#;
        let err = SourcesFile::from_json(json).unwrap_err();
        assert!(err.to_string().contains("source 'bad'"));
    }

    #[test]
    fn test_sources_file_empty() {
        assert!(SourcesFile::from_json(r#"{ "sources": {} }"#).is_err());
        assert!(SourcesFile::from_json("not json").is_err());
    }
}
