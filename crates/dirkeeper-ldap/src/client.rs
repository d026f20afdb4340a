//! LDAP implementation of the directory client.
//!
//! Every call leases one pooled connection for its own duration, converts
//! protocol results into plain [`DirectoryEntry`] records and maps result
//! codes onto [`DirectoryError`] variants.

use async_trait::async_trait;
use ldap3::{Ldap, LdapError, LdapResult, Mod, Scope, SearchEntry};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, instrument};

use dirkeeper_directory::dn;
use dirkeeper_directory::error::{DirectoryError, DirectoryResult};
use dirkeeper_directory::operation::{
    AttributeDelta, ChangeKind, DirectoryEntry, Filter, SearchScope,
};
use dirkeeper_directory::traits::DirectoryClient;

use crate::config::SourceConfig;
use crate::connection::LdapConnectionFactory;
use crate::pool::{ConnectionPool, PoolStatus, PooledConnection};

// LDAP result codes (RFC 4511)
const RC_SUCCESS: u32 = 0;
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
const RC_NO_SUCH_ATTRIBUTE: u32 = 16;
const RC_ATTRIBUTE_OR_VALUE_EXISTS: u32 = 20;
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_ALREADY_EXISTS: u32 = 68;

/// Directory client backed by a pool of ldap3 connections.
pub struct LdapDirectory {
    pool: ConnectionPool<LdapConnectionFactory>,
    read_timeout: Duration,
    display_name: String,
}

impl LdapDirectory {
    /// Create a client for a source. No connection is opened until first use.
    pub fn new(config: &SourceConfig) -> DirectoryResult<Self> {
        config.validate()?;

        Ok(Self {
            pool: ConnectionPool::new(LdapConnectionFactory::new(config), &config.connection),
            read_timeout: config.connection.read_timeout(),
            display_name: format!("LDAP: {}", config.host),
        })
    }

    /// Current pool counters.
    pub async fn pool_status(&self) -> PoolStatus {
        self.pool.status().await
    }

    /// Close idle pooled connections.
    pub async fn dispose(&self) {
        self.pool.close_idle().await;
        info!(backend = %self.display_name, "LDAP client disposed");
    }

    /// Hand the connection back, discarding it after a transport failure.
    async fn finish<T>(&self, conn: PooledConnection<Ldap>, result: &DirectoryResult<T>) {
        match result {
            Err(e) if e.is_transient() => self.pool.discard(conn).await,
            _ => self.pool.release(conn).await,
        }
    }

    fn to_scope(scope: SearchScope) -> Scope {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }

    fn to_mods(delta: &AttributeDelta) -> Vec<Mod<String>> {
        delta
            .changes
            .iter()
            .map(|change| {
                let values: HashSet<String> = change.values.iter().cloned().collect();
                match change.kind {
                    ChangeKind::Add => Mod::Add(change.attribute.clone(), values),
                    ChangeKind::Replace => Mod::Replace(change.attribute.clone(), values),
                    ChangeKind::Delete => Mod::Delete(change.attribute.clone(), values),
                }
            })
            .collect()
    }

    fn entry_from_search(entry: SearchEntry) -> DirectoryEntry {
        DirectoryEntry {
            dn: entry.dn,
            attributes: entry.attrs.into_iter().collect(),
        }
    }

    async fn run_search(
        &self,
        ldap: &mut Ldap,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        let attrs: Vec<&str> = if attributes.is_empty() {
            vec!["*"]
        } else {
            attributes.to_vec()
        };

        let ldap3::SearchResult(entries, result) = ldap
            .with_timeout(self.read_timeout)
            .search(base, Self::to_scope(scope), filter, attrs)
            .await
            .map_err(|e| transport_error("search", self.read_timeout, e))?;

        match result.rc {
            RC_SUCCESS | RC_SIZE_LIMIT_EXCEEDED => {}
            RC_NO_SUCH_OBJECT => return Err(DirectoryError::not_found(base)),
            _ => return Err(result_error("search", base, None, &result)),
        }

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(Self::entry_from_search)
            .collect())
    }

    async fn run_add(&self, ldap: &mut Ldap, entry: &DirectoryEntry) -> DirectoryResult<()> {
        let attrs: Vec<(&str, HashSet<&str>)> = entry
            .iter()
            .map(|(name, values)| (name.as_str(), values.iter().map(String::as_str).collect()))
            .collect();

        let result = ldap
            .with_timeout(self.read_timeout)
            .add(&entry.dn, attrs)
            .await
            .map_err(|e| transport_error("add", self.read_timeout, e))?;

        check_result("add", &entry.dn, None, &result)
    }

    async fn run_modify(
        &self,
        ldap: &mut Ldap,
        target: &str,
        delta: &AttributeDelta,
    ) -> DirectoryResult<()> {
        let result = ldap
            .with_timeout(self.read_timeout)
            .modify(target, Self::to_mods(delta))
            .await
            .map_err(|e| transport_error("modify", self.read_timeout, e))?;

        let attribute = delta.changes.first().map(|c| c.attribute.as_str());
        check_result("modify", target, attribute, &result)
    }

    async fn run_delete(&self, ldap: &mut Ldap, target: &str) -> DirectoryResult<()> {
        let result = ldap
            .with_timeout(self.read_timeout)
            .delete(target)
            .await
            .map_err(|e| transport_error("delete", self.read_timeout, e))?;

        check_result("delete", target, None, &result)
    }

    async fn run_rename(
        &self,
        ldap: &mut Ldap,
        target: &str,
        new_rdn: &str,
        new_superior: &str,
    ) -> DirectoryResult<String> {
        let result = ldap
            .with_timeout(self.read_timeout)
            .modifydn(target, new_rdn, true, Some(new_superior))
            .await
            .map_err(|e| transport_error("modifydn", self.read_timeout, e))?;

        check_result("modifydn", target, None, &result)?;
        Ok(dn::join(new_rdn, new_superior))
    }
}

fn transport_error(operation: &str, timeout: Duration, error: LdapError) -> DirectoryError {
    match error {
        LdapError::Timeout { .. } => DirectoryError::ConnectionTimeout {
            timeout_secs: timeout.as_secs(),
        },
        other => DirectoryError::connection_failed_with_source(
            format!("LDAP {operation} request failed"),
            other,
        ),
    }
}

fn result_error(
    operation: &str,
    target: &str,
    attribute: Option<&str>,
    result: &LdapResult,
) -> DirectoryError {
    let attribute = attribute.unwrap_or_default().to_string();
    match result.rc {
        RC_NO_SUCH_OBJECT => DirectoryError::not_found(target),
        RC_ALREADY_EXISTS => DirectoryError::AlreadyExists {
            identifier: target.to_string(),
        },
        RC_ATTRIBUTE_OR_VALUE_EXISTS => DirectoryError::ValueExists {
            dn: target.to_string(),
            attribute,
        },
        RC_NO_SUCH_ATTRIBUTE => DirectoryError::NoSuchValue {
            dn: target.to_string(),
            attribute,
        },
        RC_INVALID_CREDENTIALS => DirectoryError::AuthenticationFailed,
        rc => DirectoryError::operation_failed(format!(
            "LDAP {operation} on {target} failed with code {rc}: {}",
            result.text
        )),
    }
}

fn check_result(
    operation: &str,
    target: &str,
    attribute: Option<&str>,
    result: &LdapResult,
) -> DirectoryResult<()> {
    if result.rc == RC_SUCCESS {
        Ok(())
    } else {
        Err(result_error(operation, target, attribute, result))
    }
}

#[async_trait]
impl DirectoryClient for LdapDirectory {
    #[instrument(skip(self, filter, attributes), fields(filter = %filter))]
    async fn search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &Filter,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        let mut conn = self.pool.lease().await?;
        let rendered = filter.to_ldap();
        let result = self
            .run_search(&mut conn, base, scope, &rendered, attributes)
            .await;
        self.finish(conn, &result).await;

        if let Ok(entries) = &result {
            debug!(found = entries.len(), "LDAP search completed");
        }
        result
    }

    #[instrument(skip(self, entry), fields(dn = %entry.dn))]
    async fn add(&self, entry: &DirectoryEntry) -> DirectoryResult<()> {
        let mut conn = self.pool.lease().await?;
        let result = self.run_add(&mut conn, entry).await;
        self.finish(conn, &result).await;

        if result.is_ok() {
            info!("LDAP entry created");
        }
        result
    }

    #[instrument(skip(self, delta), fields(attributes = ?delta.affected_attributes()))]
    async fn modify(&self, dn: &str, delta: &AttributeDelta) -> DirectoryResult<()> {
        if delta.is_empty() {
            return Ok(());
        }

        let mut conn = self.pool.lease().await?;
        let result = self.run_modify(&mut conn, dn, delta).await;
        self.finish(conn, &result).await;

        if result.is_ok() {
            debug!("LDAP entry modified");
        }
        result
    }

    #[instrument(skip(self))]
    async fn delete(&self, dn: &str) -> DirectoryResult<()> {
        let mut conn = self.pool.lease().await?;
        let result = self.run_delete(&mut conn, dn).await;
        self.finish(conn, &result).await;

        if result.is_ok() {
            info!("LDAP entry deleted");
        }
        result
    }

    #[instrument(skip(self))]
    async fn rename(&self, dn: &str, new_rdn: &str, new_superior: &str) -> DirectoryResult<String> {
        let mut conn = self.pool.lease().await?;
        let result = self.run_rename(&mut conn, dn, new_rdn, new_superior).await;
        self.finish(conn, &result).await;

        if let Ok(new_dn) = &result {
            info!(new_dn = %new_dn, "LDAP entry moved");
        }
        result
    }

    fn backend_name(&self) -> &str {
        &self.display_name
    }
}

impl std::fmt::Debug for LdapDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapDirectory")
            .field("display_name", &self.display_name)
            .field("pool", &self.pool)
            .finish()
    }
}
