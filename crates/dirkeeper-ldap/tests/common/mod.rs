//! Shared helpers for dirkeeper-ldap integration tests.
//!
//! Provides an in-memory directory implementing [`DirectoryClient`] with
//! failure injection and call counters, plus a seeded source configuration.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};

use dirkeeper_directory::dn;
use dirkeeper_directory::error::{DirectoryError, DirectoryResult};
use dirkeeper_directory::operation::{
    AttributeDelta, ChangeKind, DirectoryEntry, Filter, SearchScope,
};
use dirkeeper_directory::traits::DirectoryClient;
use dirkeeper_ldap::SourceConfig;

static INIT: Once = Once::new();

/// Initialize logging for tests (once).
pub fn init_test_logging() {
    INIT.call_once(|| {
        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

pub const BASE: &str = "o=org";
pub const ACTIVE: &str = "ou=active,ou=users,o=org";
pub const INACTIVE: &str = "ou=inactive,ou=users,o=org";
pub const USERS: &str = "ou=users,o=org";
pub const PENDING: &str = "ou=pending,ou=users,o=org";
pub const CREATION: &str = "ou=creation,ou=users,o=org";
pub const TEMPLATES: &str = "ou=templates,o=org";
pub const GROUPS: &str = "ou=groups,o=org";
pub const ROLES: &str = "ou=roles,o=org";
pub const RESOURCES: &str = "ou=resources,o=org";

/// Source configuration matching the seeded tree.
pub fn test_config() -> SourceConfig {
    SourceConfig::new("ldap.test", BASE, "cn=admin,o=org").with_password("secret")
}

/// In-memory directory with failure injection.
#[derive(Default)]
pub struct MemoryDirectory {
    entries: Mutex<BTreeMap<String, DirectoryEntry>>,
    failing_bases: Mutex<HashSet<String>>,
    failing_modify: Mutex<HashSet<String>>,
    search_calls: AtomicUsize,
    add_calls: AtomicUsize,
    modify_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    rename_calls: AtomicUsize,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory holding the containers of [`test_config`].
    pub fn seeded() -> Self {
        let directory = Self::new();
        directory.insert(DirectoryEntry::new(BASE).with("o", "org"));
        for container in [USERS, ACTIVE, INACTIVE, PENDING, CREATION, TEMPLATES, GROUPS, ROLES, RESOURCES] {
            directory.insert(
                DirectoryEntry::new(container)
                    .with("ou", dn::rdn_value(container))
                    .with("objectClass", "organizationalUnit"),
            );
        }
        directory
    }

    pub fn insert(&self, entry: DirectoryEntry) {
        self.entries
            .lock()
            .unwrap()
            .insert(dn::normalize(&entry.dn), entry);
    }

    pub fn get(&self, entry_dn: &str) -> Option<DirectoryEntry> {
        self.entries
            .lock()
            .unwrap()
            .get(&dn::normalize(entry_dn))
            .cloned()
    }

    pub fn contains(&self, entry_dn: &str) -> bool {
        self.get(entry_dn).is_some()
    }

    /// Insert a user entry.
    pub fn add_user(&self, container: &str, cn: &str, given: &str, surname: &str) -> String {
        let user_dn = format!("cn={cn},{container}");
        self.insert(
            DirectoryEntry::new(&user_dn)
                .with("cn", cn)
                .with("givenName", given)
                .with("sn", surname)
                .with_values(
                    "objectClass",
                    ["top", "person", "organizationalPerson", "inetOrgPerson"],
                ),
        );
        user_dn
    }

    /// Insert a plain group, or a role-typed one.
    pub fn add_group(&self, container: &str, cn: &str, role: bool) -> String {
        let group_dn = format!("cn={cn},{container}");
        let classes: Vec<&str> = if role {
            vec!["top", "groupOfNames", "nrfRole"]
        } else {
            vec!["top", "groupOfNames"]
        };
        self.insert(
            DirectoryEntry::new(&group_dn)
                .with("cn", cn)
                .with_values("objectClass", classes),
        );
        group_dn
    }

    /// Make every search rooted at `base` fail with a connection error.
    pub fn fail_search_on(&self, base: &str) {
        self.failing_bases.lock().unwrap().insert(dn::normalize(base));
    }

    /// Make every modify of `target` fail with an operation error.
    pub fn fail_modify_on(&self, target: &str) {
        self.failing_modify
            .lock()
            .unwrap()
            .insert(dn::normalize(target));
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub fn modify_calls(&self) -> usize {
        self.modify_calls.load(Ordering::SeqCst)
    }

    pub fn rename_calls(&self) -> usize {
        self.rename_calls.load(Ordering::SeqCst)
    }
}

fn apply_delta(entry: &mut DirectoryEntry, delta: &AttributeDelta) -> DirectoryResult<()> {
    for change in &delta.changes {
        match change.kind {
            ChangeKind::Add => {
                for value in &change.values {
                    if !entry.add_value(&change.attribute, value.clone()) {
                        return Err(DirectoryError::ValueExists {
                            dn: entry.dn.clone(),
                            attribute: change.attribute.clone(),
                        });
                    }
                }
            }
            ChangeKind::Replace => entry.set(change.attribute.clone(), change.values.clone()),
            ChangeKind::Delete if change.values.is_empty() => {
                entry.remove(&change.attribute);
            }
            ChangeKind::Delete => {
                for value in &change.values {
                    if !entry.remove_value(&change.attribute, value) {
                        return Err(DirectoryError::NoSuchValue {
                            dn: entry.dn.clone(),
                            attribute: change.attribute.clone(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

#[async_trait]
impl DirectoryClient for MemoryDirectory {
    async fn search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &Filter,
        _attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_bases.lock().unwrap().contains(&dn::normalize(base)) {
            return Err(DirectoryError::connection_failed(format!(
                "injected failure searching {base}"
            )));
        }

        let entries = self.entries.lock().unwrap();
        if !entries.contains_key(&dn::normalize(base)) {
            return Err(DirectoryError::not_found(base));
        }

        Ok(entries
            .values()
            .filter(|entry| match scope {
                SearchScope::Base => dn::same(&entry.dn, base),
                SearchScope::OneLevel => {
                    dn::parent(&entry.dn).is_some_and(|parent| dn::same(&parent, base))
                }
                SearchScope::Subtree => dn::is_within(&entry.dn, base),
            })
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect())
    }

    async fn add(&self, entry: &DirectoryEntry) -> DirectoryResult<()> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock().unwrap();
        let key = dn::normalize(&entry.dn);
        if entries.contains_key(&key) {
            return Err(DirectoryError::AlreadyExists {
                identifier: entry.dn.clone(),
            });
        }
        entries.insert(key, entry.clone());
        Ok(())
    }

    async fn modify(&self, target: &str, delta: &AttributeDelta) -> DirectoryResult<()> {
        self.modify_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_modify.lock().unwrap().contains(&dn::normalize(target)) {
            return Err(DirectoryError::operation_failed(format!(
                "injected failure modifying {target}"
            )));
        }

        let mut entries = self.entries.lock().unwrap();
        let key = dn::normalize(target);
        let mut updated = entries
            .get(&key)
            .cloned()
            .ok_or_else(|| DirectoryError::not_found(target))?;
        apply_delta(&mut updated, delta)?;
        entries.insert(key, updated);
        Ok(())
    }

    async fn delete(&self, target: &str) -> DirectoryResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .remove(&dn::normalize(target))
            .map(|_| ())
            .ok_or_else(|| DirectoryError::not_found(target))
    }

    async fn rename(&self, target: &str, new_rdn: &str, new_superior: &str) -> DirectoryResult<String> {
        self.rename_calls.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock().unwrap();
        let mut entry = entries
            .remove(&dn::normalize(target))
            .ok_or_else(|| DirectoryError::not_found(target))?;

        let new_dn = dn::join(new_rdn, new_superior);
        let new_key = dn::normalize(&new_dn);
        if entries.contains_key(&new_key) {
            entries.insert(dn::normalize(target), entry);
            return Err(DirectoryError::AlreadyExists { identifier: new_dn });
        }
        entry.dn = new_dn.clone();
        entries.insert(new_key, entry);
        Ok(new_dn)
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
