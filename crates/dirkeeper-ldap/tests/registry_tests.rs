//! Multi-source registry tests.

mod common;

use std::sync::Arc;

use common::*;
use dirkeeper_directory::error::DirectoryError;
use dirkeeper_directory::types::EntityKind;
use dirkeeper_ldap::{SearchField, SourceConfig, SourceRegistry, SourcesFile};

async fn registry_with_two_sources() -> (SourceRegistry, Arc<MemoryDirectory>, Arc<MemoryDirectory>) {
    init_test_logging();
    let north = Arc::new(MemoryDirectory::seeded());
    let south = Arc::new(MemoryDirectory::seeded());
    let registry = SourceRegistry::new();
    registry
        .configure_source_with_client("north", test_config(), north.clone())
        .await
        .unwrap();
    registry
        .configure_source_with_client("south", test_config(), south.clone())
        .await
        .unwrap();
    (registry, north, south)
}

#[tokio::test]
async fn test_unknown_source_fails_fast() {
    let registry = SourceRegistry::new();
    let err = registry
        .get_repository(EntityKind::User, "nowhere")
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::UnknownSource { ref source_name } if source_name == "nowhere"));
    assert!(registry.lifecycle("nowhere").await.is_err());
}

#[tokio::test]
async fn test_sources_are_isolated() {
    let (registry, north, _south) = registry_with_two_sources().await;
    north.add_user(ACTIVE, "JEADUP", "Jean", "Dupont");

    let north_users = registry.get_repository(EntityKind::User, "north").await.unwrap();
    let south_users = registry.get_repository(EntityKind::User, "south").await.unwrap();
    assert_eq!(north_users.search("Dupont", SearchField::Name).await.len(), 1);
    assert!(south_users.search("Dupont", SearchField::Name).await.is_empty());

    let south_ids = registry.identifiers("south").await.unwrap();
    assert_eq!(south_ids.generate("Jean", "Dupont").await.unwrap(), "JEADUP");
    let north_ids = registry.identifiers("north").await.unwrap();
    assert_eq!(north_ids.generate("Jean", "Dupont").await.unwrap(), "JEADUO");
}

#[tokio::test]
async fn test_repositories_are_cached_per_source_and_kind() {
    let (registry, _north, _south) = registry_with_two_sources().await;

    for kind in EntityKind::all() {
        registry.get_repository(*kind, "north").await.unwrap();
        registry.get_repository(*kind, "north").await.unwrap();
    }
    registry.get_repository(EntityKind::User, "south").await.unwrap();
    assert_eq!(registry.cached_repositories().await, EntityKind::all().len() + 1);

    registry.clear_cache("north").await;
    assert_eq!(registry.cached_repositories().await, 1);

    registry.clear_all().await;
    assert_eq!(registry.cached_repositories().await, 0);
}

#[tokio::test]
async fn test_reconfigure_drops_cached_repositories() {
    let (registry, _north, _south) = registry_with_two_sources().await;
    registry.get_repository(EntityKind::Group, "north").await.unwrap();

    let replacement = Arc::new(MemoryDirectory::seeded());
    replacement.add_group(GROUPS, "GroupA", false);
    registry
        .configure_source_with_client("north", test_config(), replacement.clone())
        .await
        .unwrap();

    let groups = registry.get_repository(EntityKind::Group, "north").await.unwrap();
    assert_eq!(groups.search("GroupA", SearchField::Any).await.len(), 1);
}

#[tokio::test]
async fn test_roles_and_membership_from_registry() {
    let (registry, north, _south) = registry_with_two_sources().await;
    let user_dn = north.add_user(ACTIVE, "JEADUP", "Jean", "Dupont");
    let role_dn = north.add_group(ROLES, "Auditor", true);

    let roles = registry.roles("north").await.unwrap();
    assert!(roles.find_role("Auditor").await.is_some());

    let membership = registry.membership("north").await.unwrap();
    assert!(membership.add_membership(&user_dn, &role_dn).await.succeeded());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let registry = SourceRegistry::new();
    let mut config = test_config();
    config.creation_dn = String::new();

    let err = registry
        .configure_source_with_client("bad", config, Arc::new(MemoryDirectory::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::InvalidConfiguration { .. }));
    assert!(registry.source_names().await.is_empty());
}

#[tokio::test]
async fn test_ldap_source_is_lazy() {
    let registry = SourceRegistry::new();
    registry
        .configure_source("north", SourceConfig::new("ldap.invalid", "o=org", "cn=admin,o=org"))
        .await
        .unwrap();

    let status = registry.pool_status("north").await.unwrap().unwrap();
    assert_eq!(status.outstanding, 0);
    assert_eq!(status.capacity, 5);
    assert_eq!(registry.source_names().await, vec!["north".to_string()]);
}

#[tokio::test]
async fn test_from_file() {
    let json = r#"{
        "sources": {
            "north": {
                "host": "ldap.north.invalid",
                "bind_dn": "cn=admin,o=north",
                "base_dn": "o=north",
                "active_users_dn": "ou=active,o=north",
                "inactive_users_dn": "ou=inactive,o=north",
                "all_users_dn": "o=north",
                "pending_dn": "ou=pending,o=north",
                "creation_dn": "ou=creation,o=north",
                "template_dn": "ou=templates,o=north"
            },
            "south": {
                "host": "ldap.south.invalid",
                "bind_dn": "cn=admin,o=south",
                "base_dn": "o=south",
                "active_users_dn": "ou=active,o=south",
                "inactive_users_dn": "ou=inactive,o=south",
                "all_users_dn": "o=south",
                "pending_dn": "ou=pending,o=south",
                "creation_dn": "ou=creation,o=south",
                "template_dn": "ou=templates,o=south",
                "connection": { "pool_size": 2 }
            }
        }
    }"#;
    let file = SourcesFile::from_json(json).unwrap();
    let registry = SourceRegistry::from_file(&file).await.unwrap();

    assert_eq!(registry.source_names().await, vec!["north", "south"]);
    let south = registry.pool_status("south").await.unwrap().unwrap();
    assert_eq!(south.capacity, 2);
    assert_eq!(
        registry.config("north").await.unwrap().active_users_dn,
        "ou=active,o=north"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reconfigure_racing_lookups_never_caches_old_client() {
    init_test_logging();
    let registry = SourceRegistry::new();
    registry
        .configure_source_with_client("north", test_config(), Arc::new(MemoryDirectory::seeded()))
        .await
        .unwrap();

    for _ in 0..25 {
        let replacement = Arc::new(MemoryDirectory::seeded());
        replacement.add_group(GROUPS, "GroupA", false);

        let lookups: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry.get_repository(EntityKind::Group, "north").await
                })
            })
            .collect();
        registry
            .configure_source_with_client("north", test_config(), replacement.clone())
            .await
            .unwrap();
        for lookup in lookups {
            lookup.await.unwrap().unwrap();
        }

        let groups = registry.get_repository(EntityKind::Group, "north").await.unwrap();
        assert_eq!(groups.search("GroupA", SearchField::Any).await.len(), 1);

        // Next round starts from a source without GroupA.
        registry
            .configure_source_with_client("north", test_config(), Arc::new(MemoryDirectory::seeded()))
            .await
            .unwrap();
    }
}
