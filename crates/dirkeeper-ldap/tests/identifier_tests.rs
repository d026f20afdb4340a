//! Identifier generation against the in-memory directory.

mod common;

use std::sync::Arc;

use common::*;
use dirkeeper_directory::error::DirectoryError;
use dirkeeper_ldap::identifier::IdentifierPlan;
use dirkeeper_ldap::IdentifierGenerator;

fn generator(directory: &Arc<MemoryDirectory>) -> IdentifierGenerator {
    init_test_logging();
    IdentifierGenerator::from_config(directory.clone(), &test_config())
}

#[tokio::test]
async fn test_generate_without_collision() {
    let directory = Arc::new(MemoryDirectory::seeded());
    let id = generator(&directory).generate("Jean", "Dupont").await.unwrap();
    assert_eq!(id, "JEADUP");
    assert_eq!(directory.search_calls(), 1);
}

#[tokio::test]
async fn test_generate_retries_with_next_surname_letter() {
    let directory = Arc::new(MemoryDirectory::seeded());
    directory.add_user(ACTIVE, "JEADUP", "Jeanne", "Dupuis");

    let id = generator(&directory).generate("Jean", "Dupont").await.unwrap();
    assert_eq!(id, "JEADUO");
}

#[tokio::test]
async fn test_uniqueness_covers_every_user_subtree() {
    let directory = Arc::new(MemoryDirectory::seeded());
    directory.add_user(INACTIVE, "JEADUP", "Jean", "Dupont");
    directory.add_user(PENDING, "JEADUO", "Jean", "Duong");

    let id = generator(&directory).generate("Jean", "Dupont").await.unwrap();
    assert_eq!(id, "JEADUN");
}

#[tokio::test]
async fn test_exhausted_candidates_return_fallback_once() {
    let directory = Arc::new(MemoryDirectory::seeded());
    let plan = IdentifierPlan::build("Jean", "Dupont", &test_config().name_prefixes).unwrap();
    for candidate in &plan.candidates {
        directory.add_user(ACTIVE, candidate, "x", "y");
    }

    let id = generator(&directory).generate("Jean", "Dupont").await.unwrap();
    assert_eq!(id, "JEADU");
    assert_eq!(directory.search_calls(), plan.candidates.len());
    assert!(directory.search_calls() <= "Dupont".len());
}

#[tokio::test]
async fn test_prefix_is_stripped_but_retries_use_full_surname() {
    let directory = Arc::new(MemoryDirectory::seeded());
    directory.add_user(ACTIVE, "LUCFON", "Luc", "Fontaine");

    let gen = generator(&directory);
    // "de la Fontaine": index 3 of the full surname is 'l'.
    assert_eq!(gen.generate("Luc", "de la Fontaine").await.unwrap(), "LUCFOL");
}

#[tokio::test]
async fn test_accents_are_folded() {
    let directory = Arc::new(MemoryDirectory::seeded());
    let id = generator(&directory)
        .generate("Hélène", "Bézier")
        .await
        .unwrap();
    assert_eq!(id, "HELBEZ");
}

#[tokio::test]
async fn test_uniqueness_lookup_failure_propagates() {
    let directory = Arc::new(MemoryDirectory::seeded());
    directory.fail_search_on(USERS);

    let err = generator(&directory)
        .generate("Jean", "Dupont")
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_missing_names_are_rejected() {
    let directory = Arc::new(MemoryDirectory::seeded());
    let err = generator(&directory).generate("", "Dupont").await.unwrap_err();
    assert!(matches!(err, DirectoryError::Validation { .. }));
    assert_eq!(directory.search_calls(), 0);
}
