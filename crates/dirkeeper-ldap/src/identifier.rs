//! Unique identifier generation.
//!
//! An identifier is three letters of the given name followed by three
//! letters of the surname (known prefixes such as "de " or "van " removed),
//! stripped of accents and punctuation and upper-cased. Collisions are
//! resolved by swapping the last letter for successive letters of the
//! surname; once those run out a five-letter form is returned as is.

use std::sync::Arc;
use tracing::{debug, instrument, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use dirkeeper_directory::error::{DirectoryError, DirectoryResult};
use dirkeeper_directory::operation::{Filter, SearchScope};
use dirkeeper_directory::traits::DirectoryClient;

use crate::config::SourceConfig;

/// Decompose accents, drop marks and non-alphanumerics, upper-case.
pub fn normalize_identifier(raw: &str) -> String {
    raw.nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Remove the longest matching known prefix from a surname.
///
/// Matching is case-insensitive. If nothing is left after stripping, the
/// surname is returned unchanged.
pub fn strip_name_prefix(surname: &str, prefixes: &[String]) -> String {
    let mut sorted: Vec<&String> = prefixes.iter().filter(|p| !p.is_empty()).collect();
    sorted.sort_by_key(|p| std::cmp::Reverse(p.chars().count()));

    let lowered = surname.to_lowercase();
    for prefix in sorted {
        if lowered.starts_with(&prefix.to_lowercase()) {
            let stripped: String = surname.chars().skip(prefix.chars().count()).collect();
            let stripped = stripped.trim_start();
            if stripped.is_empty() {
                return surname.to_string();
            }
            return stripped.to_string();
        }
    }
    surname.to_string()
}

fn take(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Candidates tried in order, and the unconditional fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierPlan {
    pub candidates: Vec<String>,
    pub fallback: String,
}

impl IdentifierPlan {
    /// Build the candidate sequence for a name.
    pub fn build(given_name: &str, surname: &str, prefixes: &[String]) -> DirectoryResult<Self> {
        let given_name = given_name.trim();
        let surname = surname.trim();
        if given_name.is_empty() || surname.is_empty() {
            return Err(DirectoryError::validation(
                "given name and surname are required to generate an identifier",
            ));
        }

        let stripped = strip_name_prefix(surname, prefixes);
        let first = take(given_name, 3);

        let mut candidates = vec![normalize_identifier(&format!("{first}{}", take(&stripped, 3)))];

        let original: Vec<char> = surname.chars().collect();
        let stem = if stripped.chars().count() <= 2 {
            stripped.clone()
        } else {
            take(&stripped, 2)
        };
        let mut index = 2;
        loop {
            index += 1;
            if index >= original.len() {
                break;
            }
            candidates.push(normalize_identifier(&format!(
                "{first}{stem}{}",
                original[index]
            )));
        }

        let fallback = normalize_identifier(&format!("{first}{}", take(&stripped, 2)));
        if fallback.is_empty() {
            return Err(DirectoryError::validation(format!(
                "no identifier characters in '{given_name} {surname}'"
            )));
        }

        Ok(Self {
            candidates,
            fallback,
        })
    }
}

/// Generates identifiers unique across the all-users subtree.
#[derive(Clone)]
pub struct IdentifierGenerator {
    client: Arc<dyn DirectoryClient>,
    users_dn: String,
    naming_attribute: String,
    prefixes: Vec<String>,
}

impl IdentifierGenerator {
    pub fn new(
        client: Arc<dyn DirectoryClient>,
        users_dn: impl Into<String>,
        naming_attribute: impl Into<String>,
        prefixes: Vec<String>,
    ) -> Self {
        Self {
            client,
            users_dn: users_dn.into(),
            naming_attribute: naming_attribute.into(),
            prefixes,
        }
    }

    /// Build a generator probing the source's all-users subtree.
    pub fn from_config(client: Arc<dyn DirectoryClient>, config: &SourceConfig) -> Self {
        Self::new(
            client,
            config.all_users_dn.clone(),
            config.schema.naming.clone(),
            config.name_prefixes.clone(),
        )
    }

    /// Check whether an identifier is already taken.
    pub async fn is_taken(&self, identifier: &str) -> DirectoryResult<bool> {
        let filter = Filter::eq(self.naming_attribute.as_str(), identifier);
        let found = self
            .client
            .search(
                &self.users_dn,
                SearchScope::Subtree,
                &filter,
                &[self.naming_attribute.as_str()],
            )
            .await?;
        Ok(!found.is_empty())
    }

    /// Generate an identifier for a person.
    ///
    /// Lookup failures are returned as errors rather than read as "free".
    #[instrument(skip(self))]
    pub async fn generate(&self, given_name: &str, surname: &str) -> DirectoryResult<String> {
        let plan = IdentifierPlan::build(given_name, surname, &self.prefixes)?;

        for candidate in &plan.candidates {
            if candidate.is_empty() {
                continue;
            }
            if !self.is_taken(candidate).await? {
                debug!(identifier = %candidate, "Generated identifier");
                return Ok(candidate.clone());
            }
            debug!(identifier = %candidate, "Identifier taken, trying next candidate");
        }

        warn!(
            identifier = %plan.fallback,
            "Every identifier candidate is taken, using the short form without a uniqueness check"
        );
        Ok(plan.fallback)
    }
}

impl std::fmt::Debug for IdentifierGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierGenerator")
            .field("users_dn", &self.users_dn)
            .field("naming_attribute", &self.naming_attribute)
            .field("prefixes", &self.prefixes.len())
            .finish()
    }
}
