//! Directory operation types
//!
//! Plain records and request types shared by every backend: entries,
//! attribute deltas, search filters and scopes, and the `(success, message)`
//! outcome handed back to callers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A directory entry: a DN plus named, multi-valued string attributes.
///
/// Attribute names are matched case-insensitively on read, as directory
/// servers treat them. A missing attribute reads as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Distinguished name of the entry.
    pub dn: String,

    /// Attribute name to values.
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Create an entry with no attributes.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Set a single-valued attribute using builder pattern.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, vec![value.into()]);
        self
    }

    /// Set a multi-valued attribute using builder pattern.
    pub fn with_values<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(name, values.into_iter().map(Into::into).collect());
        self
    }

    fn key_for(&self, name: &str) -> Option<&String> {
        self.attributes
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
    }

    /// All values of an attribute; empty when the attribute is absent.
    pub fn values(&self, name: &str) -> &[String] {
        self.key_for(name)
            .and_then(|k| self.attributes.get(k))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First value of an attribute, if any.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }

    /// First non-empty value of an attribute, owned.
    pub fn first_owned(&self, name: &str) -> Option<String> {
        self.first(name)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Check if an attribute is present with at least one value.
    pub fn has(&self, name: &str) -> bool {
        !self.values(name).is_empty()
    }

    /// Check if an attribute holds a value (case-insensitive, as DN values compare).
    pub fn has_value(&self, name: &str, value: &str) -> bool {
        self.values(name)
            .iter()
            .any(|v| v.eq_ignore_ascii_case(value))
    }

    /// Check if the entry carries an object class.
    pub fn has_object_class(&self, object_class: &str) -> bool {
        self.has_value("objectClass", object_class)
    }

    /// Replace all values of an attribute. An empty list removes it.
    pub fn set(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        if let Some(existing) = self.key_for(&name).cloned() {
            self.attributes.remove(&existing);
        }
        if !values.is_empty() {
            self.attributes.insert(name, values);
        }
    }

    /// Add a value. Returns `false` if it was already present.
    pub fn add_value(&mut self, name: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        if self.has_value(name, &value) {
            return false;
        }
        let key = self.key_for(name).cloned().unwrap_or_else(|| name.to_string());
        self.attributes.entry(key).or_default().push(value);
        true
    }

    /// Remove a value. Returns `false` if it was not present.
    pub fn remove_value(&mut self, name: &str, value: &str) -> bool {
        let Some(key) = self.key_for(name).cloned() else {
            return false;
        };
        let Some(values) = self.attributes.get_mut(&key) else {
            return false;
        };
        let before = values.len();
        values.retain(|v| !v.eq_ignore_ascii_case(value));
        let removed = values.len() != before;
        if values.is_empty() {
            self.attributes.remove(&key);
        }
        removed
    }

    /// Remove an attribute entirely.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        let key = self.key_for(name).cloned()?;
        self.attributes.remove(&key)
    }

    /// Iterate over all attributes.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.attributes.iter()
    }
}

/// Kind of an attribute modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Add values to the attribute.
    Add,
    /// Replace all values of the attribute.
    Replace,
    /// Delete the listed values, or the whole attribute when none are listed.
    Delete,
}

/// One attribute modification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub kind: ChangeKind,
    pub attribute: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Ordered list of modifications applied to one entry in a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDelta {
    pub changes: Vec<AttributeChange>,
}

impl AttributeDelta {
    /// Create a new empty delta.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, kind: ChangeKind, attribute: impl Into<String>, values: Vec<String>) -> Self {
        self.changes.push(AttributeChange {
            kind,
            attribute: attribute.into(),
            values,
        });
        self
    }

    /// Add a value to an attribute.
    pub fn add(self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(ChangeKind::Add, attribute, vec![value.into()])
    }

    /// Replace an attribute with a single value.
    pub fn replace(self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(ChangeKind::Replace, attribute, vec![value.into()])
    }

    /// Replace an attribute with several values.
    pub fn replace_all(self, attribute: impl Into<String>, values: Vec<String>) -> Self {
        self.push(ChangeKind::Replace, attribute, values)
    }

    /// Delete one value from an attribute.
    pub fn delete(self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(ChangeKind::Delete, attribute, vec![value.into()])
    }

    /// Delete every value of an attribute.
    pub fn clear(self, attribute: impl Into<String>) -> Self {
        self.push(ChangeKind::Delete, attribute, Vec::new())
    }

    /// Check if this delta has any changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Get all affected attribute names.
    pub fn affected_attributes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.changes.iter().map(|c| c.attribute.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// How far beneath the base DN a search looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    /// The base entry only.
    Base,
    /// Immediate children of the base.
    OneLevel,
    /// The base and everything below it.
    Subtree,
}

/// Search filter, rendered to RFC 4515 syntax by [`Filter::to_ldap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// Match entries where attribute equals value.
    Equals { attribute: String, value: String },

    /// Match entries where attribute contains value (substring).
    Contains { attribute: String, value: String },

    /// Match entries where attribute starts with value.
    StartsWith { attribute: String, value: String },

    /// Match entries where attribute exists.
    Present { attribute: String },

    /// Logical AND of multiple filters.
    And { filters: Vec<Filter> },

    /// Logical OR of multiple filters.
    Or { filters: Vec<Filter> },

    /// Logical NOT of a filter.
    Not { filter: Box<Filter> },
}

impl Filter {
    /// Create an equals filter.
    pub fn eq(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create a contains filter.
    pub fn contains(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Contains {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create a starts-with filter.
    pub fn starts_with(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::StartsWith {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create a present (attribute exists) filter.
    pub fn present(attribute: impl Into<String>) -> Self {
        Filter::Present {
            attribute: attribute.into(),
        }
    }

    /// Match every entry.
    pub fn any() -> Self {
        Filter::present("objectClass")
    }

    /// Create an AND filter.
    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And { filters }
    }

    /// Create an OR filter.
    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or { filters }
    }

    /// Create a NOT filter (negation).
    pub fn negate(filter: Filter) -> Self {
        Filter::Not {
            filter: Box::new(filter),
        }
    }

    /// Combine this filter with another using AND.
    pub fn and_with(self, other: Filter) -> Self {
        match self {
            Filter::And { mut filters } => {
                filters.push(other);
                Filter::And { filters }
            }
            _ => Filter::And {
                filters: vec![self, other],
            },
        }
    }

    /// Render to the textual filter syntax. Values are escaped.
    pub fn to_ldap(&self) -> String {
        match self {
            Filter::Equals { attribute, value } => {
                format!("({}={})", attribute, escape_filter_value(value))
            }
            Filter::Contains { attribute, value } => {
                format!("({}=*{}*)", attribute, escape_filter_value(value))
            }
            Filter::StartsWith { attribute, value } => {
                format!("({}={}*)", attribute, escape_filter_value(value))
            }
            Filter::Present { attribute } => format!("({attribute}=*)"),
            Filter::And { filters } => {
                let inner: String = filters.iter().map(Filter::to_ldap).collect();
                format!("(&{inner})")
            }
            Filter::Or { filters } => {
                let inner: String = filters.iter().map(Filter::to_ldap).collect();
                format!("(|{inner})")
            }
            Filter::Not { filter } => format!("(!{})", filter.to_ldap()),
        }
    }

    /// Evaluate the filter against an entry held in memory.
    ///
    /// Matching is case-insensitive, which is what the default equality and
    /// substring rules of most directory schemas do.
    pub fn matches(&self, entry: &DirectoryEntry) -> bool {
        match self {
            Filter::Equals { attribute, value } => entry.has_value(attribute, value),
            Filter::Contains { attribute, value } => {
                let needle = value.to_lowercase();
                entry
                    .values(attribute)
                    .iter()
                    .any(|v| v.to_lowercase().contains(&needle))
            }
            Filter::StartsWith { attribute, value } => {
                let needle = value.to_lowercase();
                entry
                    .values(attribute)
                    .iter()
                    .any(|v| v.to_lowercase().starts_with(&needle))
            }
            Filter::Present { attribute } => {
                attribute.eq_ignore_ascii_case("objectClass") || entry.has(attribute)
            }
            Filter::And { filters } => filters.iter().all(|f| f.matches(entry)),
            Filter::Or { filters } => filters.iter().any(|f| f.matches(entry)),
            Filter::Not { filter } => !filter.matches(entry),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_ldap())
    }
}

/// Escape the filter metacharacters `\ * ( )` and NUL (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

/// The `(success, message)` pair every repository operation returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    /// A successful outcome.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// A failed outcome.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    /// Collapse a result into an outcome, logging the failure detail.
    pub fn from_result<T, E: fmt::Display>(
        result: Result<T, E>,
        on_success: impl Into<String>,
    ) -> Self {
        match result {
            Ok(_) => Self::ok(on_success),
            Err(e) => {
                tracing::warn!(error = %e, "Directory operation failed");
                Self::failed(e.to_string())
            }
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "ok" } else { "failed" };
        write!(f, "{status}: {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value("plain"), "plain");
        assert_eq!(escape_filter_value("a*b"), "a\\2ab");
        assert_eq!(escape_filter_value("(admin)"), "\\28admin\\29");
        assert_eq!(escape_filter_value("back\\slash"), "back\\5cslash");
        assert_eq!(escape_filter_value("nul\0"), "nul\\00");
    }

    #[test]
    fn test_escape_does_not_double_escape() {
        // Backslash is handled first so the escapes it introduces stay intact.
        assert_eq!(escape_filter_value("\\*"), "\\5c\\2a");
    }

    #[test]
    fn test_filter_to_ldap_injection_attempt() {
        let filter = Filter::contains("cn", "*)(objectClass=*");
        assert_eq!(filter.to_ldap(), "(cn=*\\2a\\29\\28objectClass=\\2a*)");
    }

    #[test]
    fn test_complex_filter() {
        let filter = Filter::and(vec![
            Filter::eq("objectClass", "inetOrgPerson"),
            Filter::or(vec![
                Filter::contains("cn", "dup"),
                Filter::starts_with("sn", "Du"),
            ]),
            Filter::negate(Filter::eq("loginDisabled", "YES")),
        ]);
        assert_eq!(
            filter.to_ldap(),
            "(&(objectClass=inetOrgPerson)(|(cn=*dup*)(sn=Du*))(!(loginDisabled=YES)))"
        );
    }

    #[test]
    fn test_filter_matches_entry() {
        let entry = DirectoryEntry::new("cn=JEADUP,ou=users,o=org")
            .with("cn", "JEADUP")
            .with("sn", "Dupont")
            .with_values("objectClass", ["top", "inetOrgPerson"]);

        assert!(Filter::eq("CN", "jeadup").matches(&entry));
        assert!(Filter::contains("sn", "PON").matches(&entry));
        assert!(Filter::starts_with("sn", "du").matches(&entry));
        assert!(!Filter::present("mail").matches(&entry));
        assert!(Filter::negate(Filter::present("mail")).matches(&entry));
        assert!(Filter::any().matches(&entry));
    }

    #[test]
    fn test_entry_absent_attribute_reads_empty() {
        let entry = DirectoryEntry::new("cn=a,o=org");
        assert!(entry.values("groupMembership").is_empty());
        assert_eq!(entry.first("title"), None);
        assert!(!entry.has("title"));
    }

    #[test]
    fn test_entry_case_insensitive_names() {
        let mut entry = DirectoryEntry::new("cn=a,o=org").with("givenName", "Jean");
        assert_eq!(entry.first("givenname"), Some("Jean"));

        entry.set("GIVENNAME", vec!["Paul".to_string()]);
        assert_eq!(entry.attributes.len(), 1);
        assert_eq!(entry.first("givenName"), Some("Paul"));
    }

    #[test]
    fn test_entry_add_remove_value() {
        let mut entry = DirectoryEntry::new("cn=g,o=org");
        assert!(entry.add_value("member", "cn=A,o=org"));
        assert!(!entry.add_value("member", "CN=a,O=org"));
        assert_eq!(entry.values("member").len(), 1);

        assert!(entry.remove_value("member", "cn=a,o=org"));
        assert!(!entry.remove_value("member", "cn=a,o=org"));
        assert!(!entry.has("member"));
    }

    #[test]
    fn test_delta_builder() {
        let delta = AttributeDelta::new()
            .add("member", "cn=a,o=org")
            .replace("title", "Analyst")
            .clear("description");

        assert_eq!(delta.changes.len(), 3);
        assert_eq!(delta.changes[2].kind, ChangeKind::Delete);
        assert!(delta.changes[2].values.is_empty());
        assert_eq!(
            delta.affected_attributes(),
            vec!["description", "member", "title"]
        );
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: Result<(), String> = Ok(());
        assert_eq!(Outcome::from_result(ok, "done"), Outcome::ok("done"));

        let err: Result<(), String> = Err("boom".to_string());
        let outcome = Outcome::from_result(err, "done");
        assert!(!outcome.success);
        assert_eq!(outcome.message, "boom");
        assert_eq!(outcome.to_string(), "failed: boom");
    }

    #[test]
    fn test_entry_serializes_as_plain_record() {
        let entry = DirectoryEntry::new("cn=a,o=org").with("cn", "a");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["dn"], "cn=a,o=org");
        assert_eq!(json["attributes"]["cn"][0], "a");
    }
}
