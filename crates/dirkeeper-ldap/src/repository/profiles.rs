//! Per-entity search and creation rules.
//!
//! A profile tells the shared [`Repository`](super::Repository) where an
//! entity kind lives, how to recognise its entries and which attributes a
//! free-text search looks at.

use dirkeeper_directory::operation::Filter;
use dirkeeper_directory::types::EntityKind;

use crate::config::SourceConfig;

/// Which attributes a free-text search matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchField {
    /// The naming attribute (identifier).
    Identifier,
    /// Given name, surname and full name.
    Name,
    /// Email address.
    Email,
    /// Department / organizational unit.
    Department,
    /// Every searchable attribute of the entity.
    #[default]
    Any,
}

impl std::str::FromStr for SearchField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "id" | "identifier" | "cn" => Ok(SearchField::Identifier),
            "name" => Ok(SearchField::Name),
            "email" | "mail" => Ok(SearchField::Email),
            "department" | "ou" => Ok(SearchField::Department),
            "any" | "all" => Ok(SearchField::Any),
            other => Err(format!("unknown search field: {other}")),
        }
    }
}

/// Entity-specific rules plugged into the shared repository.
pub trait EntityProfile: Send + Sync {
    /// The entity kind this profile describes.
    fn kind(&self) -> EntityKind;

    /// Bases searched, in order, by identifier lookups and searches.
    fn search_bases(&self, config: &SourceConfig) -> Vec<String>;

    /// Filter selecting entries of this kind.
    fn object_filter(&self, config: &SourceConfig) -> Filter;

    /// Attributes a free-text search matches for the given field.
    fn search_attributes(&self, config: &SourceConfig, field: SearchField) -> Vec<String>;

    /// Container new entries are created in.
    fn creation_parent(&self, config: &SourceConfig) -> String;

    /// Object classes given to new entries.
    fn object_classes(&self, config: &SourceConfig) -> Vec<String>;

    /// Attribute forming the RDN of new entries.
    fn naming_attribute(&self, config: &SourceConfig) -> String {
        config.schema.naming.clone()
    }
}

/// Build the profile for an entity kind.
pub fn profile_for(kind: EntityKind) -> Box<dyn EntityProfile> {
    match kind {
        EntityKind::User => Box::new(UserProfile),
        EntityKind::Group => Box::new(GroupProfile),
        EntityKind::Role => Box::new(RoleProfile),
        EntityKind::OrganizationalUnit => Box::new(OrgUnitProfile),
        EntityKind::Template => Box::new(TemplateProfile),
    }
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_string()).collect()
}

fn first_or_base(bases: Vec<String>, config: &SourceConfig) -> String {
    bases
        .into_iter()
        .next()
        .unwrap_or_else(|| config.base_dn.clone())
}

/// Person accounts, split across the active and inactive subtrees.
#[derive(Debug, Clone, Copy)]
pub struct UserProfile;

impl EntityProfile for UserProfile {
    fn kind(&self) -> EntityKind {
        EntityKind::User
    }

    fn search_bases(&self, config: &SourceConfig) -> Vec<String> {
        config.user_search_bases()
    }

    fn object_filter(&self, config: &SourceConfig) -> Filter {
        let class = config
            .schema
            .user_object_classes
            .last()
            .map(String::as_str)
            .unwrap_or("person");
        Filter::eq("objectClass", class)
    }

    fn search_attributes(&self, config: &SourceConfig, field: SearchField) -> Vec<String> {
        let naming = config.schema.naming.as_str();
        match field {
            SearchField::Identifier => strings(&[naming]),
            SearchField::Name => strings(&["givenName", "sn", "fullName"]),
            SearchField::Email => strings(&["mail"]),
            SearchField::Department => strings(&["ou"]),
            SearchField::Any => strings(&[naming, "givenName", "sn", "fullName", "mail"]),
        }
    }

    fn creation_parent(&self, config: &SourceConfig) -> String {
        config.creation_dn.clone()
    }

    fn object_classes(&self, config: &SourceConfig) -> Vec<String> {
        config.schema.user_object_classes.clone()
    }
}

/// Plain groups under the configured group containers.
#[derive(Debug, Clone, Copy)]
pub struct GroupProfile;

impl EntityProfile for GroupProfile {
    fn kind(&self) -> EntityKind {
        EntityKind::Group
    }

    fn search_bases(&self, config: &SourceConfig) -> Vec<String> {
        config.group_search_bases()
    }

    fn object_filter(&self, config: &SourceConfig) -> Filter {
        Filter::eq("objectClass", config.schema.group_object_class.as_str())
    }

    fn search_attributes(&self, config: &SourceConfig, field: SearchField) -> Vec<String> {
        match field {
            SearchField::Identifier => vec![config.schema.naming.clone()],
            _ => vec![config.schema.naming.clone(), "description".to_string()],
        }
    }

    fn creation_parent(&self, config: &SourceConfig) -> String {
        first_or_base(config.group_search_bases(), config)
    }

    fn object_classes(&self, config: &SourceConfig) -> Vec<String> {
        vec!["top".to_string(), config.schema.group_object_class.clone()]
    }
}

/// Role-typed groups, found under one or more role roots.
#[derive(Debug, Clone, Copy)]
pub struct RoleProfile;

impl EntityProfile for RoleProfile {
    fn kind(&self) -> EntityKind {
        EntityKind::Role
    }

    fn search_bases(&self, config: &SourceConfig) -> Vec<String> {
        config.role_search_bases()
    }

    fn object_filter(&self, config: &SourceConfig) -> Filter {
        Filter::eq("objectClass", config.schema.role_object_class.as_str())
    }

    fn search_attributes(&self, config: &SourceConfig, field: SearchField) -> Vec<String> {
        match field {
            SearchField::Identifier => vec![config.schema.naming.clone()],
            _ => vec![config.schema.naming.clone(), "description".to_string()],
        }
    }

    fn creation_parent(&self, config: &SourceConfig) -> String {
        first_or_base(config.role_search_bases(), config)
    }

    fn object_classes(&self, config: &SourceConfig) -> Vec<String> {
        vec![
            "top".to_string(),
            config.schema.group_object_class.clone(),
            config.schema.role_object_class.clone(),
        ]
    }
}

/// Organizational units (services) anywhere below the source root.
#[derive(Debug, Clone, Copy)]
pub struct OrgUnitProfile;

impl EntityProfile for OrgUnitProfile {
    fn kind(&self) -> EntityKind {
        EntityKind::OrganizationalUnit
    }

    fn search_bases(&self, config: &SourceConfig) -> Vec<String> {
        vec![config.base_dn.clone()]
    }

    fn object_filter(&self, _config: &SourceConfig) -> Filter {
        Filter::eq("objectClass", "organizationalUnit")
    }

    fn search_attributes(&self, _config: &SourceConfig, field: SearchField) -> Vec<String> {
        match field {
            SearchField::Identifier | SearchField::Department => strings(&["ou"]),
            _ => strings(&["ou", "description"]),
        }
    }

    fn creation_parent(&self, config: &SourceConfig) -> String {
        config.base_dn.clone()
    }

    fn object_classes(&self, _config: &SourceConfig) -> Vec<String> {
        strings(&["top", "organizationalUnit"])
    }

    fn naming_attribute(&self, _config: &SourceConfig) -> String {
        "ou".to_string()
    }
}

/// User templates under the template root.
#[derive(Debug, Clone, Copy)]
pub struct TemplateProfile;

/// Attribute holding the user type a template applies to.
pub const TEMPLATE_USER_TYPE_ATTRIBUTE: &str = "employeeType";

impl EntityProfile for TemplateProfile {
    fn kind(&self) -> EntityKind {
        EntityKind::Template
    }

    fn search_bases(&self, config: &SourceConfig) -> Vec<String> {
        vec![config.template_dn.clone()]
    }

    fn object_filter(&self, config: &SourceConfig) -> Filter {
        Filter::present(config.schema.naming.as_str())
    }

    fn search_attributes(&self, config: &SourceConfig, field: SearchField) -> Vec<String> {
        match field {
            SearchField::Identifier => vec![config.schema.naming.clone()],
            _ => vec![
                config.schema.naming.clone(),
                TEMPLATE_USER_TYPE_ATTRIBUTE.to_string(),
                "description".to_string(),
            ],
        }
    }

    fn creation_parent(&self, config: &SourceConfig) -> String {
        config.template_dn.clone()
    }

    fn object_classes(&self, _config: &SourceConfig) -> Vec<String> {
        strings(&["top", "inetOrgPerson"])
    }
}
