//! Search command - Find users, groups, roles, services or templates

use clap::Args;
use dirkeeper_directory::operation::DirectoryEntry;
use dirkeeper_directory::types::EntityKind;
use dirkeeper_ldap::{GroupRecord, SearchField, SourceConfig, TemplateRecord, UserRecord};
use serde_json::Value;

use super::Context;
use crate::error::{CliError, CliResult};
use crate::output::{print_json, print_key_value};

/// Arguments for the search command
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Entity kind: user, group, role, ou or template
    pub kind: EntityKind,

    /// Search term; empty lists every entry of the kind
    #[arg(default_value = "")]
    pub term: String,

    /// Attribute family to match: identifier, name, email, department or any
    #[arg(long, default_value = "any")]
    pub field: SearchField,

    /// Treat the term as an exact identifier
    #[arg(long, conflicts_with = "field")]
    pub exact: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the search command
pub async fn execute(args: SearchArgs, context: &Context) -> CliResult<()> {
    let (registry, source) = context.connect().await?;
    let repository = registry.get_repository(args.kind, &source).await?;

    let entries = if args.exact {
        let identifier = args.term.trim();
        if identifier.is_empty() {
            return Err(CliError::Validation(
                "--exact needs a non-empty identifier".into(),
            ));
        }
        repository
            .find_by_identifier(identifier)
            .await
            .into_iter()
            .collect()
    } else {
        repository.search(&args.term, args.field).await
    };
    tracing::debug!(kind = %args.kind, count = entries.len(), "Search finished");

    let config = repository.config();
    let rendered = entries
        .iter()
        .map(|entry| render(args.kind, entry, config))
        .collect::<CliResult<Vec<_>>>()?;

    if args.json {
        print_json(&rendered)?;
        return Ok(());
    }

    if rendered.is_empty() {
        println!("No {} matched.", args.kind);
        return Ok(());
    }
    for (entry, value) in entries.iter().zip(&rendered) {
        println!("{}", entry.dn);
        if let Value::Object(fields) = value {
            for (name, field) in fields {
                if name == "dn" {
                    continue;
                }
                if let Some(text) = summary(field) {
                    print_key_value(name, &text);
                }
            }
        }
        println!();
    }
    Ok(())
}

/// Convert an entry into the typed record of its kind.
fn render(kind: EntityKind, entry: &DirectoryEntry, config: &SourceConfig) -> CliResult<Value> {
    let value = match kind {
        EntityKind::User => serde_json::to_value(UserRecord::from_entry(entry, config))?,
        EntityKind::Group | EntityKind::Role => {
            serde_json::to_value(GroupRecord::from_entry(entry, config))?
        }
        EntityKind::Template => serde_json::to_value(TemplateRecord::from_entry(entry, config))?,
        EntityKind::OrganizationalUnit => serde_json::to_value(entry)?,
    };
    Ok(value)
}

fn summary(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) if items.is_empty() => None,
        Value::Array(items) => Some(format!("{} value(s)", items.len())),
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.to_string()),
    }
}
