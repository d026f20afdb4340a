//! Subcommand implementations

pub mod deactivate;
pub mod derive_password;
pub mod generate_id;
pub mod provision;
pub mod search;

use std::path::PathBuf;

use dirkeeper_ldap::{SourceRegistry, SourcesFile};

use crate::error::{CliError, CliResult};

/// Settings shared by every command that talks to a directory.
#[derive(Debug, Clone)]
pub struct Context {
    pub config_path: Option<PathBuf>,
    pub source: Option<String>,
}

impl Context {
    /// Load the sources file and register every source in it.
    ///
    /// Returns the registry and the name of the source to act on.
    pub async fn connect(&self) -> CliResult<(SourceRegistry, String)> {
        let path = self.config_path.as_ref().ok_or(CliError::NoSourcesFile)?;
        let file = SourcesFile::load(path)?;
        let source = self.select_source(&file)?;
        let registry = SourceRegistry::from_file(&file).await?;
        tracing::debug!(
            path = %path.display(),
            sources = file.sources.len(),
            source = %source,
            "Sources loaded"
        );
        Ok((registry, source))
    }

    fn select_source(&self, file: &SourcesFile) -> CliResult<String> {
        match &self.source {
            Some(name) if file.sources.contains_key(name) => Ok(name.clone()),
            Some(name) => Err(CliError::Config(format!(
                "source '{name}' is not defined in the sources file"
            ))),
            None => {
                let mut names = file.sources.keys();
                match (names.next(), names.next()) {
                    (Some(only), None) => Ok(only.clone()),
                    _ => Err(CliError::AmbiguousSource(
                        file.sources.keys().cloned().collect::<Vec<_>>().join(", "),
                    )),
                }
            }
        }
    }
}

/// Parse `name=value` pairs given on the command line.
pub fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing attribute name in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirkeeper_ldap::SourceConfig;

    fn file_with(names: &[&str]) -> SourcesFile {
        let mut file = SourcesFile::default();
        for name in names {
            file.sources.insert(
                (*name).to_string(),
                SourceConfig::new("ldap.invalid", "o=org", "cn=admin,o=org"),
            );
        }
        file
    }

    fn context(source: Option<&str>) -> Context {
        Context {
            config_path: None,
            source: source.map(str::to_string),
        }
    }

    #[test]
    fn test_single_source_is_implicit() {
        let file = file_with(&["north"]);
        assert_eq!(context(None).select_source(&file).unwrap(), "north");
    }

    #[test]
    fn test_several_sources_need_a_choice() {
        let file = file_with(&["north", "south"]);
        assert!(matches!(
            context(None).select_source(&file),
            Err(CliError::AmbiguousSource(_))
        ));
        assert_eq!(context(Some("south")).select_source(&file).unwrap(), "south");
        assert!(matches!(
            context(Some("east")).select_source(&file),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("title=Senior Analyst").unwrap(),
            ("title".to_string(), "Senior Analyst".to_string())
        );
        assert_eq!(
            parse_assignment("mail=").unwrap(),
            ("mail".to_string(), String::new())
        );
        assert!(parse_assignment("title").is_err());
        assert!(parse_assignment("=x").is_err());
    }

    #[tokio::test]
    async fn test_connect_without_file() {
        assert!(matches!(
            context(None).connect().await,
            Err(CliError::NoSourcesFile)
        ));
    }
}
