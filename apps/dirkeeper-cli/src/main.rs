//! dirkeeper CLI - Operator tool for directory identity sources
//!
//! This CLI lets an operator:
//! - Propose a unique identifier for a new account
//! - Compute the initial password of an account
//! - Search users, groups, roles, services and templates
//! - Move a pending account into service with its groups
//! - Deactivate or reactivate an account

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod error;
mod logging;
mod output;

use commands::Context;
use error::CliResult;

/// dirkeeper CLI - Directory identity lifecycle
#[derive(Parser, Debug)]
#[command(name = "dirkeeper")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Sources file (JSON)
    #[arg(long, short, global = true, env = "DIRKEEPER_SOURCES")]
    config: Option<PathBuf>,

    /// Source to act on; optional when the file defines exactly one
    #[arg(long, short, global = true)]
    source: Option<String>,

    /// Log filter directive, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Propose a unique identifier from given name and surname
    GenerateId(commands::generate_id::GenerateIdArgs),

    /// Compute the initial password for an identifier
    DerivePassword(commands::derive_password::DerivePasswordArgs),

    /// Search entries of one kind
    Search(commands::search::SearchArgs),

    /// Move a pending account into service
    Provision(commands::provision::ProvisionArgs),

    /// Disable an account, or re-enable it with --reactivate
    Deactivate(commands::deactivate::DeactivateArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    logging::init_logging(&cli.log, cli.log_json)?;

    let context = Context {
        config_path: cli.config,
        source: cli.source,
    };

    match cli.command {
        Commands::GenerateId(args) => commands::generate_id::execute(args, &context).await,
        Commands::DerivePassword(args) => commands::derive_password::execute(args),
        Commands::Search(args) => commands::search::execute(args, &context).await,
        Commands::Provision(args) => commands::provision::execute(args, &context).await,
        Commands::Deactivate(args) => commands::deactivate::execute(args, &context).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use dirkeeper_directory::types::EntityKind;
    use dirkeeper_ldap::SearchField;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_provision() {
        let cli = Cli::try_parse_from([
            "dirkeeper",
            "--source",
            "north",
            "provision",
            "cn=JEADUP,ou=pending,ou=users,o=org",
            "--attr",
            "title=Analyst",
            "--group",
            "GroupA",
            "--group",
            "GroupB",
        ])
        .unwrap();

        assert_eq!(cli.source.as_deref(), Some("north"));
        let Commands::Provision(args) = cli.command else {
            panic!("expected provision");
        };
        assert_eq!(
            args.attributes,
            vec![("title".to_string(), "Analyst".to_string())]
        );
        assert_eq!(args.groups, vec!["GroupA", "GroupB"]);
        assert!(!args.no_password);
    }

    #[test]
    fn test_parse_search() {
        let cli =
            Cli::try_parse_from(["dirkeeper", "search", "role", "Audit", "--field", "name"])
                .unwrap();
        let Commands::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.kind, EntityKind::Role);
        assert_eq!(args.term, "Audit");
        assert_eq!(args.field, SearchField::Name);
    }

    #[test]
    fn test_rejects_malformed_attribute() {
        assert!(Cli::try_parse_from([
            "dirkeeper",
            "provision",
            "cn=x,o=org",
            "--attr",
            "title"
        ])
        .is_err());
    }
}
