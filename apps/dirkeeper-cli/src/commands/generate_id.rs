//! Generate-id command - Propose a unique identifier for a new account

use clap::Args;
use dirkeeper_ldap::{derive_password, needs_short_variant};
use serde::Serialize;

use super::Context;
use crate::error::CliResult;
use crate::output::{print_json, print_key_value};

/// Arguments for the generate-id command
#[derive(Args, Debug)]
pub struct GenerateIdArgs {
    /// Given name
    pub given_name: String,

    /// Surname (particles such as "de la" are skipped)
    pub surname: String,

    /// Also print the initial password for the identifier
    #[arg(long)]
    pub with_password: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct GeneratedId {
    source: String,
    identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

/// Execute the generate-id command
pub async fn execute(args: GenerateIdArgs, context: &Context) -> CliResult<()> {
    let (registry, source) = context.connect().await?;
    let generator = registry.identifiers(&source).await?;
    let identifier = generator.generate(&args.given_name, &args.surname).await?;

    let password = args.with_password.then(|| {
        derive_password(
            &identifier,
            needs_short_variant(&args.given_name, &args.surname),
        )
    });

    let output = GeneratedId {
        source,
        identifier,
        password,
    };
    if args.json {
        print_json(&output)?;
    } else {
        print_key_value("Source", &output.source);
        print_key_value("Identifier", &output.identifier);
        if let Some(password) = &output.password {
            print_key_value("Password", password);
        }
    }
    Ok(())
}
