//! Derive-password command - Compute the initial password for an identifier

use clap::Args;
use dirkeeper_ldap::credential::is_short_name;
use dirkeeper_ldap::derive_password;
use serde::Serialize;

use crate::error::{CliError, CliResult};
use crate::output::{print_json, print_key_value};

/// Arguments for the derive-password command
#[derive(Args, Debug)]
pub struct DerivePasswordArgs {
    /// Account identifier
    pub identifier: String,

    /// Given name, used to pick the short-name variant
    #[arg(long)]
    pub given_name: Option<String>,

    /// Surname, used to pick the short-name variant
    #[arg(long)]
    pub surname: Option<String>,

    /// Force the short-name variant
    #[arg(long)]
    pub short: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct DerivedPassword<'a> {
    identifier: &'a str,
    short_variant: bool,
    password: String,
}

/// Execute the derive-password command
pub fn execute(args: DerivePasswordArgs) -> CliResult<()> {
    let identifier = args.identifier.trim();
    if identifier.is_empty() {
        return Err(CliError::Validation("identifier must not be empty".into()));
    }

    // Only names actually supplied take part in the short-name rule.
    let short_variant = args.short
        || [args.given_name.as_deref(), args.surname.as_deref()]
            .into_iter()
            .flatten()
            .any(is_short_name);

    let output = DerivedPassword {
        identifier,
        short_variant,
        password: derive_password(identifier, short_variant),
    };

    if args.json {
        print_json(&output)?;
    } else {
        print_key_value("Identifier", output.identifier);
        print_key_value("Password", &output.password);
    }
    Ok(())
}
