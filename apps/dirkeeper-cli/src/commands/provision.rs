//! Provision command - Move a pending account into service

use std::collections::BTreeMap;

use clap::Args;
use dirkeeper_ldap::ProvisioningRequest;

use super::{parse_assignment, Context};
use crate::error::{CliError, CliResult};
use crate::output::{print_failure, print_json, print_key_value, print_success};

/// Arguments for the provision command
#[derive(Args, Debug)]
pub struct ProvisionArgs {
    /// DN of the pending entry
    pub pending_dn: String,

    /// Container to move the account into (defaults to the active users subtree)
    #[arg(long)]
    pub container: Option<String>,

    /// Attribute to set after the move, as name=value (repeatable)
    #[arg(long = "attr", value_parser = parse_assignment)]
    pub attributes: Vec<(String, String)>,

    /// Group to attach, by name (repeatable)
    #[arg(long = "group")]
    pub groups: Vec<String>,

    /// Do not derive and set the initial password
    #[arg(long)]
    pub no_password: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the provision command
pub async fn execute(args: ProvisionArgs, context: &Context) -> CliResult<()> {
    let (registry, source) = context.connect().await?;
    let coordinator = registry.lifecycle(&source).await?;

    let target_container = match args.container {
        Some(container) => container,
        None => registry.config(&source).await?.active_users_dn.clone(),
    };
    let request = ProvisioningRequest {
        pending_dn: args.pending_dn,
        target_container,
        attributes: args.attributes.into_iter().collect::<BTreeMap<_, _>>(),
        group_names: args.groups,
        set_password: !args.no_password,
    };

    let outcome = coordinator.complete_provisioning(&request).await;

    if args.json {
        print_json(&outcome)?;
    } else {
        if outcome.ok {
            print_success(&outcome.message);
        } else {
            print_failure(&outcome.message);
        }
        if let Some(moved_dn) = &outcome.moved_dn {
            print_key_value("DN", moved_dn);
        }
        print_key_value("Groups added", &outcome.groups_added.to_string());
        if outcome.groups_failed > 0 {
            print_key_value("Groups failed", &outcome.groups_failed.to_string());
        }
    }

    if outcome.ok {
        Ok(())
    } else {
        Err(CliError::OperationFailed(outcome.message))
    }
}
