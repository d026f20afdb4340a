//! Deactivate command - Disable an account or bring it back

use clap::Args;

use super::Context;
use crate::error::{CliError, CliResult};
use crate::output::{print_json, print_success};

/// Arguments for the deactivate command
#[derive(Args, Debug)]
pub struct DeactivateArgs {
    /// DN of the account
    pub user_dn: String,

    /// Reactivate instead: move back to the active subtree and enable login
    #[arg(long)]
    pub reactivate: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the deactivate command
pub async fn execute(args: DeactivateArgs, context: &Context) -> CliResult<()> {
    let (registry, source) = context.connect().await?;
    let coordinator = registry.lifecycle(&source).await?;

    let outcome = if args.reactivate {
        coordinator.reactivate(&args.user_dn).await
    } else {
        coordinator.deactivate(&args.user_dn).await
    };

    if args.json {
        print_json(&outcome)?;
    }
    if !outcome.success {
        return Err(CliError::OperationFailed(outcome.message));
    }
    if !args.json {
        print_success(&outcome.message);
    }
    Ok(())
}
