//! Alias subcommands
//!
//! Mutating commands touch the mail system first and storage second, so a
//! failed mail call never leaves a stored record behind.

use clap::{Args, Subcommand};
use serde::Serialize;

use aliasman_core::{Error, Field, Result};

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

mod audit;
mod create;
mod delete;
mod list;
mod list_mail;
mod search;
mod suspend;
#[cfg(test)]
mod testing;
mod update_description;

#[derive(Subcommand, Debug)]
pub enum AliasCommands {
    /// Create an alias in the mail system and record it
    Create(create::CreateArgs),

    /// Delete an alias from the mail system and storage
    Delete(TargetArgs),

    /// Remove an alias from the mail system but keep its record
    Suspend(TargetArgs),

    /// Recreate a suspended alias from its record
    Unsuspend(TargetArgs),

    /// Change the description of a stored alias
    UpdateDescription(update_description::UpdateDescriptionArgs),

    /// List stored aliases
    List(list::ListArgs),

    /// List the aliases the mail system holds
    ListMail(list_mail::ListMailArgs),

    /// Search stored aliases with a regular expression
    Search(search::SearchArgs),

    /// Compare storage against the mail system
    Audit(audit::AuditArgs),
}

/// One alias, addressed by name and domain
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Alias name (the part before '@')
    #[arg(short, long)]
    pub alias: Option<String>,

    /// Domain; defaults to the configured domain
    #[arg(short, long)]
    pub domain: Option<String>,
}

impl TargetArgs {
    /// Alias name and domain, falling back to the configured domain
    fn resolve(self, ctx: &Context) -> Result<(String, String)> {
        let domain = ctx.domain(self.domain)?;
        let alias = self
            .alias
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Error::Validation("alias needed".into()))?;
        Ok((alias, domain))
    }
}

/// JSON output for mutating commands
#[derive(Debug, Serialize)]
struct OperationOutput {
    success: bool,
    alias: String,
    message: String,
}

fn report_done(formatter: &Formatter, key: String, message: String) {
    if formatter.is_json() {
        formatter.json(&OperationOutput {
            success: true,
            alias: key,
            message,
        });
    } else {
        formatter.success(&message);
    }
}

/// Parse a `-c` column list, or fall back to `default`.
fn columns(names: &[String], default: &[Field]) -> Result<Vec<Field>> {
    if names.is_empty() {
        return Ok(default.to_vec());
    }
    Field::parse_list(names)
}

/// Execute an alias subcommand
pub async fn execute(cmd: AliasCommands, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let (command, result) = match cmd {
        AliasCommands::Create(args) => ("alias create", create::run(args, ctx, &formatter).await),
        AliasCommands::Delete(args) => ("alias delete", delete::run(args, ctx, &formatter).await),
        AliasCommands::Suspend(args) => {
            ("alias suspend", suspend::run_suspend(args, ctx, &formatter).await)
        }
        AliasCommands::Unsuspend(args) => (
            "alias unsuspend",
            suspend::run_unsuspend(args, ctx, &formatter).await,
        ),
        AliasCommands::UpdateDescription(args) => (
            "alias update-description",
            update_description::run(args, ctx, &formatter).await,
        ),
        AliasCommands::List(args) => ("alias list", list::run(args, ctx, &formatter).await),
        AliasCommands::ListMail(args) => {
            ("alias list-mail", list_mail::run(args, ctx, &formatter).await)
        }
        AliasCommands::Search(args) => ("alias search", search::run(args, ctx, &formatter).await),
        AliasCommands::Audit(args) => ("alias audit", audit::run(args, ctx, &formatter).await),
    };

    match result {
        Ok(()) => ExitCode::Success,
        Err(e) => super::fail(&formatter, &e, command),
    }
}
