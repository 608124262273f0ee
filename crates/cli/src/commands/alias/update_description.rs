//! alias update-description

use clap::Args;

use aliasman_core::{Error, Result, StorageProvider, alias::key};

use super::{TargetArgs, report_done};
use crate::commands::Context;
use crate::output::Formatter;

#[derive(Args, Debug)]
pub struct UpdateDescriptionArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// New description; empty clears it
    #[arg(short = 'D', long, default_value = "")]
    pub description: String,
}

pub async fn run(args: UpdateDescriptionArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    let (alias, domain) = args.target.resolve(ctx)?;
    ctx.require_writable()?;

    let mut storage = ctx.open_storage().await?;
    let message = update_description(storage.as_mut(), &alias, &domain, args.description).await?;
    report_done(formatter, key(&alias, &domain), message);
    storage.close().await
}

/// Storage-only change; the mail system has no descriptions.
pub(crate) async fn update_description(
    storage: &mut dyn StorageProvider,
    alias: &str,
    domain: &str,
    description: String,
) -> Result<String> {
    let mut record = storage.get(alias, domain).await?.ok_or_else(|| {
        Error::NotFound(format!("alias {alias} for domain {domain} doesn't exist"))
    })?;
    record.description = description;
    storage.update(record, true).await?;
    Ok(format!("Updated description of alias {}", key(alias, domain)))
}
