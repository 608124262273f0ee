//! alias delete

use aliasman_core::{EmailProvider, Result, StorageProvider, alias::key};

use super::{TargetArgs, report_done};
use crate::commands::Context;
use crate::output::Formatter;

pub async fn run(args: TargetArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    let (alias, domain) = args.resolve(ctx)?;
    ctx.require_writable()?;

    let email = ctx.email().await?;
    let mut storage = ctx.open_storage().await?;

    let message = delete(storage.as_mut(), email.as_ref(), &alias, &domain).await?;
    report_done(formatter, key(&alias, &domain), message);
    storage.close().await
}

/// Remove the alias from the mail system, then drop its record.
pub(crate) async fn delete(
    storage: &mut dyn StorageProvider,
    email: &dyn EmailProvider,
    alias: &str,
    domain: &str,
) -> Result<String> {
    email.alias_delete(alias, domain).await?;
    storage.delete(alias, domain).await?;
    Ok(format!("Deleted alias {}", key(alias, domain)))
}
