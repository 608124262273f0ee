//! alias suspend / unsuspend
//!
//! Suspending takes the alias out of the mail system but keeps the record,
//! so unsuspending can recreate it with the same addresses.

use aliasman_core::{EmailProvider, Error, Result, StorageProvider, alias::key};

use super::{TargetArgs, report_done};
use crate::commands::Context;
use crate::output::Formatter;

pub async fn run_suspend(args: TargetArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    let (alias, domain) = args.resolve(ctx)?;
    ctx.require_writable()?;

    let email = ctx.email().await?;
    let mut storage = ctx.open_storage().await?;

    let message = suspend(storage.as_mut(), email.as_ref(), &alias, &domain).await?;
    report_done(formatter, key(&alias, &domain), message);
    storage.close().await
}

pub async fn run_unsuspend(args: TargetArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    let (alias, domain) = args.resolve(ctx)?;
    ctx.require_writable()?;

    let email = ctx.email().await?;
    let mut storage = ctx.open_storage().await?;

    let message = unsuspend(storage.as_mut(), email.as_ref(), &alias, &domain).await?;
    report_done(formatter, key(&alias, &domain), message);
    storage.close().await
}

pub(crate) async fn suspend(
    storage: &mut dyn StorageProvider,
    email: &dyn EmailProvider,
    alias: &str,
    domain: &str,
) -> Result<String> {
    email.alias_delete(alias, domain).await?;
    storage.suspend(alias, domain).await?;
    Ok(format!("Suspended alias {}", key(alias, domain)))
}

pub(crate) async fn unsuspend(
    storage: &mut dyn StorageProvider,
    email: &dyn EmailProvider,
    alias: &str,
    domain: &str,
) -> Result<String> {
    let stored = storage.get(alias, domain).await?.ok_or_else(|| {
        Error::NotFound(format!("alias {alias} for domain {domain} doesn't exist"))
    })?;

    email
        .alias_create(alias, domain, &stored.email_addresses)
        .await?;
    storage.unsuspend(alias, domain).await?;
    Ok(format!("Unsuspended alias {}", key(alias, domain)))
}
