//! sync-from-email command
//!
//! Records aliases that exist in the mail system but have no stored record.
//! Existing records are never changed.

use clap::Args;
use tracing::info;

use aliasman_core::{
    Confirm, EmailProvider, Filter, Result, StorageProvider, SyncMode, SyncPlan, SyncReport,
};

use super::sync::SyncOutput;
use super::{Context, fail, prompt};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

#[derive(Args, Debug)]
pub struct SyncFromEmailArgs {
    /// Domain; defaults to the configured domain
    #[arg(short, long)]
    pub domain: Option<String>,

    /// Only aliases delivering to one of these addresses
    #[arg(short = 'e', long = "email-address", value_delimiter = ',')]
    pub email_addresses: Vec<String>,

    /// Record every alias without asking
    #[arg(short = 'y', long)]
    pub yes: bool,
}

pub async fn execute(args: SyncFromEmailArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    match run(args, ctx, &formatter).await {
        Ok(()) => ExitCode::Success,
        Err(e) => fail(&formatter, &e, "sync-from-email"),
    }
}

async fn run(args: SyncFromEmailArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    let domain = ctx.domain(args.domain)?;
    ctx.require_writable()?;

    let email = ctx.email().await?;
    let mut storage = ctx.open_storage().await?;

    let mut confirm = prompt::confirmer(args.yes);
    let report = sync_from_email(
        email.as_ref(),
        storage.as_mut(),
        &domain,
        &args.email_addresses,
        confirm.as_mut(),
    )
    .await?;
    storage.close().await?;

    formatter.output(&SyncOutput::new(
        email.type_name(),
        storage.type_name(),
        report,
    ));
    Ok(())
}

pub(crate) async fn sync_from_email(
    email: &dyn EmailProvider,
    storage: &mut dyn StorageProvider,
    domain: &str,
    address_filter: &[String],
    confirm: &mut dyn Confirm,
) -> Result<SyncReport> {
    let mailed = email.alias_list(domain, address_filter).await?;
    let stored = storage.search(&Filter::for_domain(domain)?, false).await?;

    let plan = SyncPlan::compute(&mailed, &stored, SyncMode::AddOnly)?;
    info!(
        email = email.type_name(),
        storage = storage.type_name(),
        domain,
        actions = plan.len(),
        "sync from email planned"
    );
    plan.apply(storage, confirm, true).await
}
