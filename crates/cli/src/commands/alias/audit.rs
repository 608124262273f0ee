//! alias audit

use clap::Args;
use serde_json::json;

use aliasman_core::sync::{AUDIT_FIELDS, audit};
use aliasman_core::{AuditReport, EmailProvider, Filter, Result, StorageProvider};

use super::columns;
use crate::commands::Context;
use crate::output::{Formatter, alias_json};

#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Domain; defaults to the configured domain
    #[arg(short, long)]
    pub domain: Option<String>,

    /// Only mail system aliases delivering to one of these addresses
    #[arg(short = 'e', long = "email-address", value_delimiter = ',')]
    pub email_addresses: Vec<String>,

    /// Columns to show, comma separated
    #[arg(short, long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Leave suspended aliases out of the stored side
    #[arg(short = 'S', long)]
    pub exclude_suspended: bool,
}

pub async fn run(args: AuditArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    let columns = columns(&args.columns, &AUDIT_FIELDS)?;
    let domain = ctx.domain(args.domain)?;

    let email = ctx.email().await?;
    let mut storage = ctx.open_storage().await?;
    let report = audit_domain(
        storage.as_ref(),
        email.as_ref(),
        &domain,
        &args.email_addresses,
        args.exclude_suspended,
    )
    .await?;
    storage.close().await?;

    if formatter.is_json() {
        formatter.json(&json!({
            "storage": storage.type_name(),
            "email": email.type_name(),
            "storage_only": alias_json(&report.storage_only, &columns),
            "email_only": alias_json(&report.email_only, &columns),
        }));
        return Ok(());
    }

    formatter.heading(&format!(
        "Aliases in {} but not in {}:",
        storage.type_name(),
        email.type_name()
    ));
    formatter.aliases(&report.storage_only, &columns);
    formatter.println("");
    formatter.heading(&format!(
        "Aliases in {} but not in {}:",
        email.type_name(),
        storage.type_name()
    ));
    formatter.aliases(&report.email_only, &columns);
    Ok(())
}

/// Compare one domain of storage against the mail system.
pub(crate) async fn audit_domain(
    storage: &dyn StorageProvider,
    email: &dyn EmailProvider,
    domain: &str,
    address_filter: &[String],
    exclude_suspended: bool,
) -> Result<AuditReport> {
    let mailed = email.alias_list(domain, address_filter).await?;
    let filter = Filter::for_domain(domain)?.exclude_suspended(exclude_suspended);
    let stored = storage.search(&filter, false).await?;
    audit(&stored, &mailed)
}
