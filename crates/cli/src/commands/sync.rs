//! sync command
//!
//! One-way copy between two storage providers. Aliases only present on the
//! destination are left alone.

use clap::Args;
use serde::Serialize;
use tracing::info;

use aliasman_core::{Confirm, Filter, Result, StorageProvider, SyncMode, SyncPlan, SyncReport};

use super::{Context, fail, prompt};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Storage provider to copy from
    #[arg(short, long)]
    pub source: String,

    /// Storage provider to copy to
    #[arg(short, long)]
    pub destination: String,

    /// Apply every change without asking
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct SyncOutput {
    pub source: String,
    pub destination: String,
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl SyncOutput {
    pub fn new(source: &str, destination: &str, report: SyncReport) -> Self {
        Self {
            source: source.to_string(),
            destination: destination.to_string(),
            added: report.added,
            updated: report.updated,
            skipped: report.skipped,
        }
    }
}

impl std::fmt::Display for SyncOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Synced {} to {}: {} added, {} updated, {} skipped",
            self.source, self.destination, self.added, self.updated, self.skipped
        )
    }
}

pub async fn execute(args: SyncArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    match run(args, ctx, &formatter).await {
        Ok(()) => ExitCode::Success,
        Err(e) => fail(&formatter, &e, "sync"),
    }
}

async fn run(args: SyncArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    ctx.require_writable()?;
    let mut source = ctx.open_storage_named(&args.source, true).await?;
    let mut destination = ctx.open_storage_named(&args.destination, false).await?;

    let mut confirm = prompt::confirmer(args.yes);
    let report = sync(source.as_ref(), destination.as_mut(), confirm.as_mut()).await?;

    source.close().await?;
    destination.close().await?;

    formatter.output(&SyncOutput::new(&args.source, &args.destination, report));
    Ok(())
}

/// Copy missing and differing aliases from `source` to `destination`,
/// keeping the source timestamps.
pub(crate) async fn sync(
    source: &dyn StorageProvider,
    destination: &mut dyn StorageProvider,
    confirm: &mut dyn Confirm,
) -> Result<SyncReport> {
    let everything = Filter::new();
    let from = source.search(&everything, false).await?;
    let to = destination.search(&everything, false).await?;

    let plan = SyncPlan::compute(&from, &to, SyncMode::AddAndUpdate)?;
    info!(
        source = source.type_name(),
        destination = destination.type_name(),
        actions = plan.len(),
        "sync planned"
    );
    plan.apply(destination, confirm, false).await
}
