//! alias list

use clap::Args;

use aliasman_core::{Field, Filter, Result};

use super::columns;
use crate::commands::Context;
use crate::output::Formatter;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only aliases in this domain
    #[arg(short, long)]
    pub domain: Option<String>,

    /// Columns to show, comma separated (default: all)
    #[arg(short, long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
}

pub async fn run(args: ListArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    let columns = columns(&args.columns, &Field::ALL)?;
    let filter = Filter::for_domain(args.domain.as_deref().unwrap_or_default())?;

    let mut storage = ctx.open_storage().await?;
    let aliases = storage.search(&filter, false).await?;
    storage.close().await?;

    formatter.aliases(&aliases, &columns);
    Ok(())
}
