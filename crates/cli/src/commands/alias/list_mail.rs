//! alias list-mail

use clap::Args;

use aliasman_core::{Field, Result};

use super::columns;
use crate::commands::Context;
use crate::output::Formatter;

const DEFAULT_COLUMNS: [Field; 3] = [Field::Alias, Field::Domain, Field::EmailAddresses];

#[derive(Args, Debug)]
pub struct ListMailArgs {
    /// Domain; defaults to the configured domain
    #[arg(short, long)]
    pub domain: Option<String>,

    /// Only aliases delivering to one of these addresses
    #[arg(short = 'e', long = "email-address", value_delimiter = ',')]
    pub email_addresses: Vec<String>,

    /// Columns to show, comma separated
    #[arg(short, long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
}

pub async fn run(args: ListMailArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    let columns = columns(&args.columns, &DEFAULT_COLUMNS)?;
    let domain = ctx.domain(args.domain)?;

    let email = ctx.email().await?;
    let aliases = email.alias_list(&domain, &args.email_addresses).await?;

    formatter.aliases(&aliases, &columns);
    Ok(())
}
