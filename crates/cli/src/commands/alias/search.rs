//! alias search

use clap::Args;

use aliasman_core::{Field, Filter, Result};

use super::columns;
use crate::commands::Context;
use crate::output::Formatter;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Regular expression matched case-insensitively against alias, domain,
    /// addresses and description
    #[arg(short, long, default_value = "")]
    pub search: String,

    /// Leave out suspended aliases
    #[arg(short = 'e', long)]
    pub exclude_suspended: bool,

    /// Leave out enabled aliases
    #[arg(short = 'E', long)]
    pub exclude_enabled: bool,

    /// Columns to show, comma separated (default: all)
    #[arg(short, long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
}

/// Filter for a search pattern; an empty pattern matches everything.
pub(crate) fn search_filter(pattern: &str, exclude_suspended: bool, exclude_enabled: bool) -> Result<Filter> {
    let filter = if pattern.is_empty() {
        Filter::new()
    } else {
        Filter::everywhere(&format!("(?i){pattern}"))?
    };
    Ok(filter
        .exclude_suspended(exclude_suspended)
        .exclude_enabled(exclude_enabled))
}

pub async fn run(args: SearchArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    let columns = columns(&args.columns, &Field::ALL)?;
    let filter = search_filter(&args.search, args.exclude_suspended, args.exclude_enabled)?;

    let mut storage = ctx.open_storage().await?;
    let aliases = storage.search(&filter, true).await?;
    storage.close().await?;

    formatter.aliases(&aliases, &columns);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{alias, files_storage};
    use super::*;
    use aliasman_core::Error;

    #[tokio::test]
    async fn test_search_case_insensitive_any_field() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = files_storage(&dir).await;
        let mut shop = alias("shop", "example.com", &["me@example.org"]);
        shop.description = "Online Store".into();
        storage.put(shop, true).await.unwrap();
        storage
            .put(alias("news", "example.net", &["store@example.org"]), true)
            .await
            .unwrap();
        storage
            .put(alias("bank", "example.com", &["me@example.org"]), true)
            .await
            .unwrap();

        let found = storage
            .search(&search_filter("STORE", false, false).unwrap(), true)
            .await
            .unwrap();
        let keys: Vec<_> = found.iter().map(|a| a.key()).collect();
        assert_eq!(keys, ["shop@example.com", "news@example.net"]);

        let all = storage
            .search(&search_filter("", false, false).unwrap(), true)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_search_excludes() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = files_storage(&dir).await;
        storage
            .put(alias("shop", "example.com", &["me@example.org"]), true)
            .await
            .unwrap();
        storage
            .put(alias("news", "example.com", &["me@example.org"]), true)
            .await
            .unwrap();
        storage.suspend("news", "example.com").await.unwrap();

        let enabled = storage
            .search(&search_filter("example", true, false).unwrap(), true)
            .await
            .unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].alias, "shop");

        let suspended = storage
            .search(&search_filter("example", false, true).unwrap(), true)
            .await
            .unwrap();
        assert_eq!(suspended.len(), 1);
        assert_eq!(suspended[0].alias, "news");
    }

    #[test]
    fn test_search_bad_regex() {
        assert!(matches!(
            search_filter("(unclosed", false, false),
            Err(Error::InvalidRegex(_))
        ));
    }
}
