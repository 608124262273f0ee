//! Alias filter criteria

use regex::Regex;

use crate::alias::Alias;
use crate::error::Result;

/// Predicate configuration for selecting aliases.
///
/// Unset patterns are vacuously satisfied, so `Filter::default()` matches
/// every alias. The exclusion flags always apply, whatever the match mode.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub alias: Option<Regex>,
    pub domain: Option<Regex>,
    /// Matches if any one of the alias's addresses matches
    pub email_address: Option<Regex>,
    pub description: Option<Regex>,
    pub exclude_suspended: bool,
    pub exclude_enabled: bool,
}

impl Filter {
    /// Filter that matches everything
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alias(mut self, pattern: &str) -> Result<Self> {
        self.alias = Some(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn with_domain(mut self, pattern: &str) -> Result<Self> {
        self.domain = Some(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn with_email_address(mut self, pattern: &str) -> Result<Self> {
        self.email_address = Some(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn with_description(mut self, pattern: &str) -> Result<Self> {
        self.description = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Same pattern against alias, domain, addresses and description.
    ///
    /// Meant to be evaluated with `match_any`.
    pub fn everywhere(pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern)?;
        Ok(Self {
            alias: Some(re.clone()),
            domain: Some(re.clone()),
            email_address: Some(re.clone()),
            description: Some(re),
            ..Self::default()
        })
    }

    /// Filter restricted to one exact domain; an empty domain matches all.
    pub fn for_domain(domain: &str) -> Result<Self> {
        if domain.is_empty() {
            return Ok(Self::default());
        }
        Self::default().with_domain(&format!("^{}$", regex::escape(domain)))
    }

    pub fn exclude_suspended(mut self, yes: bool) -> Self {
        self.exclude_suspended = yes;
        self
    }

    pub fn exclude_enabled(mut self, yes: bool) -> Self {
        self.exclude_enabled = yes;
        self
    }

    /// Evaluate the filter against one alias.
    ///
    /// With `match_any` the alias passes when at least one pattern matches;
    /// otherwise all of them must.
    pub fn matches(&self, alias: &Alias, match_any: bool) -> bool {
        let found_alias = self.alias.as_ref().is_none_or(|re| re.is_match(&alias.alias));
        let found_domain = self.domain.as_ref().is_none_or(|re| re.is_match(&alias.domain));
        let found_address = self
            .email_address
            .as_ref()
            .is_none_or(|re| alias.email_addresses.iter().any(|a| re.is_match(a)));
        let found_description = self
            .description
            .as_ref()
            .is_none_or(|re| re.is_match(&alias.description));

        let include_suspended = !(self.exclude_suspended && alias.suspended);
        let include_enabled = !(self.exclude_enabled && !alias.suspended);

        let found = if match_any {
            found_alias || found_domain || found_address || found_description
        } else {
            found_alias && found_domain && found_address && found_description
        };

        found && include_suspended && include_enabled
    }
}
