//! Field descriptor table for [`Alias`]
//!
//! Column selection and data stripping address alias fields by name. Each
//! name maps to a [`Field`] that knows how to render and copy its value.

use std::fmt;
use std::str::FromStr;

use crate::alias::Alias;
use crate::error::{Error, Result};
use crate::timestamp::format_rfc3339;

/// One field of the alias record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Alias,
    Domain,
    EmailAddresses,
    Description,
    Suspended,
    CreatedTs,
    ModifiedTs,
    SuspendedTs,
}

impl Field {
    /// Every field, in record order
    pub const ALL: [Field; 8] = [
        Field::Alias,
        Field::Domain,
        Field::EmailAddresses,
        Field::Description,
        Field::Suspended,
        Field::CreatedTs,
        Field::ModifiedTs,
        Field::SuspendedTs,
    ];

    /// Canonical field name as accepted on the command line
    pub const fn name(self) -> &'static str {
        match self {
            Field::Alias => "Alias",
            Field::Domain => "Domain",
            Field::EmailAddresses => "EmailAddresses",
            Field::Description => "Description",
            Field::Suspended => "Suspended",
            Field::CreatedTs => "CreatedTS",
            Field::ModifiedTs => "ModifiedTS",
            Field::SuspendedTs => "SuspendedTS",
        }
    }

    /// Table column header
    pub const fn header(self) -> &'static str {
        match self {
            Field::EmailAddresses => "Email Address(es)",
            Field::CreatedTs => "Created Time",
            Field::ModifiedTs => "Modified Time",
            Field::SuspendedTs => "Suspended Time",
            other => other.name(),
        }
    }

    /// Render the field of `alias` for display.
    ///
    /// Booleans show as `Yes`/`No`, absent timestamps as an empty string.
    pub fn render(self, alias: &Alias) -> String {
        let ts = |ts: Option<jiff::Timestamp>| ts.map(format_rfc3339).unwrap_or_default();
        match self {
            Field::Alias => alias.alias.clone(),
            Field::Domain => alias.domain.clone(),
            Field::EmailAddresses => alias.email_addresses.join(", "),
            Field::Description => alias.description.clone(),
            Field::Suspended => String::from(if alias.suspended { "Yes" } else { "No" }),
            Field::CreatedTs => ts(alias.created_ts),
            Field::ModifiedTs => ts(alias.modified_ts),
            Field::SuspendedTs => ts(alias.suspended_ts),
        }
    }

    /// Copy this field's value from `src` into `dst`.
    pub fn copy(self, src: &Alias, dst: &mut Alias) {
        match self {
            Field::Alias => dst.alias.clone_from(&src.alias),
            Field::Domain => dst.domain.clone_from(&src.domain),
            Field::EmailAddresses => dst.email_addresses.clone_from(&src.email_addresses),
            Field::Description => dst.description.clone_from(&src.description),
            Field::Suspended => dst.suspended = src.suspended,
            Field::CreatedTs => dst.created_ts = src.created_ts,
            Field::ModifiedTs => dst.modified_ts = src.modified_ts,
            Field::SuspendedTs => dst.suspended_ts = src.suspended_ts,
        }
    }

    /// Parse a list of field names, failing on the first unknown one.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<Field>> {
        names.iter().map(|n| n.as_ref().parse()).collect()
    }
}

impl FromStr for Field {
    type Err = Error;

    /// Names match case-insensitively and ignore `_`, so `created_ts`,
    /// `CreatedTS` and `createdts` are the same field.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        Field::ALL
            .into_iter()
            .find(|f| f.name().to_lowercase() == normalized)
            .ok_or_else(|| Error::UnknownField(s.to_string()))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
