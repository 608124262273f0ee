//! Alias record model
//!
//! An [`Alias`] is one managed address `alias@domain` forwarding to one or
//! more destination addresses. [`Aliases`] is an ordered collection of them
//! and [`AliasesMap`] the keyed, append-only form used by providers.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::ops::Deref;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use similar::TextDiff;

use crate::error::{Error, Result};
use crate::field::Field;
use crate::filter::Filter;

/// One managed email alias
///
/// Equality compares every field, timestamps to the nanosecond and
/// addresses in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alias {
    /// Local part of the address
    pub alias: String,

    pub domain: String,

    /// Destination addresses, in order
    pub email_addresses: Vec<String>,

    pub description: String,

    pub suspended: bool,

    pub created_ts: Option<Timestamp>,

    pub modified_ts: Option<Timestamp>,

    pub suspended_ts: Option<Timestamp>,
}

impl Alias {
    /// Create an alias with no addresses, description or timestamps
    pub fn new(alias: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            domain: domain.into(),
            ..Self::default()
        }
    }

    /// Canonical key, `alias@domain`
    pub fn key(&self) -> String {
        key(&self.alias, &self.domain)
    }

    /// See [`Filter::matches`]
    pub fn matches(&self, filter: &Filter, match_any: bool) -> bool {
        filter.matches(self, match_any)
    }

    /// Keep only `fields`, zeroing everything else.
    pub fn strip(&self, fields: &[Field]) -> Alias {
        let mut stripped = Alias::default();
        for field in fields {
            field.copy(self, &mut stripped);
        }
        stripped
    }

    /// Keep only the named fields. Unknown names fail before anything is copied.
    pub fn strip_data<S: AsRef<str>>(&self, names: &[S]) -> Result<Alias> {
        let fields = Field::parse_list(names)?;
        Ok(self.strip(&fields))
    }

    /// Unified diff of `self` (expected) against `other` (actual), one line
    /// of context.
    pub fn unified_diff(&self, other: &Alias) -> String {
        let expected = self.dump();
        let actual = other.dump();
        let diff = TextDiff::from_lines(&expected, &actual)
            .unified_diff()
            .context_radius(1)
            .header("Expected", "Actual")
            .to_string();
        format!("\n\nDiff:\n{diff}")
    }

    /// One `Name: value` line per field, timestamps at full precision
    fn dump(&self) -> String {
        let ts = |ts: Option<Timestamp>| ts.map(|t| t.to_string()).unwrap_or_default();
        let mut out = String::new();
        for field in Field::ALL {
            let value = match field {
                Field::EmailAddresses => format!("{:?}", self.email_addresses),
                Field::Description => format!("{:?}", self.description),
                Field::CreatedTs => ts(self.created_ts),
                Field::ModifiedTs => ts(self.modified_ts),
                Field::SuspendedTs => ts(self.suspended_ts),
                _ => field.render(self),
            };
            out.push_str(&format!("{}: {value}\n", field.name()));
        }
        out
    }
}

/// Key for an alias/domain pair
pub fn key(alias: &str, domain: &str) -> String {
    format!("{alias}@{domain}")
}

/// Ordered collection of aliases
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Aliases(Vec<Alias>);

impl Aliases {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, alias: Alias) {
        self.0.push(alias);
    }

    /// Sort by domain, then alias
    pub fn sort(&mut self) {
        self.0.sort_by(|a, b| {
            a.domain
                .cmp(&b.domain)
                .then_with(|| a.alias.cmp(&b.alias))
        });
    }

    /// Sorted copy of this collection
    pub fn sorted(mut self) -> Self {
        self.sort();
        self
    }

    /// Records of `self` whose key is missing from `other` or whose value
    /// differs there, sorted by domain then alias.
    ///
    /// Not symmetric: a full audit needs both directions.
    pub fn diff(&self, other: &Aliases) -> Result<Aliases> {
        let other = other.to_map()?;
        let diff: Aliases = self
            .iter()
            .filter(|a| other.get_key(&a.key()) != Some(*a))
            .cloned()
            .collect();
        Ok(diff.sorted())
    }

    /// Project every record down to the named fields.
    pub fn strip_data<S: AsRef<str>>(&self, names: &[S]) -> Result<Aliases> {
        let fields = Field::parse_list(names)?;
        Ok(self.iter().map(|a| a.strip(&fields)).collect())
    }

    /// Keyed form of this collection. A repeated key is an error.
    pub fn to_map(&self) -> Result<AliasesMap> {
        let mut map = AliasesMap::new();
        for alias in self.iter() {
            map.add(alias.clone())?;
        }
        Ok(map)
    }

    pub fn into_vec(self) -> Vec<Alias> {
        self.0
    }
}

impl Deref for Aliases {
    type Target = [Alias];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Alias>> for Aliases {
    fn from(aliases: Vec<Alias>) -> Self {
        Self(aliases)
    }
}

impl FromIterator<Alias> for Aliases {
    fn from_iter<I: IntoIterator<Item = Alias>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Aliases {
    type Item = Alias;
    type IntoIter = std::vec::IntoIter<Alias>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Aliases {
    type Item = &'a Alias;
    type IntoIter = std::slice::Iter<'a, Alias>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Aliases keyed by `alias@domain`
///
/// Append-only per key: replacing a record means [`AliasesMap::del`] then
/// [`AliasesMap::add`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasesMap(BTreeMap<String, Alias>);

impl AliasesMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert an alias, failing if its key is already present.
    pub fn add(&mut self, alias: Alias) -> Result<()> {
        match self.0.entry(alias.key()) {
            Entry::Occupied(e) => Err(Error::DuplicateKey(e.key().clone())),
            Entry::Vacant(e) => {
                e.insert(alias);
                Ok(())
            }
        }
    }

    /// Remove an alias; missing keys are ignored.
    pub fn del(&mut self, alias: &str, domain: &str) -> Option<Alias> {
        self.0.remove(&key(alias, domain))
    }

    /// Replace (or insert) an alias.
    pub fn replace(&mut self, alias: Alias) -> Result<()> {
        self.del(&alias.alias, &alias.domain);
        self.add(alias)
    }

    pub fn get(&self, alias: &str, domain: &str) -> Option<&Alias> {
        self.0.get(&key(alias, domain))
    }

    pub fn get_key(&self, key: &str) -> Option<&Alias> {
        self.0.get(key)
    }

    pub fn contains(&self, alias: &str, domain: &str) -> bool {
        self.0.contains_key(&key(alias, domain))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &Alias> {
        self.0.values()
    }

    /// Records matching `filter`, sorted by domain then alias
    pub fn search(&self, filter: &Filter, match_any: bool) -> Aliases {
        self.values()
            .filter(|a| a.matches(filter, match_any))
            .cloned()
            .collect::<Aliases>()
            .sorted()
    }

    /// All records, sorted by domain then alias
    pub fn to_slice(&self) -> Aliases {
        self.values().cloned().collect::<Aliases>().sorted()
    }
}

impl From<AliasesMap> for Aliases {
    fn from(map: AliasesMap) -> Self {
        map.0.into_values().collect::<Aliases>().sorted()
    }
}
