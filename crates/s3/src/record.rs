//! Wire forms of an alias in the bucket
//!
//! Every alias is an empty object whose user metadata carries the record.
//! The `index` object holds a JSON array of [`IndexAlias`] covering the
//! whole bucket. Timestamps are RFC3339 at second resolution in both forms,
//! so sub-second precision does not survive a round trip.

use std::collections::HashMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use aliasman_core::timestamp::{ZERO_TIME, format_optional, parse_optional, truncate_to_second};
use aliasman_core::{Alias, Clock, Error, Result};

/// Key of the index object
pub const INDEX_KEY: &str = "index";

/// Prefix of every alias object key
pub const ALIAS_PREFIX: &str = "alias-";

/// Object key for `alias@domain`
pub fn object_key(alias: &str, domain: &str) -> String {
    format!("{ALIAS_PREFIX}{alias}@{domain}")
}

/// One entry of the index blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexAlias {
    pub alias: String,
    pub domain: String,
    pub email_addresses: Vec<String>,
    pub description: String,
    pub suspended: bool,
    #[serde(with = "rfc3339")]
    pub created_ts: Option<Timestamp>,
    #[serde(with = "rfc3339")]
    pub modified_ts: Option<Timestamp>,
    #[serde(with = "rfc3339")]
    pub suspended_ts: Option<Timestamp>,
}

impl IndexAlias {
    /// Index form of `alias`, with timestamps truncated to the second
    pub fn from_alias(alias: &Alias) -> Self {
        Self {
            alias: alias.alias.clone(),
            domain: alias.domain.clone(),
            email_addresses: alias.email_addresses.clone(),
            description: alias.description.clone(),
            suspended: alias.suspended,
            created_ts: alias.created_ts.map(truncate_to_second),
            modified_ts: alias.modified_ts.map(truncate_to_second),
            suspended_ts: alias.suspended_ts.map(truncate_to_second),
        }
    }

    pub fn to_alias(&self) -> Alias {
        Alias {
            alias: self.alias.clone(),
            domain: self.domain.clone(),
            email_addresses: self.email_addresses.clone(),
            description: self.description.clone(),
            suspended: self.suspended,
            created_ts: self.created_ts,
            modified_ts: self.modified_ts,
            suspended_ts: self.suspended_ts,
        }
    }
}

/// Absent timestamps are written as the zero instant; anything that does
/// not parse reads back as absent.
mod rfc3339 {
    use jiff::Timestamp;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{format_optional, parse_optional};

    pub fn serialize<S: Serializer>(ts: &Option<Timestamp>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_optional(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Timestamp>, D::Error> {
        let value = Option::<String>::deserialize(d)?;
        Ok(value.as_deref().and_then(parse_optional))
    }
}

/// Serialize the index blob: records sorted by domain then alias, two-space
/// indented JSON.
pub fn encode_index<'a>(aliases: impl IntoIterator<Item = &'a Alias>) -> Result<Vec<u8>> {
    let mut records: Vec<IndexAlias> = aliases.into_iter().map(IndexAlias::from_alias).collect();
    records.sort_by(|a, b| {
        a.domain
            .cmp(&b.domain)
            .then_with(|| a.alias.cmp(&b.alias))
    });
    Ok(serde_json::to_vec_pretty(&records)?)
}

pub fn decode_index(body: &[u8]) -> Result<Vec<Alias>> {
    let records: Vec<IndexAlias> = serde_json::from_slice(body)?;
    Ok(records.iter().map(IndexAlias::to_alias).collect())
}

/// Hex MD5 of a blob, comparable with a single-part upload's ETag
pub fn checksum(body: &[u8]) -> String {
    use md5::{Digest, Md5};
    hex::encode(Md5::digest(body))
}

/// Object metadata for an alias.
///
/// `alias` must already carry the timestamps to be stored.
pub fn to_metadata(alias: &Alias) -> HashMap<String, String> {
    HashMap::from([
        ("alias".to_string(), alias.alias.clone()),
        ("domain".to_string(), alias.domain.clone()),
        ("description".to_string(), alias.description.clone()),
        (
            "email_addresses".to_string(),
            alias.email_addresses.join(","),
        ),
        ("suspended".to_string(), alias.suspended.to_string()),
        ("created_ts".to_string(), format_optional(alias.created_ts)),
        ("modified_ts".to_string(), format_optional(alias.modified_ts)),
        (
            "suspended_ts".to_string(),
            format_optional(alias.suspended_ts),
        ),
    ])
}

/// Rebuild an alias from object metadata.
///
/// `alias` and `domain` are required. A timestamp that is missing or
/// unparseable becomes `clock.now()`; the zero instant means absent.
pub fn from_metadata(metadata: &HashMap<String, String>, clock: &dyn Clock) -> Result<Alias> {
    let field = |name: &str| metadata.get(name).map(String::as_str);
    let required = |name: &str| {
        field(name)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::Storage(format!("object metadata is missing {name}")))
    };
    let lenient = |name: &str| match field(name) {
        Some(ZERO_TIME) => None,
        Some(value) => parse_optional(value).or_else(|| Some(clock.now())),
        None => Some(clock.now()),
    };

    let email_addresses = field("email_addresses")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();

    Ok(Alias {
        alias: required("alias")?,
        domain: required("domain")?,
        email_addresses,
        description: field("description").unwrap_or_default().to_string(),
        suspended: field("suspended") == Some("true"),
        created_ts: lenient("created_ts"),
        modified_ts: lenient("modified_ts"),
        suspended_ts: lenient("suspended_ts"),
    })
}
