//! alias create

use clap::Args;
use md5::{Digest, Md5};
use rand::RngCore;
use tracing::info;

use aliasman_core::{Alias, EmailProvider, Error, Result, StorageProvider};

use super::report_done;
use crate::commands::Context;
use crate::output::Formatter;

/// Longest random alias, the length of an md5 hex digest
const MAX_RANDOM_LENGTH: usize = 32;

/// Bytes of randomness fed to the encoder
const RANDOM_BYTES: usize = 256;

/// Lowercase-only stand-in for the base64 alphabet
const ALPHABET: &[u8; 64] = b"abcdefghijklmnopqrstuvwxyz0123456789abcdefghijklmnopqrstuvwxyz01";

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Alias name (the part before '@')
    #[arg(short, long)]
    pub alias: Option<String>,

    /// Domain; defaults to the configured domain
    #[arg(short, long)]
    pub domain: Option<String>,

    /// Destination address; repeat or comma-separate for several
    #[arg(short = 'e', long = "email-address", value_delimiter = ',')]
    pub email_addresses: Vec<String>,

    /// Free-form description
    #[arg(short = 'D', long, default_value = "")]
    pub description: String,

    /// Generate a random alias name
    #[arg(short, long)]
    pub random: bool,

    /// Length of the random alias
    #[arg(short = 'l', long, default_value_t = 16)]
    pub random_length: usize,

    /// Use letters and digits instead of hex for the random alias
    #[arg(short = 'b', long)]
    pub random_base64: bool,
}

pub async fn run(args: CreateArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    let domain = ctx.domain(args.domain)?;
    let addresses = ctx.addresses(args.email_addresses)?;

    let name = if args.random {
        random_alias(args.random_length, args.random_base64)?
    } else {
        args.alias.filter(|a| !a.is_empty()).ok_or_else(|| {
            Error::Validation("alias needed or specify generating a random alias".into())
        })?
    };
    ctx.require_writable()?;

    let email = ctx.email().await?;
    let mut storage = ctx.open_storage().await?;

    let mut alias = Alias::new(name, domain);
    alias.email_addresses = addresses;
    alias.description = args.description;

    let message = create(storage.as_mut(), email.as_ref(), alias.clone()).await?;
    report_done(formatter, alias.key(), message);
    storage.close().await
}

/// Create `alias` in the mail system, then record it.
pub(crate) async fn create(
    storage: &mut dyn StorageProvider,
    email: &dyn EmailProvider,
    alias: Alias,
) -> Result<String> {
    if storage.get(&alias.alias, &alias.domain).await?.is_some() {
        return Err(Error::AliasExists(format!(
            "alias {} for domain {} already exists",
            alias.alias, alias.domain
        )));
    }

    email
        .alias_create(&alias.alias, &alias.domain, &alias.email_addresses)
        .await?;
    let message = format!(
        "Created alias {} that points to {}",
        alias.key(),
        alias.email_addresses.join(", ")
    );
    info!(alias = %alias.key(), "alias created in {}", email.type_name());

    storage.put(alias, true).await?;
    Ok(message)
}

/// Random alias name of `length` characters.
pub(crate) fn random_alias(length: usize, base64: bool) -> Result<String> {
    if length > MAX_RANDOM_LENGTH {
        return Err(Error::Validation(format!(
            "max random alias length of {MAX_RANDOM_LENGTH} bytes"
        )));
    }
    if length == 0 {
        return Err(Error::Validation("random alias length must be positive".into()));
    }

    let mut bytes = [0u8; RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    Ok(encode_alias(&bytes, length, base64))
}

/// Encode random bytes as an alias: md5 hex digest, or the lowercase base64
/// variant, cut to `length`.
fn encode_alias(bytes: &[u8], length: usize, base64: bool) -> String {
    let mut encoded = if base64 {
        encode_lowercase(bytes)
    } else {
        hex::encode(Md5::digest(bytes))
    };
    encoded.truncate(length);
    encoded
}

/// Unpadded base64 over [`ALPHABET`]
fn encode_lowercase(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(3) {
        let b1 = chunk.get(1).copied().unwrap_or(0);
        let b2 = chunk.get(2).copied().unwrap_or(0);
        let group = (u32::from(chunk[0]) << 16) | (u32::from(b1) << 8) | u32::from(b2);
        for i in 0..=chunk.len() {
            let index = (group >> (18 - 6 * i)) & 0x3f;
            out.push(char::from(ALPHABET[index as usize]));
        }
    }
    out
}
