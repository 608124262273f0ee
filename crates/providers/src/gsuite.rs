//! Google Workspace (GSuite) Admin Directory API email provider
//!
//! Aliases belong to a single user, so create and list need exactly one
//! destination address. Authentication uses an OAuth token file obtained
//! out of band; an expired access token is refreshed against the client
//! credentials' `token_uri` and the refreshed token is written back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use aliasman_core::timestamp::parse_optional;
use aliasman_core::{
    Alias, Aliases, Clock, Config, EmailFactory, EmailProvider, Error, Result, SystemClock,
};

use crate::http::{USER_AGENT, check, transport};

const TYPE_NAME: &str = "gsuite";
const DESCRIPTION: &str = "GSuite Admin Domain API";

/// Directory API root
pub const DEFAULT_BASE_URL: &str = "https://admin.googleapis.com/admin/directory/v1";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are refreshed
const EXPIRY_MARGIN: SignedDuration = SignedDuration::from_secs(10);

fn single_user(users: &[String]) -> Result<&str> {
    match users {
        [user] => Ok(user),
        _ => Err(Error::Validation(
            "gsuite only supports, and requires, a single user for performing alias actions"
                .to_string(),
        )),
    }
}

fn split_alias(full: &str) -> Result<(&str, &str)> {
    match full.split_once('@') {
        Some((alias, domain)) if !domain.contains('@') => Ok((alias, domain)),
        _ => Err(Error::General(format!(
            "full alias was not able to be split: {full}"
        ))),
    }
}

/// OAuth client secret file as downloaded from the Google console
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientSecret {
    client_id: String,
    client_secret: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Stored OAuth token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default, with = "expiry")]
    pub expiry: Option<Timestamp>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Token files written by other tools use the zero instant for "never
/// expires".
mod expiry {
    use jiff::Timestamp;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::parse_optional;

    pub fn serialize<S: Serializer>(ts: &Option<Timestamp>, s: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => s.serialize_str(&ts.to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Timestamp>, D::Error> {
        let value = Option::<String>::deserialize(d)?;
        Ok(value.as_deref().and_then(parse_optional))
    }
}

impl Token {
    /// Expired, or about to
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiry.is_some_and(|expiry| {
            expiry
                .checked_sub(EXPIRY_MARGIN)
                .map_or(true, |soon| soon <= now)
        })
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Loads the stored token, refreshing and saving it when expired.
pub struct TokenSource {
    client: reqwest::Client,
    credentials_path: PathBuf,
    token_path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl TokenSource {
    pub fn new(
        credentials_path: impl Into<PathBuf>,
        token_path: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials_path: credentials_path.into(),
            token_path: token_path.into(),
            clock,
        }
    }

    fn read_token(&self) -> Result<Token> {
        let body = std::fs::read(&self.token_path).map_err(|e| {
            Error::Config(format!(
                "unable to read gsuite token {}: {e}",
                self.token_path.display()
            ))
        })?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn read_secret(&self) -> Result<ClientSecret> {
        let body = std::fs::read(&self.credentials_path).map_err(|e| {
            Error::Config(format!(
                "unable to read client secret file {}: {e}",
                self.credentials_path.display()
            ))
        })?;
        let file: CredentialsFile = serde_json::from_slice(&body)?;
        file.installed
            .or(file.web)
            .ok_or_else(|| Error::Config("client secret file has no client section".to_string()))
    }

    /// A usable access token
    pub async fn token(&self) -> Result<Token> {
        let token = self.read_token()?;
        let now = self.clock.now();
        if !token.is_expired(now) {
            return Ok(token);
        }

        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or_else(|| Error::Auth("gsuite token expired and has no refresh token".into()))?;
        let secret = self.read_secret()?;

        debug!(token_uri = %secret.token_uri, "refreshing gsuite access token");
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
        ];
        let response = self
            .client
            .post(&secret.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!(
                "gsuite token refresh failed ({status}): {}",
                body.trim()
            )));
        }
        let refreshed: RefreshResponse = response.json().await.map_err(transport)?;

        let token = Token {
            access_token: refreshed.access_token,
            token_type: refreshed.token_type.unwrap_or(token.token_type),
            refresh_token: refreshed.refresh_token.or(Some(refresh_token)),
            expiry: refreshed
                .expires_in
                .and_then(|secs| now.checked_add(SignedDuration::from_secs(secs)).ok()),
        };
        save_token(&self.token_path, &token)?;
        info!("refreshed gsuite access token");
        Ok(token)
    }
}

fn save_token(path: &Path, token: &Token) -> Result<()> {
    let body = serde_json::to_vec(token)?;
    std::fs::write(path, body)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct AliasList {
    #[serde(default)]
    aliases: Vec<AliasEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AliasEntry {
    alias: Option<String>,
    primary_email: Option<String>,
}

/// Email provider speaking to the Admin Directory API
pub struct GsuiteEmailer {
    client: reqwest::Client,
    base_url: Url,
    access_token: String,
}

impl GsuiteEmailer {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            base_url: Url::parse(&base_url.into())?,
            access_token: access_token.into(),
        })
    }

    /// `<base>/users/<user>/aliases[/<alias>]`, each segment percent-encoded
    fn aliases_url(&self, user: &str, alias: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                Error::Config(format!("gsuite base URL {} cannot hold a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(["users", user, "aliases"])
            .extend(alias);
        Ok(url)
    }
}

#[async_trait]
impl EmailProvider for GsuiteEmailer {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    async fn alias_create(&self, alias: &str, domain: &str, addresses: &[String]) -> Result<()> {
        let user = single_user(addresses)?;
        let response = self
            .client
            .post(self.aliases_url(user, None)?)
            .bearer_auth(&self.access_token)
            .json(&json!({ "alias": format!("{alias}@{domain}") }))
            .send()
            .await
            .map_err(transport)?;
        check(TYPE_NAME, response).await?;
        Ok(())
    }

    async fn alias_delete(&self, alias: &str, domain: &str) -> Result<()> {
        let full = format!("{alias}@{domain}");
        let response = self
            .client
            .delete(self.aliases_url(&full, Some(&full))?)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(transport)?;
        check(TYPE_NAME, response).await?;
        Ok(())
    }

    async fn alias_list(&self, domain: &str, address_filter: &[String]) -> Result<Aliases> {
        let user = single_user(address_filter)?;
        let response = self
            .client
            .get(self.aliases_url(user, None)?)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(transport)?;
        let list: AliasList = check(TYPE_NAME, response)
            .await?
            .json()
            .await
            .map_err(transport)?;

        let mut aliases = Aliases::new();
        for entry in list.aliases {
            let (Some(full), Some(primary)) = (entry.alias, entry.primary_email) else {
                continue;
            };
            let (name, alias_domain) = split_alias(&full)?;
            if !domain.is_empty() && alias_domain != domain {
                continue;
            }
            aliases.push(Alias {
                email_addresses: vec![primary],
                ..Alias::new(name, alias_domain)
            });
        }
        Ok(aliases.sorted())
    }
}

/// Registers the `gsuite` email type
pub struct GsuiteEmailFactory;

#[async_trait]
impl EmailFactory for GsuiteEmailFactory {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    async fn create(&self, config: &Config) -> Result<Box<dyn EmailProvider>> {
        let source = TokenSource::new(
            config.gsuite_credentials_path(),
            config.gsuite_token_path(),
            Arc::new(SystemClock),
        );
        let token = source.token().await?;
        let base_url = config
            .gsuite
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Box::new(GsuiteEmailer::new(base_url, token.access_token)?))
    }
}
