//! Rackspace Email API provider
//!
//! Requests are signed with the `X-Api-Signature` header and spaced at
//! least `throttle` apart, since the API rate limits per user key.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use aliasman_core::config::require;
use aliasman_core::{
    Alias, Aliases, Clock, Config, EmailFactory, EmailProvider, Error, Result, SystemClock,
};

use crate::http::{USER_AGENT, status_error, transport};

const TYPE_NAME: &str = "rackspace_email_api";
const DESCRIPTION: &str = "Rackspace Email backed alias configuration";

pub const DEFAULT_BASE_URL: &str = "https://api.emailsrvr.com/v1";

/// Aliases requested per index page
const PAGE_SIZE: usize = 250;

const ERROR_HEADER: &str = "x-error-message";

/// Value of the `X-Api-Signature` header
pub fn signature(user_key: &str, secret_key: &str, user_agent: &str, stamp: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(user_key.as_bytes());
    hasher.update(user_agent.as_bytes());
    hasher.update(stamp.as_bytes());
    hasher.update(secret_key.as_bytes());
    format!("{user_key}:{stamp}:{}", STANDARD.encode(hasher.finalize()))
}

#[derive(Debug, Deserialize)]
struct AliasIndex {
    #[serde(default)]
    aliases: Vec<AliasName>,
    #[serde(default)]
    total: usize,
}

#[derive(Debug, Deserialize)]
struct AliasName {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AliasDetail {
    #[serde(default)]
    email_address_list: EmailAddressList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddressList {
    #[serde(default)]
    email_address: Vec<String>,
}

/// Email provider speaking to the Rackspace Email API
pub struct RackspaceEmailer {
    client: reqwest::Client,
    base_url: String,
    user_key: String,
    secret_key: String,
    throttle: Duration,
    clock: Arc<dyn Clock>,
    last_request: Mutex<Option<Instant>>,
}

impl RackspaceEmailer {
    pub fn new(
        base_url: impl Into<String>,
        user_key: impl Into<String>,
        secret_key: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_key: user_key.into(),
            secret_key: secret_key.into(),
            throttle: Duration::from_millis(700),
            clock,
            last_request: Mutex::new(None),
        })
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    fn aliases_url(&self, domain: &str) -> String {
        format!("{}/customers/me/domains/{domain}/rs/aliases", self.base_url)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let stamp = self.clock.now().strftime("%Y%m%d%H%M%S").to_string();
        self.client
            .request(method, url)
            .header("Accept", "application/json")
            .header(
                "X-Api-Signature",
                signature(&self.user_key, &self.secret_key, USER_AGENT, &stamp),
            )
    }

    /// Send after waiting out the throttle interval
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let mut last = self.last_request.lock().await;
        if let Some(at) = *last {
            tokio::time::sleep_until(at + self.throttle).await;
        }
        let response = request.send().await.map_err(transport);
        *last = Some(Instant::now());
        response
    }

    async fn fail(response: Response, action: &str) -> Error {
        let status = response.status();
        let message = response
            .headers()
            .get(ERROR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let message = match message {
            Some(message) => message,
            None => response.text().await.unwrap_or_default(),
        };
        status_error(
            TYPE_NAME,
            status,
            &format!("failure {action}: {}", message.trim()),
        )
    }

    async fn alias_names(&self, domain: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        loop {
            let url = format!(
                "{}?size={PAGE_SIZE}&offset={}",
                self.aliases_url(domain),
                names.len()
            );
            let response = self.send(self.request(Method::GET, url)).await?;
            if !response.status().is_success() {
                return Err(Self::fail(response, "listing aliases").await);
            }
            let page: AliasIndex = response.json().await.map_err(transport)?;
            let fetched = page.aliases.len();
            names.extend(page.aliases.into_iter().map(|a| a.name));

            if fetched == 0 || names.len() >= page.total {
                break;
            }
        }
        debug!(domain, aliases = names.len(), "fetched rackspace alias index");
        Ok(names)
    }

    async fn alias_addresses(&self, domain: &str, name: &str) -> Result<Vec<String>> {
        let url = format!("{}/{name}", self.aliases_url(domain));
        let response = self.send(self.request(Method::GET, url)).await?;
        if !response.status().is_success() {
            return Err(Self::fail(response, "listing aliases").await);
        }
        let detail: AliasDetail = response.json().await.map_err(transport)?;
        Ok(detail.email_address_list.email_address)
    }
}

#[async_trait]
impl EmailProvider for RackspaceEmailer {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    async fn alias_create(&self, alias: &str, domain: &str, addresses: &[String]) -> Result<()> {
        let url = format!("{}/{alias}", self.aliases_url(domain));
        let form = [("aliasEmails", addresses.join(","))];
        let response = self
            .send(self.request(Method::POST, url).form(&form))
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response, "creating alias").await);
        }
        Ok(())
    }

    async fn alias_delete(&self, alias: &str, domain: &str) -> Result<()> {
        let url = format!("{}/{alias}", self.aliases_url(domain));
        let response = self.send(self.request(Method::DELETE, url)).await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                debug!(alias, domain, "alias already absent");
                Ok(())
            }
            _ => Err(Self::fail(response, "deleting alias").await),
        }
    }

    async fn alias_list(&self, domain: &str, address_filter: &[String]) -> Result<Aliases> {
        let mut aliases = Aliases::new();
        for name in self.alias_names(domain).await? {
            let addresses = self.alias_addresses(domain, &name).await?;
            if !address_filter.is_empty()
                && !addresses.iter().any(|a| address_filter.contains(a))
            {
                continue;
            }
            aliases.push(Alias {
                email_addresses: addresses,
                ..Alias::new(name, domain)
            });
        }
        Ok(aliases.sorted())
    }
}

/// Registers the `rackspace_email_api` email type
pub struct RackspaceEmailFactory;

#[async_trait]
impl EmailFactory for RackspaceEmailFactory {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    async fn create(&self, config: &Config) -> Result<Box<dyn EmailProvider>> {
        let rackspace = &config.rackspace;
        let user_key = require(&rackspace.user_key, "rackspace.user_key")?;
        let secret_key = require(&rackspace.secret_key, "rackspace.secret_key")?;
        let base_url = rackspace.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);

        let emailer = RackspaceEmailer::new(base_url, user_key, secret_key, Arc::new(SystemClock))?
            .with_throttle(Duration::from_millis(rackspace.throttle_ms));
        Ok(Box::new(emailer))
    }
}
