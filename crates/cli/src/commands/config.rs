//! config command
//!
//! Walks through provider selection, the chosen providers' settings and the
//! defaults, then writes the configuration file.

use std::path::PathBuf;

use clap::Args;

use aliasman_core::{Config, Result};

use super::prompt::{DialoguerPrompter, Prompter};
use super::{Context, fail};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print the configuration file location and exit
    #[arg(long)]
    pub path: bool,
}

pub async fn execute(args: ConfigArgs, ctx: Context) -> ExitCode {
    let formatter = ctx.formatter();
    match run(args, ctx, &formatter) {
        Ok(()) => ExitCode::Success,
        Err(e) => fail(&formatter, &e, "config"),
    }
}

fn run(args: ConfigArgs, ctx: Context, formatter: &Formatter) -> Result<()> {
    let path = ctx.manager.config_path().clone();
    if args.path {
        formatter.println(&path.display().to_string());
        return Ok(());
    }

    let mut storage: Vec<&str> = ctx.registry.storage_factories().map(|f| f.type_name()).collect();
    let mut email: Vec<&str> = ctx.registry.email_factories().map(|f| f.type_name()).collect();
    storage.sort_unstable();
    email.sort_unstable();

    let mut config = ctx.config.clone();
    let mut prompter = DialoguerPrompter::default();
    configure(&mut config, &mut prompter, &storage, &email)?;

    if prompter.confirm(&format!("Write configuration to {}?", path.display()), true)? {
        ctx.manager.save(&config)?;
        formatter.success(&format!("Configuration written to {}", path.display()));
    } else {
        formatter.warning("Configuration not written");
    }
    Ok(())
}

fn position(items: &[&str], current: &str) -> usize {
    items.iter().position(|i| *i == current).unwrap_or(0)
}

fn optional(value: String) -> Option<String> {
    Some(value).filter(|v| !v.is_empty())
}

/// Fill `config` from the operator's answers.
pub(crate) fn configure(
    config: &mut Config,
    prompter: &mut dyn Prompter,
    storage_types: &[&str],
    email_types: &[&str],
) -> Result<()> {
    let choice = prompter.select(
        "Storage provider",
        storage_types,
        position(storage_types, &config.storage_type),
    )?;
    config.storage_type = storage_types.get(choice).copied().unwrap_or_default().to_string();
    configure_storage(config, prompter)?;

    let choice = prompter.select(
        "Email provider",
        email_types,
        position(email_types, &config.email_type),
    )?;
    config.email_type = email_types.get(choice).copied().unwrap_or_default().to_string();
    configure_email(config, prompter)?;

    config.defaults.domain = prompter.input("Default domain", &config.defaults.domain)?;
    let addresses = prompter.input(
        "Default email address(es), comma separated",
        &config.defaults.addresses.join(","),
    )?;
    config.defaults.addresses = addresses
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect();
    Ok(())
}

fn configure_storage(config: &mut Config, prompter: &mut dyn Prompter) -> Result<()> {
    match config.storage_type.as_str() {
        "s3" => {
            let s3 = &mut config.s3;
            s3.region = prompter.input("S3 region", &s3.region)?;
            s3.bucket = prompter.input("S3 bucket", &s3.bucket)?;
            s3.access_key = prompter.input("S3 access key", &s3.access_key)?;
            let secret = prompter.secret("S3 secret key (empty keeps the current one)")?;
            if !secret.is_empty() {
                s3.secret_key = secret;
            }
            let endpoint = s3.endpoint.clone().unwrap_or_default();
            s3.endpoint = optional(prompter.input("S3 endpoint (empty for AWS)", &endpoint)?);
        }
        "files" => {
            let current = config.files_path().display().to_string();
            config.files.path = Some(PathBuf::from(prompter.input("Alias directory", &current)?));
        }
        "sqlite3" => {
            let current = config.sqlite_path().display().to_string();
            config.sqlite3.db_path = Some(PathBuf::from(prompter.input("Database file", &current)?));
        }
        _ => {}
    }
    Ok(())
}

fn configure_email(config: &mut Config, prompter: &mut dyn Prompter) -> Result<()> {
    match config.email_type.as_str() {
        "gsuite" => {
            let current = config.gsuite_credentials_path().display().to_string();
            config.gsuite.credentials = Some(PathBuf::from(
                prompter.input("OAuth client credentials file", &current)?,
            ));
            let current = config.gsuite_token_path().display().to_string();
            config.gsuite.token = Some(PathBuf::from(prompter.input("OAuth token file", &current)?));
        }
        "rackspace_email_api" => {
            let rackspace = &mut config.rackspace;
            rackspace.user_key = prompter.input("Rackspace user key", &rackspace.user_key)?;
            let secret = prompter.secret("Rackspace secret key (empty keeps the current one)")?;
            if !secret.is_empty() {
                rackspace.secret_key = secret;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Replays canned answers in order
    #[derive(Default)]
    struct Script {
        selects: VecDeque<usize>,
        inputs: VecDeque<&'static str>,
        secrets: VecDeque<&'static str>,
    }

    impl Prompter for Script {
        fn select(&mut self, _: &str, _: &[&str], default: usize) -> Result<usize> {
            Ok(self.selects.pop_front().unwrap_or(default))
        }

        fn input(&mut self, _: &str, default: &str) -> Result<String> {
            Ok(match self.inputs.pop_front() {
                Some("") | None => default.to_string(),
                Some(answer) => answer.to_string(),
            })
        }

        fn secret(&mut self, _: &str) -> Result<String> {
            Ok(self.secrets.pop_front().unwrap_or_default().to_string())
        }

        fn confirm(&mut self, _: &str, default: bool) -> Result<bool> {
            Ok(default)
        }
    }

    const STORAGE: [&str; 3] = ["files", "s3", "sqlite3"];
    const EMAIL: [&str; 2] = ["gsuite", "rackspace_email_api"];

    #[test]
    fn test_configure_s3_and_rackspace() {
        let mut config = Config::default();
        let mut script = Script {
            selects: VecDeque::from([1, 1]),
            inputs: VecDeque::from([
                "eu-west-1",
                "aliases",
                "AKIA",
                "",
                "user-key",
                "example.com",
                "me@example.org, you@example.org",
            ]),
            secrets: VecDeque::from(["s3-secret", "rs-secret"]),
        };

        configure(&mut config, &mut script, &STORAGE, &EMAIL).unwrap();

        assert_eq!(config.storage_type, "s3");
        assert_eq!(config.s3.region, "eu-west-1");
        assert_eq!(config.s3.bucket, "aliases");
        assert_eq!(config.s3.secret_key, "s3-secret");
        assert_eq!(config.s3.endpoint, None);
        assert_eq!(config.email_type, "rackspace_email_api");
        assert_eq!(config.rackspace.user_key, "user-key");
        assert_eq!(config.rackspace.secret_key, "rs-secret");
        assert_eq!(config.defaults.domain, "example.com");
        assert_eq!(config.defaults.addresses, ["me@example.org", "you@example.org"]);
    }

    #[test]
    fn test_configure_keeps_existing_secret() {
        let mut config = Config::default();
        config.storage_type = "sqlite3".into();
        config.email_type = "rackspace_email_api".into();
        config.rackspace.secret_key = "kept".into();

        let mut script = Script {
            inputs: VecDeque::from(["/var/lib/aliasman.db"]),
            ..Default::default()
        };
        configure(&mut config, &mut script, &STORAGE, &EMAIL).unwrap();

        assert_eq!(config.storage_type, "sqlite3");
        assert_eq!(
            config.sqlite3.db_path,
            Some(PathBuf::from("/var/lib/aliasman.db"))
        );
        assert_eq!(config.rackspace.secret_key, "kept");
    }
}
