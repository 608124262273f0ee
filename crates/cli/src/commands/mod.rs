//! CLI command definitions and execution
//!
//! Every command builds a [`Context`] from the global flags: the loaded
//! configuration, the provider registry and the output settings. Commands
//! run against it and turn the first error into an [`ExitCode`].

use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::debug;

use aliasman_core::config::CONFIG_FILE;
use aliasman_core::{
    Clock, Config, ConfigManager, EmailProvider, Error, ProviderRegistry, Result, StorageProvider,
    SystemClock,
};
use aliasman_providers::{
    FilesStorageFactory, GsuiteEmailFactory, RackspaceEmailFactory, SqliteStorageFactory,
};
use aliasman_s3::S3StorageFactory;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, Spinner};

mod alias;
mod config;
mod list_providers;
mod prompt;
mod sync;
mod sync_from_email;
mod version;

/// aliasman - email alias manager
///
/// Creates, suspends and deletes aliases in a mail system while keeping a
/// record of every alias in a storage backend.
#[derive(Parser, Debug)]
#[command(name = "aliasman")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable the progress spinner
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    /// Configuration directory
    #[arg(long, global = true, env = "ALIASMAN_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Configuration file name inside the configuration directory
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    pub config_file: String,

    /// Open storage readonly; every mutating command fails
    #[arg(long, global = true, default_value = "false")]
    pub readonly: bool,

    /// Email provider to use instead of the configured one
    #[arg(long, global = true)]
    pub email_type: Option<String>,

    /// Storage provider to use instead of the configured one
    #[arg(long, global = true)]
    pub storage_type: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, suspend, delete and list aliases
    #[command(subcommand)]
    Alias(alias::AliasCommands),

    /// Copy aliases from one storage provider to another
    Sync(sync::SyncArgs),

    /// Record aliases that exist in the mail system but not in storage
    SyncFromEmail(sync_from_email::SyncFromEmailArgs),

    /// Interactively write the configuration file
    Config(config::ConfigArgs),

    /// List the available email and storage providers
    ListProviders,

    /// Show version information
    Version,
}

/// Register every provider this binary ships with.
pub fn registry() -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    registry.register_storage(S3StorageFactory)?;
    registry.register_storage(FilesStorageFactory)?;
    registry.register_storage(SqliteStorageFactory)?;
    registry.register_email(GsuiteEmailFactory)?;
    registry.register_email(RackspaceEmailFactory)?;
    Ok(registry)
}

/// Everything a command needs beyond its own arguments
pub struct Context {
    pub config: Config,
    pub manager: ConfigManager,
    pub registry: ProviderRegistry,
    pub clock: Arc<dyn Clock>,
    pub read_only: bool,
    pub output: OutputConfig,
}

impl Context {
    /// Load configuration and apply the global flag overrides.
    pub fn load(cli: &Cli, output: OutputConfig) -> Result<Self> {
        let manager = match &cli.config_dir {
            Some(dir) => ConfigManager::with_path(dir.join(&cli.config_file)),
            None => {
                let default = ConfigManager::new()?;
                match default.config_path().parent() {
                    Some(dir) => ConfigManager::with_path(dir.join(&cli.config_file)),
                    None => default,
                }
            }
        };
        debug!(path = %manager.config_path().display(), "loading configuration");

        let mut config = manager.load()?;
        if let Some(storage) = &cli.storage_type {
            config.storage_type.clone_from(storage);
        }
        if let Some(email) = &cli.email_type {
            config.email_type.clone_from(email);
        }

        Ok(Self {
            config,
            manager,
            registry: registry()?,
            clock: Arc::new(SystemClock),
            read_only: cli.readonly,
            output,
        })
    }

    pub fn formatter(&self) -> Formatter {
        Formatter::new(self.output.clone())
    }

    /// Domain from the command line, else the configured default.
    pub fn domain(&self, arg: Option<String>) -> Result<String> {
        arg.filter(|d| !d.is_empty())
            .or_else(|| Some(self.config.defaults.domain.clone()).filter(|d| !d.is_empty()))
            .ok_or_else(|| Error::Validation("domain needed".into()))
    }

    /// Destination addresses from the command line, else the configured
    /// defaults.
    pub fn addresses(&self, arg: Vec<String>) -> Result<Vec<String>> {
        let addresses = if arg.is_empty() {
            self.config.defaults.addresses.clone()
        } else {
            arg
        };
        if addresses.is_empty() {
            return Err(Error::Validation("email address(es) needed".into()));
        }
        Ok(addresses)
    }

    /// Fail before any I/O when running readonly.
    pub fn require_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnly(self.storage_name()?.to_string()));
        }
        Ok(())
    }

    fn storage_name(&self) -> Result<&str> {
        let name = self.config.storage_type.as_str();
        if name.is_empty() {
            return Err(Error::Config(
                "no storage provider configured; run 'aliasman config' or pass --storage-type"
                    .into(),
            ));
        }
        Ok(name)
    }

    /// Create and open the configured storage provider.
    pub async fn open_storage(&self) -> Result<Box<dyn StorageProvider>> {
        let name = self.storage_name()?.to_string();
        self.open_storage_named(&name, self.read_only).await
    }

    /// Create and open the named storage provider.
    pub async fn open_storage_named(
        &self,
        name: &str,
        read_only: bool,
    ) -> Result<Box<dyn StorageProvider>> {
        let mut storage = self
            .registry
            .create_storage(name, &self.config, Arc::clone(&self.clock))
            .await?;

        let spinner = Spinner::new(&self.output, &format!("Loading aliases from {name}"));
        storage.open(read_only).await?;
        spinner.finish();

        debug!(storage = name, read_only, "storage opened");
        Ok(storage)
    }

    /// Create the configured email provider.
    pub async fn email(&self) -> Result<Box<dyn EmailProvider>> {
        let name = self.config.email_type.as_str();
        if name.is_empty() {
            return Err(Error::Config(
                "no email provider configured; run 'aliasman config' or pass --email-type".into(),
            ));
        }
        self.registry.create_email(name, &self.config).await
    }
}

/// Rendered `--help` of a command path such as `alias create`
pub(crate) fn usage(command: &str) -> String {
    let argv = std::iter::once("aliasman")
        .chain(command.split_whitespace())
        .chain(std::iter::once("--help"));
    match Cli::command().try_get_matches_from(argv) {
        Err(e) => e.render().to_string(),
        Ok(_) => String::new(),
    }
}

/// Print `err` and map it to an exit code. Usage errors also print the
/// command's help.
pub(crate) fn fail(formatter: &Formatter, err: &Error, command: &str) -> ExitCode {
    formatter.error(&err.to_string());
    if err.is_usage() && !formatter.is_json() {
        eprintln!("\n{}", usage(command));
    }
    ExitCode::from(err)
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };

    match &cli.command {
        Commands::Version => return version::execute(output),
        Commands::ListProviders => return list_providers::execute(output),
        _ => {}
    }

    let ctx = match Context::load(&cli, output.clone()) {
        Ok(ctx) => ctx,
        Err(e) => return fail(&Formatter::new(output), &e, ""),
    };

    match cli.command {
        Commands::Alias(cmd) => alias::execute(cmd, &ctx).await,
        Commands::Sync(args) => sync::execute(args, &ctx).await,
        Commands::SyncFromEmail(args) => sync_from_email::execute(args, &ctx).await,
        Commands::Config(args) => config::execute(args, ctx).await,
        Commands::ListProviders | Commands::Version => ExitCode::Success,
    }
}
