//! Terminal prompts
//!
//! Sync confirmations go through [`Confirm`]; the configuration wizard
//! through [`Prompter`]. Both have dialoguer-backed implementations.

use aliasman_core::{AssumeYes, Confirm, Error, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password, Select};

/// Asks on the terminal; Enter means yes.
#[derive(Debug, Default)]
pub struct DialoguerConfirm;

impl Confirm for DialoguerConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        dialoguer::Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(true)
            .interact()
            .map_err(prompt_error)
    }
}

/// Prompt failures are the operator walking away: Ctrl-C or a closed
/// terminal.
fn prompt_error(e: dialoguer::Error) -> Error {
    Error::Interrupted(e.to_string())
}

/// Confirmation gate for a sync run
pub fn confirmer(assume_yes: bool) -> Box<dyn Confirm> {
    if assume_yes {
        Box::new(AssumeYes)
    } else {
        Box::new(DialoguerConfirm)
    }
}

/// Questions asked by the configuration wizard
pub trait Prompter {
    /// Index of the chosen item
    fn select(&mut self, prompt: &str, items: &[&str], default: usize) -> Result<usize>;

    /// Free text; empty input yields `default`
    fn input(&mut self, prompt: &str, default: &str) -> Result<String>;

    /// Hidden input; may be empty
    fn secret(&mut self, prompt: &str) -> Result<String>;

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool>;
}

#[derive(Default)]
pub struct DialoguerPrompter {
    theme: ColorfulTheme,
}

impl Prompter for DialoguerPrompter {
    fn select(&mut self, prompt: &str, items: &[&str], default: usize) -> Result<usize> {
        Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact()
            .map_err(prompt_error)
    }

    fn input(&mut self, prompt: &str, default: &str) -> Result<String> {
        Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default.to_string())
            .allow_empty(true)
            .interact_text()
            .map_err(prompt_error)
    }

    fn secret(&mut self, prompt: &str) -> Result<String> {
        Password::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .map_err(prompt_error)
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool> {
        dialoguer::Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()
            .map_err(prompt_error)
    }
}
