//! version command

use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source revision, stamped by the release build
const REVISION: &str = match option_env!("ALIASMAN_REVISION") {
    Some(rev) => rev,
    None => "HEAD",
};

#[derive(Serialize)]
struct VersionOutput {
    version: &'static str,
    revision: &'static str,
}

impl std::fmt::Display for VersionOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "aliasman -- {} -- {}", self.version, self.revision)
    }
}

pub fn execute(output: OutputConfig) -> ExitCode {
    Formatter::new(output).output(&VersionOutput {
        version: VERSION,
        revision: REVISION,
    });
    ExitCode::Success
}
