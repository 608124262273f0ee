//! Exit code definitions for the aliasman CLI
//!
//! Scripts driving aliasman rely on these values. Changing one is a breaking
//! change.

use aliasman_core::Error;

/// Process exit status, one value per class of failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// Anything without a more specific code, storage backend failures
    /// included
    GeneralError = 1,

    /// Missing alias, domain or addresses, a bad regex or column name, or
    /// unusable configuration
    UsageError = 2,

    /// Provider unreachable or timed out; retrying may help
    NetworkError = 3,

    /// Provider rejected the credentials
    AuthError = 4,

    /// The alias or provider resource does not exist
    NotFound = 5,

    /// The alias is already recorded
    Conflict = 6,

    /// `--readonly` run asked to change something
    ReadOnly = 7,

    /// Prompt aborted with Ctrl-C or a closed terminal
    Interrupted = 130,
}

const ALL: [ExitCode; 9] = [
    ExitCode::Success,
    ExitCode::GeneralError,
    ExitCode::UsageError,
    ExitCode::NetworkError,
    ExitCode::AuthError,
    ExitCode::NotFound,
    ExitCode::Conflict,
    ExitCode::ReadOnly,
    ExitCode::Interrupted,
];

impl ExitCode {
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// `None` for values aliasman never exits with
    pub fn from_i32(code: i32) -> Option<Self> {
        ALL.into_iter().find(|c| c.as_i32() == code)
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::GeneralError => "General error",
            Self::UsageError => "Invalid arguments or configuration",
            Self::NetworkError => "Provider unreachable (retryable)",
            Self::AuthError => "Provider authentication failed",
            Self::NotFound => "Alias or resource not found",
            Self::Conflict => "Alias already exists",
            Self::ReadOnly => "Mutation refused in readonly mode",
            Self::Interrupted => "Interrupted",
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        Self::from_i32(err.exit_code()).unwrap_or(Self::GeneralError)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.as_i32()
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.as_i32(), self.description())
    }
}
