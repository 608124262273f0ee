//! Everything commands print
//!
//! [`Formatter`] decides between human and JSON output, [`AliasTable`]
//! renders alias listings and [`Spinner`] covers slow provider opens.

mod formatter;
mod progress;
mod table;

pub use formatter::Formatter;
pub use progress::Spinner;
pub use table::{AliasTable, alias_json};

/// Global output flags
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// `--json`
    pub json: bool,
    /// `--no-color`
    pub no_color: bool,
    /// `--no-progress`
    pub no_progress: bool,
    /// `--quiet`; errors still print
    pub quiet: bool,
}
