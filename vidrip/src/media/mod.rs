pub mod artifacts;
pub mod formats;
pub mod pipeline;
pub mod tools;

pub use formats::{LanguagePreference, parse_report, select_formats};
pub use pipeline::{Outcome, Pipeline};
pub use tools::{ExternalTools, MediaTools};
