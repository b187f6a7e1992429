//! Format-detecting importer: picks a concrete importer plugin from the
//! file extension or the data signature and delegates to it.

mod dispatcher;
mod error;
mod importer;
pub mod rules;

pub use dispatcher::{DispatchOutcome, DispatchRequest, DispatchSource, FormatDispatcher};
pub use error::{DispatchError, DispatchWarning, EntryPoint};
pub use importer::AnyImageImporter;
pub use rules::{FormatRule, Heuristic, Matcher, RuleTable, RuleTableError, Segment};
