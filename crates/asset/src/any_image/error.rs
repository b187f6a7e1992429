//! Dispatch failures and warnings, with their exact diagnostic texts.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::importer::ImportError;
use crate::registry::LoadError;

/// Which public entry point a message is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    OpenFile,
    OpenData,
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntryPoint::OpenFile => "openFile",
            EntryPoint::OpenData => "openData",
        })
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Trade::AnyImageImporter::openData(): file is empty")]
    EmptyData,

    #[error("Trade::AnyImageImporter::openFile(): cannot determine the format of {}", path.display())]
    UnknownExtension { path: PathBuf },

    #[error("Trade::AnyImageImporter::openData(): cannot determine the format from signature 0x{signature}")]
    UnknownSignature { signature: String },

    #[error("Trade::AnyImageImporter::{entry_point}(): cannot load the {plugin} plugin")]
    PluginUnavailable {
        entry_point: EntryPoint,
        plugin: String,
        #[source]
        reason: LoadError,
    },

    /// The delegate's own open failed; its error is passed through as is.
    #[error(transparent)]
    Delegate(Box<ImportError>),
}

impl DispatchError {
    /// Plugin the request was resolved to, if detection got that far.
    pub fn plugin(&self) -> Option<&str> {
        match self {
            DispatchError::PluginUnavailable { plugin, .. } => Some(plugin),
            _ => None,
        }
    }
}

/// Non-fatal findings while forwarding options to the delegate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchWarning {
    UnrecognizedOption {
        entry_point: EntryPoint,
        key: String,
        plugin: String,
    },
}

impl fmt::Display for DispatchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchWarning::UnrecognizedOption {
                entry_point,
                key,
                plugin,
            } => write!(
                f,
                "Trade::AnyImageImporter::{entry_point}(): option {key} not recognized by {plugin}"
            ),
        }
    }
}
