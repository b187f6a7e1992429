//! Importer flags (set by the caller) and features (advertised by the importer).

/// Behavior flags passed to an importer before opening.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ImporterFlags {
    /// Print informational messages about what the importer does.
    pub verbose: bool,
}

impl ImporterFlags {
    pub const NONE: Self = Self { verbose: false };
    pub const VERBOSE: Self = Self { verbose: true };
}

/// Capabilities an importer implementation advertises.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ImporterFeatures {
    /// Can open in-memory data.
    pub open_data: bool,
    /// Handles the file callback itself instead of having the whole file
    /// read up front.
    pub file_callback: bool,
}

impl ImporterFeatures {
    #[inline]
    pub const fn open_data() -> Self {
        Self {
            open_data: true,
            file_callback: false,
        }
    }
}
