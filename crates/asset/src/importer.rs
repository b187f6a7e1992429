//! Importer contract shared by concrete format importers and the
//! format-detecting facade.
//!
//! Implementations provide the `do_*` hooks; the provided methods take care of
//! closing before reopening and of routing file reads through the file
//! callback when one is set.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use corelib::{Configuration, Diagnostics, ImporterFeatures, ImporterFlags};
use thiserror::Error;

use crate::any_image::DispatchError;
use crate::image_data::{ImageData1D, ImageData2D, ImageData3D};

/// Loads file contents on behalf of an importer. Returning `None` means the
/// file can't be read.
pub type FileCallback = Arc<dyn Fn(&Path) -> Option<Vec<u8>> + Send + Sync>;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{importer}::openFile(): cannot open file {}", path.display())]
    CannotOpenFile {
        importer: String,
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },
    #[error("{importer}::openData(): feature not supported")]
    OpenDataNotSupported { importer: String },
    #[error("{importer}::{operation}(): no file opened")]
    NotOpened {
        importer: String,
        operation: &'static str,
    },
    #[error("{importer}::{operation}(): index {id} out of range for {count} entries")]
    OutOfRange {
        importer: String,
        operation: &'static str,
        id: u32,
        count: u32,
    },
    #[error("{importer}::openData(): {source}")]
    Decode {
        importer: String,
        #[source]
        source: image::ImageError,
    },
    #[error("{importer}: invalid value {value} for option {key}")]
    InvalidOption {
        importer: String,
        key: String,
        value: String,
    },
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

pub type ImportResult<T> = Result<T, ImportError>;

/// State every importer carries regardless of format.
#[derive(Clone, Default)]
pub struct ImporterState {
    pub flags: ImporterFlags,
    pub configuration: Configuration,
    pub file_callback: Option<FileCallback>,
    pub diagnostics: Diagnostics,
}

impl ImporterState {
    /// State with the given default configuration, which also defines the
    /// option keys the importer recognizes.
    pub fn with_configuration(configuration: Configuration) -> Self {
        Self {
            configuration,
            ..Self::default()
        }
    }
}

impl fmt::Debug for ImporterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImporterState")
            .field("flags", &self.flags)
            .field("configuration", &self.configuration)
            .field("file_callback", &self.file_callback.is_some())
            .finish_non_exhaustive()
    }
}

pub trait Importer: Send {
    /// Plugin name, e.g. `PngImporter`.
    fn name(&self) -> &str;

    fn features(&self) -> ImporterFeatures;

    fn state(&self) -> &ImporterState;
    fn state_mut(&mut self) -> &mut ImporterState;

    fn do_is_opened(&self) -> bool;
    fn do_close(&mut self);
    fn do_open_data(&mut self, data: &[u8]) -> ImportResult<()>;

    /// Default reads the whole file and hands it to [`Importer::do_open_data`].
    fn do_open_file(&mut self, path: &Path) -> ImportResult<()> {
        if !self.features().open_data {
            return Err(self.report(ImportError::OpenDataNotSupported {
                importer: self.origin(),
            }));
        }
        let data = std::fs::read(path).map_err(|e| {
            self.report(ImportError::CannotOpenFile {
                importer: self.origin(),
                path: path.to_path_buf(),
                source: Some(e),
            })
        })?;
        self.do_open_data(&data)
    }

    fn image1d_count(&self) -> u32 {
        0
    }
    fn image1d(&mut self, id: u32) -> ImportResult<ImageData1D> {
        Err(self.out_of_range("image1D", id, 0))
    }
    fn image2d_count(&self) -> u32 {
        0
    }
    fn image2d(&mut self, id: u32) -> ImportResult<ImageData2D> {
        Err(self.out_of_range("image2D", id, 0))
    }
    fn image3d_count(&self) -> u32 {
        0
    }
    fn image3d(&mut self, id: u32) -> ImportResult<ImageData3D> {
        Err(self.out_of_range("image3D", id, 0))
    }

    // Provided API

    /// Message prefix, `Trade::<name>`.
    fn origin(&self) -> String {
        format!("Trade::{}", self.name())
    }

    fn flags(&self) -> ImporterFlags {
        self.state().flags
    }
    fn set_flags(&mut self, flags: ImporterFlags) {
        self.state_mut().flags = flags;
    }
    fn configuration(&self) -> &Configuration {
        &self.state().configuration
    }
    fn configuration_mut(&mut self) -> &mut Configuration {
        &mut self.state_mut().configuration
    }
    fn file_callback(&self) -> Option<FileCallback> {
        self.state().file_callback.clone()
    }
    fn set_file_callback(&mut self, callback: Option<FileCallback>) {
        self.state_mut().file_callback = callback;
    }
    fn diagnostics(&self) -> &Diagnostics {
        &self.state().diagnostics
    }
    fn set_diagnostics(&mut self, diagnostics: Diagnostics) {
        self.state_mut().diagnostics = diagnostics;
    }

    fn is_opened(&self) -> bool {
        self.do_is_opened()
    }

    fn close(&mut self) {
        if self.do_is_opened() {
            self.do_close();
        }
    }

    fn open_data(&mut self, data: &[u8]) -> ImportResult<()> {
        if !self.features().open_data {
            return Err(self.report(ImportError::OpenDataNotSupported {
                importer: self.origin(),
            }));
        }
        self.close();
        self.do_open_data(data)
    }

    /// Opens a file. With a file callback set and no native callback support,
    /// the callback is asked for the whole file once and the data path is
    /// taken instead.
    fn open_file(&mut self, path: &Path) -> ImportResult<()> {
        self.close();
        match self.file_callback() {
            Some(callback) if !self.features().file_callback => {
                let data = callback(path).ok_or_else(|| {
                    self.report(ImportError::CannotOpenFile {
                        importer: self.origin(),
                        path: path.to_path_buf(),
                        source: None,
                    })
                })?;
                self.do_open_data(&data)
            }
            _ => self.do_open_file(path),
        }
    }

    /// Record `error` in the diagnostics sink and hand it back.
    fn report(&self, error: ImportError) -> ImportError {
        self.diagnostics().error(error.to_string());
        error
    }

    fn out_of_range(&self, operation: &'static str, id: u32, count: u32) -> ImportError {
        self.report(ImportError::OutOfRange {
            importer: self.origin(),
            operation,
            id,
            count,
        })
    }
}

/// Fails with [`ImportError::NotOpened`] unless the importer has a file open.
pub(crate) fn ensure_opened<I: Importer + ?Sized>(
    importer: &I,
    operation: &'static str,
) -> ImportResult<()> {
    if importer.is_opened() {
        Ok(())
    } else {
        Err(importer.report(ImportError::NotOpened {
            importer: importer.origin(),
            operation,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use corelib::Severity;

    use crate::image_data::PixelFormat;

    /// Remembers the bytes it was opened with; one 1x1 R8 image per byte.
    #[derive(Default)]
    struct BytesImporter {
        state: ImporterState,
        opened: Option<Vec<u8>>,
    }

    impl Importer for BytesImporter {
        fn name(&self) -> &str {
            "BytesImporter"
        }
        fn features(&self) -> ImporterFeatures {
            ImporterFeatures::open_data()
        }
        fn state(&self) -> &ImporterState {
            &self.state
        }
        fn state_mut(&mut self) -> &mut ImporterState {
            &mut self.state
        }
        fn do_is_opened(&self) -> bool {
            self.opened.is_some()
        }
        fn do_close(&mut self) {
            self.opened = None;
        }
        fn do_open_data(&mut self, data: &[u8]) -> ImportResult<()> {
            self.opened = Some(data.to_vec());
            Ok(())
        }
        fn image2d_count(&self) -> u32 {
            self.opened.as_ref().map_or(0, |d| d.len() as u32)
        }
        fn image2d(&mut self, id: u32) -> ImportResult<ImageData2D> {
            ensure_opened(&*self, "image2D")?;
            let count = self.image2d_count();
            let byte = self
                .opened
                .as_ref()
                .and_then(|d| d.get(id as usize).copied())
                .ok_or_else(|| self.out_of_range("image2D", id, count))?;
            Ok(ImageData2D::new(PixelFormat::R8, [1, 1], vec![byte]))
        }
    }

    #[test]
    fn open_data_closes_previous() {
        let mut importer = BytesImporter::default();
        importer.open_data(b"abc").expect("open");
        assert_eq!(importer.image2d_count(), 3);
        importer.open_data(b"z").expect("reopen");
        assert_eq!(importer.image2d_count(), 1);
        assert_eq!(importer.image2d(0).expect("image").data, vec![b'z']);
        importer.close();
        assert!(!importer.is_opened());
    }

    #[test]
    fn open_file_goes_through_callback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut importer = BytesImporter::default();
        importer.set_file_callback(Some(Arc::new(move |path: &Path| {
            counter.fetch_add(1, Ordering::SeqCst);
            (path == Path::new("virtual.bin")).then(|| b"xy".to_vec())
        })));

        importer.open_file(Path::new("virtual.bin")).expect("open");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(importer.image2d_count(), 2);
    }

    #[test]
    fn callback_failure_is_reported() {
        let mut importer = BytesImporter::default();
        importer.set_file_callback(Some(Arc::new(|_: &Path| -> Option<Vec<u8>> { None })));

        let err = importer
            .open_file(Path::new("missing.bin"))
            .expect_err("callback returns nothing");
        assert!(matches!(err, ImportError::CannotOpenFile { .. }));
        assert_eq!(
            importer.diagnostics().render(Severity::Error),
            "Trade::BytesImporter::openFile(): cannot open file missing.bin\n"
        );
    }

    #[test]
    fn missing_file_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut importer = BytesImporter::default();
        let err = importer
            .open_file(&dir.path().join("nope.bin"))
            .expect_err("no such file");
        assert!(matches!(err, ImportError::CannotOpenFile { source: Some(_), .. }));
        assert!(!importer.is_opened());
    }

    #[test]
    fn getters_need_open_file() {
        let mut importer = BytesImporter::default();
        let err = importer.image2d(0).expect_err("not opened");
        assert_eq!(
            err.to_string(),
            "Trade::BytesImporter::image2D(): no file opened"
        );
        let err = importer.image3d(0).expect_err("no 3D images");
        assert!(matches!(err, ImportError::OutOfRange { count: 0, .. }));
    }
}
