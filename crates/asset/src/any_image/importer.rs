//! `AnyImageImporter`: the importer-shaped facade over [`FormatDispatcher`].

use std::path::Path;
use std::sync::Arc;

use corelib::{Diagnostics, ImporterFeatures};

use super::dispatcher::{DispatchRequest, FormatDispatcher};
use super::rules::RuleTable;
use crate::image_data::{ImageData1D, ImageData2D, ImageData3D};
use crate::importer::{ImportError, ImportResult, Importer, ImporterState, ensure_opened};
use crate::registry::PluginRegistry;

/// Importer that detects the format and forwards everything to the plugin
/// that handles it.
///
/// Options set through [`Importer::configuration_mut`] are copied to the
/// delegate on open; keys the delegate doesn't know produce a warning.
/// With a file callback set, files are read through it and detected by
/// signature rather than by extension.
pub struct AnyImageImporter {
    dispatcher: FormatDispatcher,
    state: ImporterState,
    delegate: Option<(&'static str, Box<dyn Importer>)>,
}

impl AnyImageImporter {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self::with_rules(registry, RuleTable::builtin())
    }

    pub fn with_rules(registry: Arc<PluginRegistry>, rules: RuleTable) -> Self {
        let state = ImporterState::default();
        let mut dispatcher = FormatDispatcher::with_rules(registry, rules);
        dispatcher.set_diagnostics(state.diagnostics.clone());
        Self {
            dispatcher,
            state,
            delegate: None,
        }
    }

    /// Name of the plugin the currently opened file was dispatched to.
    pub fn delegate_name(&self) -> Option<&'static str> {
        self.delegate.as_ref().map(|(name, _)| *name)
    }

    pub fn delegate(&self) -> Option<&dyn Importer> {
        self.delegate.as_ref().map(|(_, d)| d.as_ref())
    }

    fn open_request(&mut self, request: DispatchRequest<'_>) -> ImportResult<()> {
        self.delegate = Some(self.dispatcher.dispatch(request)?);
        Ok(())
    }

    fn delegate_mut(&mut self, operation: &'static str) -> ImportResult<&mut dyn Importer> {
        ensure_opened(&*self, operation)?;
        match self.delegate.as_mut() {
            Some((_, delegate)) => Ok(delegate.as_mut()),
            None => Err(ImportError::NotOpened {
                importer: "Trade::AnyImageImporter".to_string(),
                operation,
            }),
        }
    }
}

impl Importer for AnyImageImporter {
    fn name(&self) -> &str {
        "AnyImageImporter"
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

    fn set_diagnostics(&mut self, diagnostics: Diagnostics) {
        self.dispatcher.set_diagnostics(diagnostics.clone());
        self.state.diagnostics = diagnostics;
    }

    fn do_is_opened(&self) -> bool {
        self.delegate.is_some()
    }

    fn do_close(&mut self) {
        self.delegate = None;
    }

    fn do_open_file(&mut self, path: &Path) -> ImportResult<()> {
        let configuration = self.state.configuration.clone();
        let request = DispatchRequest::file(path, &configuration)
            .with_flags(self.state.flags)
            .with_file_callback(self.state.file_callback.clone());
        self.open_request(request)
    }

    fn do_open_data(&mut self, data: &[u8]) -> ImportResult<()> {
        let configuration = self.state.configuration.clone();
        let request = DispatchRequest::data(data, &configuration)
            .with_flags(self.state.flags)
            .with_file_callback(self.state.file_callback.clone());
        self.open_request(request)
    }

    fn image1d_count(&self) -> u32 {
        self.delegate().map_or(0, |d| d.image1d_count())
    }

    fn image1d(&mut self, id: u32) -> ImportResult<ImageData1D> {
        self.delegate_mut("image1D")?.image1d(id)
    }

    fn image2d_count(&self) -> u32 {
        self.delegate().map_or(0, |d| d.image2d_count())
    }

    fn image2d(&mut self, id: u32) -> ImportResult<ImageData2D> {
        self.delegate_mut("image2D")?.image2d(id)
    }

    fn image3d_count(&self) -> u32 {
        self.delegate().map_or(0, |d| d.image3d_count())
    }

    fn image3d(&mut self, id: u32) -> ImportResult<ImageData3D> {
        self.delegate_mut("image3D")?.image3d(id)
    }
}
