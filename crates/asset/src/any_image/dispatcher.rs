//! Picks the importer plugin for a file or buffer, instantiates it and
//! forwards flags, options and the file callback before delegating the open.

use std::path::Path;
use std::sync::Arc;

use corelib::{Configuration, Diagnostics, ImporterFlags};

use super::error::{DispatchError, DispatchWarning, EntryPoint};
use super::rules::{RuleTable, signature_hex};
use crate::importer::{FileCallback, Importer};
use crate::registry::PluginRegistry;

#[derive(Clone, Copy, Debug)]
pub enum DispatchSource<'a> {
    File(&'a Path),
    Data(&'a [u8]),
}

impl DispatchSource<'_> {
    pub fn entry_point(&self) -> EntryPoint {
        match self {
            DispatchSource::File(_) => EntryPoint::OpenFile,
            DispatchSource::Data(_) => EntryPoint::OpenData,
        }
    }
}

/// One open attempt.
#[derive(Clone)]
pub struct DispatchRequest<'a> {
    pub source: DispatchSource<'a>,
    pub flags: ImporterFlags,
    pub configuration: &'a Configuration,
    pub file_callback: Option<FileCallback>,
}

impl<'a> DispatchRequest<'a> {
    pub fn file(path: &'a Path, configuration: &'a Configuration) -> Self {
        Self::new(DispatchSource::File(path), configuration)
    }

    pub fn data(data: &'a [u8], configuration: &'a Configuration) -> Self {
        Self::new(DispatchSource::Data(data), configuration)
    }

    fn new(source: DispatchSource<'a>, configuration: &'a Configuration) -> Self {
        Self {
            source,
            flags: ImporterFlags::default(),
            configuration,
            file_callback: None,
        }
    }

    pub fn with_flags(mut self, flags: ImporterFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_file_callback(mut self, callback: Option<FileCallback>) -> Self {
        self.file_callback = callback;
        self
    }
}

/// The opened delegate, owned by the caller, or why there is none.
pub type DispatchOutcome = Result<Box<dyn Importer>, DispatchError>;

/// Holds nothing mutable besides the diagnostics sink; one dispatcher may
/// serve any number of open calls, each getting its own delegate.
#[derive(Clone, Debug)]
pub struct FormatDispatcher {
    rules: Arc<RuleTable>,
    registry: Arc<PluginRegistry>,
    diagnostics: Diagnostics,
}

impl FormatDispatcher {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self::with_rules(registry, RuleTable::builtin())
    }

    pub fn with_rules(registry: Arc<PluginRegistry>, rules: RuleTable) -> Self {
        Self {
            rules: Arc::new(rules),
            registry,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn set_diagnostics(&mut self, diagnostics: Diagnostics) {
        self.diagnostics = diagnostics;
    }

    /// Plugin the request would be dispatched to, without opening anything.
    pub fn detect(&self, source: DispatchSource<'_>) -> Result<&'static str, DispatchError> {
        match source {
            DispatchSource::File(path) => {
                self.rules
                    .plugin_for_path(path)
                    .ok_or_else(|| DispatchError::UnknownExtension {
                        path: path.to_path_buf(),
                    })
            }
            DispatchSource::Data(data) => {
                if data.is_empty() {
                    return Err(DispatchError::EmptyData);
                }
                self.rules
                    .plugin_for_signature(data)
                    .ok_or_else(|| DispatchError::UnknownSignature {
                        signature: signature_hex(data),
                    })
            }
        }
    }

    pub fn open_file(
        &self,
        path: &Path,
        flags: ImporterFlags,
        configuration: &Configuration,
    ) -> DispatchOutcome {
        self.open(DispatchRequest::file(path, configuration).with_flags(flags))
    }

    pub fn open_data(
        &self,
        data: &[u8],
        flags: ImporterFlags,
        configuration: &Configuration,
    ) -> DispatchOutcome {
        self.open(DispatchRequest::data(data, configuration).with_flags(flags))
    }

    /// Detect, instantiate, configure and open. On any failure the delegate
    /// is dropped before returning.
    pub fn open(&self, request: DispatchRequest<'_>) -> DispatchOutcome {
        self.dispatch(request).map(|(_, delegate)| delegate)
    }

    /// Same as [`FormatDispatcher::open`], also returning the detected plugin
    /// name (the delegate may report a different one if it is an alias).
    pub fn dispatch(
        &self,
        request: DispatchRequest<'_>,
    ) -> Result<(&'static str, Box<dyn Importer>), DispatchError> {
        let entry_point = request.source.entry_point();
        let plugin = self.detect(request.source).map_err(|e| self.fail(e))?;

        let mut delegate = self.registry.instantiate(plugin).map_err(|reason| {
            self.diagnostics.error(reason.to_string());
            self.fail(DispatchError::PluginUnavailable {
                entry_point,
                plugin: plugin.to_string(),
                reason,
            })
        })?;

        if request.flags.verbose {
            self.diagnostics
                .info(format!("Trade::AnyImageImporter::{entry_point}(): using {plugin}"));
        }

        delegate.set_flags(request.flags);
        delegate.set_diagnostics(self.diagnostics.clone());
        for warning in propagate_configuration(
            request.configuration,
            delegate.as_mut(),
            entry_point,
            plugin,
        ) {
            self.diagnostics.warning(warning.to_string());
        }
        delegate.set_file_callback(request.file_callback.clone());

        let opened = match request.source {
            DispatchSource::File(path) => delegate.open_file(path),
            DispatchSource::Data(data) => delegate.open_data(data),
        };
        opened.map_err(|e| DispatchError::Delegate(Box::new(e)))?;

        log::debug!("{plugin} opened the {entry_point} request");
        Ok((plugin, delegate))
    }

    fn fail(&self, error: DispatchError) -> DispatchError {
        self.diagnostics.error(error.to_string());
        error
    }
}

/// Copy options the delegate knows, return a warning for each one it doesn't.
fn propagate_configuration(
    source: &Configuration,
    delegate: &mut dyn Importer,
    entry_point: EntryPoint,
    plugin: &str,
) -> Vec<DispatchWarning> {
    let mut warnings = Vec::new();
    for (key, value) in source.iter() {
        let target = delegate.configuration_mut();
        if target.has_value(key) {
            target.set_value(key, value);
        } else {
            warnings.push(DispatchWarning::UnrecognizedOption {
                entry_point,
                key: key.to_string(),
                plugin: plugin.to_string(),
            });
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::Severity;

    use crate::registry::LoadError;

    fn dispatcher() -> FormatDispatcher {
        FormatDispatcher::new(Arc::new(PluginRegistry::new()))
    }

    #[test]
    fn empty_data_is_reported_before_anything_else() {
        let d = dispatcher();
        let err = d
            .open_data(b"", ImporterFlags::VERBOSE, &Configuration::new())
            .err()
            .expect("empty");
        assert!(matches!(err, DispatchError::EmptyData));
        assert_eq!(
            d.diagnostics().render(Severity::Error),
            "Trade::AnyImageImporter::openData(): file is empty\n"
        );
        assert_eq!(d.diagnostics().render(Severity::Info), "");
    }

    #[test]
    fn unknown_extension_message() {
        let d = dispatcher();
        let err = d
            .open_file(Path::new("image.xcf"), ImporterFlags::NONE, &Configuration::new())
            .err()
            .expect("unknown");
        assert!(matches!(err, DispatchError::UnknownExtension { .. }));
        assert_eq!(
            d.diagnostics().render(Severity::Error),
            "Trade::AnyImageImporter::openFile(): cannot determine the format of image.xcf\n"
        );
    }

    #[test]
    fn missing_plugin_names_entry_point() {
        let d = dispatcher();
        let err = d
            .open_data(b"GIF89a....", ImporterFlags::NONE, &Configuration::new())
            .err()
            .expect("no plugins registered");
        assert_eq!(err.plugin(), Some("GifImporter"));
        assert_eq!(
            d.diagnostics().render(Severity::Error),
            "PluginManager::Manager::load(): plugin GifImporter was not found\n\
             Trade::AnyImageImporter::openData(): cannot load the GifImporter plugin\n"
        );
    }

    #[test]
    fn failing_factory_reports_reason_then_plugin() {
        let mut registry = PluginRegistry::new();
        registry.register_fallible("GifImporter", || Err("no decoder compiled in".to_string()));
        let d = FormatDispatcher::new(Arc::new(registry));

        let err = d
            .open_file(Path::new("anim.gif"), ImporterFlags::VERBOSE, &Configuration::new())
            .err()
            .expect("factory fails");
        assert!(matches!(
            err,
            DispatchError::PluginUnavailable {
                entry_point: EntryPoint::OpenFile,
                reason: LoadError::InstantiationFailed { .. },
                ..
            }
        ));
        assert_eq!(
            d.diagnostics().render(Severity::Error),
            "PluginManager::Manager::instantiate(): plugin GifImporter failed to instantiate: no decoder compiled in\n\
             Trade::AnyImageImporter::openFile(): cannot load the GifImporter plugin\n"
        );
        assert_eq!(d.diagnostics().render(Severity::Info), "");
    }

    #[test]
    fn detect_does_not_touch_registry() {
        let d = dispatcher();
        assert_eq!(
            d.detect(DispatchSource::File(Path::new("a.TIFF"))).expect("tiff"),
            "TiffImporter"
        );
        assert_eq!(
            d.detect(DispatchSource::Data(b"DDS \x00")).expect("dds"),
            "DdsImporter"
        );
        assert!(d.diagnostics().is_empty());
    }
}
