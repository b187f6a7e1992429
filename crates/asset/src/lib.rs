//! Image importers and format dispatch.
//! Importer contract, plugin registry, `image`-backed raster importers and
//! the format-detecting `AnyImageImporter`.

pub mod any_image;
pub mod image_data;
pub mod importer;
pub mod raster;
pub mod registry;

pub use any_image::{
    AnyImageImporter, DispatchError, DispatchOutcome, DispatchRequest, DispatchSource,
    FormatDispatcher, RuleTable,
};
pub use image_data::{ImageData1D, ImageData2D, ImageData3D, PixelFormat};
pub use importer::{FileCallback, ImportError, ImportResult, Importer, ImporterState};
pub use raster::RasterImporter;
pub use registry::{LoadError, LoadState, PluginRegistry};
