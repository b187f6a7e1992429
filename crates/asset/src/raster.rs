//! Raster importers backed by the `image` crate.
//! One 2D image per file, 8 bits per channel.

use corelib::{Configuration, ImporterFeatures};
use image::{DynamicImage, ImageFormat};

use crate::image_data::{ImageData2D, PixelFormat};
use crate::importer::{ImportError, ImportResult, Importer, ImporterState, ensure_opened};

/// Option forcing the output channel count, `0` keeps the file's layout.
pub const FORCE_CHANNEL_COUNT: &str = "forceChannelCount";

pub struct RasterImporter {
    name: &'static str,
    format: ImageFormat,
    state: ImporterState,
    image: Option<ImageData2D>,
}

impl RasterImporter {
    /// Plugin names and the container each one decodes.
    pub const SUPPORTED: &'static [(&'static str, ImageFormat)] = &[
        ("PngImporter", ImageFormat::Png),
        ("TgaImporter", ImageFormat::Tga),
        ("BmpImporter", ImageFormat::Bmp),
        ("JpegImporter", ImageFormat::Jpeg),
        ("GifImporter", ImageFormat::Gif),
    ];

    pub fn new(name: &'static str, format: ImageFormat) -> Self {
        Self {
            name,
            format,
            state: ImporterState::with_configuration(Configuration::from_pairs([(
                FORCE_CHANNEL_COUNT,
                "0",
            )])),
            image: None,
        }
    }

    fn channel_count(&self) -> ImportResult<u8> {
        let raw = self.configuration().value(FORCE_CHANNEL_COUNT).unwrap_or("0");
        match raw.trim().parse::<u8>() {
            Ok(n) if n <= 4 => Ok(n),
            _ => Err(self.report(ImportError::InvalidOption {
                importer: self.origin(),
                key: FORCE_CHANNEL_COUNT.to_string(),
                value: raw.to_string(),
            })),
        }
    }
}

fn convert(decoded: DynamicImage, channels: u8) -> ImageData2D {
    let size = [decoded.width(), decoded.height()];
    let channels = match channels {
        0 => decoded.color().channel_count(),
        n => n,
    };
    match channels {
        1 => ImageData2D::new(PixelFormat::R8, size, decoded.into_luma8().into_raw()),
        2 => ImageData2D::new(PixelFormat::Rg8, size, decoded.into_luma_alpha8().into_raw()),
        3 => ImageData2D::new(PixelFormat::Rgb8, size, decoded.into_rgb8().into_raw()),
        _ => ImageData2D::new(PixelFormat::Rgba8, size, decoded.into_rgba8().into_raw()),
    }
}

impl Importer for RasterImporter {
    fn name(&self) -> &str {
        self.name
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
        self.image.is_some()
    }

    fn do_close(&mut self) {
        self.image = None;
    }

    fn do_open_data(&mut self, data: &[u8]) -> ImportResult<()> {
        let channels = self.channel_count()?;
        let decoded = image::load_from_memory_with_format(data, self.format).map_err(|source| {
            self.report(ImportError::Decode {
                importer: self.origin(),
                source,
            })
        })?;

        let image = convert(decoded, channels);
        if self.flags().verbose {
            self.diagnostics().info(format!(
                "{}::openData(): decoded {}x{} {:?} image",
                self.origin(),
                image.size[0],
                image.size[1],
                image.format
            ));
        }
        self.image = Some(image);
        Ok(())
    }

    fn image2d_count(&self) -> u32 {
        u32::from(self.image.is_some())
    }

    fn image2d(&mut self, id: u32) -> ImportResult<ImageData2D> {
        ensure_opened(&*self, "image2D")?;
        match (&self.image, id) {
            (Some(image), 0) => Ok(image.clone()),
            _ => Err(self.out_of_range("image2D", id, self.image2d_count())),
        }
    }
}
