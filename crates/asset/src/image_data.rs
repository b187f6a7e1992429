//! Imported image data in CPU-friendly layout.
//! Tightly packed rows, no padding.

/// Pixel layouts importers can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    R8,
    Rg8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    /// Number of bytes per pixel for the format.
    pub const fn pixel_size(self) -> u32 {
        match self {
            PixelFormat::R8 => 1,
            PixelFormat::Rg8 => 2,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

macro_rules! image_data {
    ($(#[$doc:meta])* $name:ident, $size:ty, |$s:ident| $count:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name {
            pub format: PixelFormat,
            pub size: $size,
            pub data: Vec<u8>,
        }

        impl $name {
            /// Panics if `data` doesn't match `size` and `format`.
            pub fn new(format: PixelFormat, size: $size, data: Vec<u8>) -> Self {
                assert_eq!(
                    data.len() as u64,
                    Self::count_pixels(&size) * format.pixel_size() as u64,
                    "Data size doesn't match {:?} format",
                    format
                );
                Self { format, size, data }
            }

            /// Total pixel count.
            pub fn pixel_count(&self) -> u64 {
                Self::count_pixels(&self.size)
            }

            fn count_pixels($s: &$size) -> u64 {
                $count
            }
        }
    };
}

image_data!(
    /// One-dimensional image, `size` is the width.
    ImageData1D,
    u32,
    |w| u64::from(*w)
);
image_data!(
    /// Two-dimensional image, `size` is `[width, height]`.
    ImageData2D,
    [u32; 2],
    |s| s.iter().map(|&v| u64::from(v)).product()
);
image_data!(
    /// Three-dimensional image, `size` is `[width, height, depth]`.
    ImageData3D,
    [u32; 3],
    |s| s.iter().map(|&v| u64::from(v)).product()
);
