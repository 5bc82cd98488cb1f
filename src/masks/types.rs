use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::{AssetError, DimensionError, Result};

/// Gray level marking a covered pixel in a mask asset
pub const COVERED_LEVEL: u8 = 255;

/// Gray level marking an uncovered pixel in a mask asset
pub const EMPTY_LEVEL: u8 = 0;

/// Fixed raster size shared by every mask and every composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Fail with a [`DimensionError`] unless `width`x`height` matches exactly
    pub fn ensure_matches(&self, source_name: &str, width: u32, height: u32) -> Result<()> {
        if self.width != width || self.height != height {
            return Err(DimensionError {
                source_name: source_name.to_string(),
                expected_width: self.width,
                expected_height: self.height,
                actual_width: width,
                actual_height: height,
            }
            .into());
        }
        Ok(())
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Immutable boolean coverage mask
///
/// Assets on disk hold two gray levels ([`EMPTY_LEVEL`] and [`COVERED_LEVEL`]);
/// once loaded a mask only remembers which pixels are covered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskImage {
    resolution: Resolution,
    coverage: Vec<bool>,
}

impl MaskImage {
    /// Create a mask from row-major coverage flags
    pub fn from_coverage(resolution: Resolution, coverage: Vec<bool>) -> Option<Self> {
        (coverage.len() == resolution.pixel_count()).then_some(Self { resolution, coverage })
    }

    /// Create a mask covering nothing
    pub fn empty(resolution: Resolution) -> Self {
        Self {
            resolution,
            coverage: vec![false; resolution.pixel_count()],
        }
    }

    /// Create a mask whose coverage is decided per pixel
    pub fn from_fn<F>(resolution: Resolution, mut covered: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        let mut coverage = Vec::with_capacity(resolution.pixel_count());
        for y in 0..resolution.height {
            for x in 0..resolution.width {
                coverage.push(covered(x, y));
            }
        }
        Self { resolution, coverage }
    }

    /// Convert a two-level grayscale raster into a coverage mask
    ///
    /// `source_name` only labels errors. Any value other than the two
    /// accepted levels rejects the whole raster.
    pub fn from_binary_gray(source_name: &str, image: &GrayImage) -> Result<Self> {
        let resolution = Resolution::new(image.width(), image.height());
        let mut coverage = Vec::with_capacity(resolution.pixel_count());

        for &value in image.as_raw() {
            match value {
                COVERED_LEVEL => coverage.push(true),
                EMPTY_LEVEL => coverage.push(false),
                other => {
                    return Err(AssetError::NonBinaryValue {
                        path: source_name.to_string(),
                        value: other,
                    }
                    .into())
                }
            }
        }

        Ok(Self { resolution, coverage })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn width(&self) -> u32 {
        self.resolution.width
    }

    pub fn height(&self) -> u32 {
        self.resolution.height
    }

    /// Whether the pixel at (x, y) is covered
    pub fn is_covered(&self, x: u32, y: u32) -> bool {
        self.coverage[y as usize * self.resolution.width as usize + x as usize]
    }

    /// Row-major coverage flags
    pub fn coverage(&self) -> &[bool] {
        &self.coverage
    }

    /// Number of covered pixels
    pub fn covered_pixels(&self) -> usize {
        self.coverage.iter().filter(|&&c| c).count()
    }

    /// Render back to the two-level grayscale form used on disk
    pub fn to_gray_image(&self) -> GrayImage {
        let data = self
            .coverage
            .iter()
            .map(|&c| if c { COVERED_LEVEL } else { EMPTY_LEVEL })
            .collect();
        // Length always equals width * height
        GrayImage::from_raw(self.resolution.width, self.resolution.height, data)
            .unwrap_or_else(|| GrayImage::new(self.resolution.width, self.resolution.height))
    }
}
