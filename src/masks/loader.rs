use std::path::Path;

use image::GenericImageView;
use tracing::{debug, warn};

use crate::error::{AssetError, Result};
use crate::masks::types::{MaskImage, Resolution};
use crate::panorama::layout::is_mask_file;

/// Decodes mask assets and validates them against the target resolution
pub struct MaskLoader;

impl MaskLoader {
    /// Load one mask asset
    ///
    /// The raster must be PNG or BMP, exactly `resolution` in size and hold
    /// only the two binary gray levels. Nothing is resized or thresholded.
    pub fn load<P: AsRef<Path>>(path: P, resolution: Resolution) -> Result<MaskImage> {
        let path = path.as_ref();
        let name = path.display().to_string();

        if !is_mask_file(path) {
            return Err(AssetError::DecodeFailed {
                path: name,
                reason: "unsupported raster format (expected png or bmp)".to_string(),
            }
            .into());
        }

        let image = image::open(path).map_err(|e| {
            warn!("Failed to decode mask {:?}: {}", path, e);
            AssetError::DecodeFailed {
                path: name.clone(),
                reason: e.to_string(),
            }
        })?;

        let (width, height) = image.dimensions();
        resolution.ensure_matches(&name, width, height)?;

        let gray = match image {
            image::DynamicImage::ImageLuma8(img) => img,
            _ => image.to_luma8(),
        };

        let mask = MaskImage::from_binary_gray(&name, &gray)?;
        debug!("Loaded mask {:?}: {} covered pixels", path, mask.covered_pixels());
        Ok(mask)
    }
}
