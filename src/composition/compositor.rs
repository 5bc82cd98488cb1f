use image::GrayImage;
use tracing::{debug, trace};

use crate::{
    error::{LookupError, Result},
    masks::{MaskImage, MaskStore, Resolution},
    panorama::PanoramaConfig,
    state::StateRecord,
};

/// Index of pixels no mask covers
pub const BACKGROUND_INDEX: u8 = 0;

/// Where a composited layer came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerSource {
    Static { key: String },
    Sequence { sequence: u32, frame: u32 },
}

/// A layer looked up and ready to paint
#[derive(Debug, Clone)]
pub struct ResolvedLayer<'a> {
    pub source: LayerSource,
    pub index: u8,
    pub mask: &'a MaskImage,
}

/// One applied layer and how many pixels it claimed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerStats {
    pub source: LayerSource,
    pub index: u8,
    pub pixels_set: usize,
}

/// Indexed composite for one state tick
///
/// Each pixel holds the index of the topmost mask covering it, or
/// [`BACKGROUND_INDEX`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeResult {
    resolution: Resolution,
    state: StateRecord,
    pixels: Vec<u8>,
    layers: Vec<LayerStats>,
}

impl CompositeResult {
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// The state record this composite was built for
    pub fn state(&self) -> StateRecord {
        self.state
    }

    /// Row-major index buffer
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        self.pixels[y as usize * self.resolution.width as usize + x as usize]
    }

    /// Layers in the order they were applied
    pub fn layers(&self) -> &[LayerStats] {
        &self.layers
    }

    /// Number of pixels whose final value is `index`
    pub fn count_index(&self, index: u8) -> usize {
        self.pixels.iter().filter(|&&p| p == index).count()
    }

    /// Consume the result into an 8-bit single channel image
    pub fn into_image(self) -> GrayImage {
        let (width, height) = (self.resolution.width, self.resolution.height);
        // The buffer is always width * height long
        GrayImage::from_raw(width, height, self.pixels).unwrap_or_else(|| GrayImage::new(width, height))
    }
}

/// Merges static and dynamic masks into one indexed buffer
///
/// Layering, bottom to top:
/// 1. background ([`BACKGROUND_INDEX`])
/// 2. static masks in ascending index order, later ones overwrite earlier ones
/// 3. the active sequence frame, if any, overwrites everything it covers
#[derive(Debug, Clone, Copy)]
pub struct Compositor {
    resolution: Resolution,
}

impl Compositor {
    pub fn new(resolution: Resolution) -> Self {
        Self { resolution }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Compose the masks selected by `state`
    pub fn compose(
        &self,
        config: &PanoramaConfig,
        store: &MaskStore,
        state: &StateRecord,
    ) -> Result<CompositeResult> {
        let layers = self.resolve(config, store, state)?;
        Ok(self.merge(*state, &layers))
    }

    /// Look up every layer `state` needs, bottom to top
    ///
    /// Fails on the first missing mask or dimension mismatch, before any
    /// pixel is written.
    pub fn resolve<'a>(
        &self,
        config: &PanoramaConfig,
        store: &'a MaskStore,
        state: &StateRecord,
    ) -> Result<Vec<ResolvedLayer<'a>>> {
        let mut layers = Vec::with_capacity(config.static_masks().len() + 1);

        for binding in config.static_masks() {
            let mask = store.get_static(binding.index)?;
            self.check_dimensions(&format!("static mask '{}'", binding.key), mask)?;
            layers.push(ResolvedLayer {
                source: LayerSource::Static { key: binding.key.clone() },
                index: binding.index,
                mask,
            });
        }

        if let StateRecord::Active { sequence, frame } = *state {
            let binding = config
                .sequence_binding(sequence)
                .ok_or(LookupError::Sequence { sequence })?;
            let mask = store.get_sequence_frame(sequence, frame)?;
            self.check_dimensions(&format!("sequence {} frame {}", sequence, frame), mask)?;
            layers.push(ResolvedLayer {
                source: LayerSource::Sequence { sequence, frame },
                index: binding.index,
                mask,
            });
        }

        debug!(
            "Processing order: {:?}",
            layers.iter().map(|l| l.index).collect::<Vec<_>>()
        );
        Ok(layers)
    }

    /// Paint resolved layers in order onto a background buffer
    pub fn merge(&self, state: StateRecord, layers: &[ResolvedLayer<'_>]) -> CompositeResult {
        let mut pixels = vec![BACKGROUND_INDEX; self.resolution.pixel_count()];
        let mut stats = Vec::with_capacity(layers.len());

        for layer in layers {
            let pixels_set = Self::apply(&mut pixels, layer.mask, layer.index);
            trace!("Set {} pixels to index {} ({:?})", pixels_set, layer.index, layer.source);
            stats.push(LayerStats {
                source: layer.source.clone(),
                index: layer.index,
                pixels_set,
            });
        }

        CompositeResult {
            resolution: self.resolution,
            state,
            pixels,
            layers: stats,
        }
    }

    fn check_dimensions(&self, name: &str, mask: &MaskImage) -> Result<()> {
        self.resolution.ensure_matches(name, mask.width(), mask.height())
    }

    /// Write `index` into every covered pixel, returning how many were set
    fn apply(pixels: &mut [u8], mask: &MaskImage, index: u8) -> usize {
        let mut set = 0;
        for (pixel, &covered) in pixels.iter_mut().zip(mask.coverage()) {
            if covered {
                *pixel = index;
                set += 1;
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompositorError;
    use crate::panorama::MappingFile;

    const RES: Resolution = Resolution::new(8, 4);

    fn config(json: &str) -> PanoramaConfig {
        MappingFile::from_json(json).unwrap().panorama("p").unwrap()
    }

    /// Static "10" -> 1 covers the left half, "20" -> 3 covers columns 2..6,
    /// sequence 35 -> 2 covers the top row (frame 1) or nothing (frame 2)
    fn fixture() -> (PanoramaConfig, MaskStore) {
        let config = config(
            r#"{"p": {"static_masks": {"20": 3, "10": 1}, "sequence_masks": {"35": 2}}}"#,
        );
        let mut store = MaskStore::new(RES, true);
        store.insert_static("10", 1, MaskImage::from_fn(RES, |x, _| x < 4)).unwrap();
        store.insert_static("20", 3, MaskImage::from_fn(RES, |x, _| (2..6).contains(&x))).unwrap();
        store.insert_frame(35, 2, 1, MaskImage::from_fn(RES, |_, y| y == 0)).unwrap();
        store.insert_frame(35, 2, 2, MaskImage::empty(RES)).unwrap();
        (config, store)
    }

    #[test]
    fn test_static_layering_is_index_ascending() {
        let (config, store) = fixture();
        let result = Compositor::new(RES).compose(&config, &store, &StateRecord::Cleared).unwrap();

        // Overlap of index 1 and index 3 takes the higher index
        assert_eq!(result.pixel(3, 2), 3);
        assert_eq!(result.pixel(1, 2), 1);
        assert_eq!(result.pixel(5, 2), 3);
        assert_eq!(result.pixel(7, 2), BACKGROUND_INDEX);

        let order: Vec<u8> = result.layers().iter().map(|l| l.index).collect();
        assert_eq!(order, vec![1, 3]);
    }

    #[test]
    fn test_dynamic_layer_is_topmost() {
        let (config, store) = fixture();
        let state = StateRecord::Active { sequence: 35, frame: 1 };
        let result = Compositor::new(RES).compose(&config, &store, &state).unwrap();

        for x in 0..RES.width {
            assert_eq!(result.pixel(x, 0), 2, "column {}", x);
        }
        assert_eq!(result.pixel(3, 1), 3);
        assert_eq!(result.pixel(7, 1), BACKGROUND_INDEX);
        assert_eq!(result.count_index(2), 8);
        assert_eq!(
            result.layers().last(),
            Some(&LayerStats {
                source: LayerSource::Sequence { sequence: 35, frame: 1 },
                index: 2,
                pixels_set: 8,
            })
        );
    }

    #[test]
    fn test_composition_is_deterministic() {
        let (config, store) = fixture();
        let compositor = Compositor::new(RES);
        let state = StateRecord::Active { sequence: 35, frame: 1 };

        let first = compositor.compose(&config, &store, &state).unwrap();
        let second = compositor.compose(&config, &store, &state).unwrap();
        assert_eq!(first.pixels(), second.pixels());
    }

    #[test]
    fn test_single_mask_footprint_is_exact() {
        let config = config(r#"{"p": {"static_masks": {"10": 7}}}"#);
        let footprint = MaskImage::from_fn(RES, |x, y| (x * 3 + y) % 5 == 0);
        let mut store = MaskStore::new(RES, true);
        store.insert_static("10", 7, footprint.clone()).unwrap();

        let result = Compositor::new(RES).compose(&config, &store, &StateRecord::Cleared).unwrap();
        for (value, &covered) in result.pixels().iter().zip(footprint.coverage()) {
            assert_eq!(*value, if covered { 7 } else { BACKGROUND_INDEX });
        }
    }

    #[test]
    fn test_unknown_sequence() {
        let (config, store) = fixture();
        let state = StateRecord::Active { sequence: 36, frame: 1 };
        assert!(matches!(
            Compositor::new(RES).compose(&config, &store, &state),
            Err(CompositorError::Lookup(LookupError::Sequence { sequence: 36 }))
        ));
    }

    #[test]
    fn test_missing_frame() {
        let (config, _) = fixture();
        let mut store = MaskStore::new(RES, false);
        store.insert_static("10", 1, MaskImage::empty(RES)).unwrap();
        store.insert_static("20", 3, MaskImage::empty(RES)).unwrap();
        store.insert_frame(35, 2, 1, MaskImage::empty(RES)).unwrap();

        let state = StateRecord::Active { sequence: 35, frame: 9 };
        assert!(matches!(
            Compositor::new(RES).compose(&config, &store, &state),
            Err(CompositorError::Lookup(LookupError::Frame { sequence: 35, frame: 9 }))
        ));
    }

    #[test]
    fn test_store_resolution_mismatch_fails_fast() {
        let (config, store) = fixture();
        let result = Compositor::new(Resolution::new(8, 5)).compose(&config, &store, &StateRecord::Cleared);
        assert!(matches!(result, Err(CompositorError::Dimension(_))));
    }

    #[test]
    fn test_resolve_orders_dynamic_last() {
        let (config, store) = fixture();
        let state = StateRecord::Active { sequence: 35, frame: 2 };
        let layers = Compositor::new(RES).resolve(&config, &store, &state).unwrap();

        let indexes: Vec<u8> = layers.iter().map(|l| l.index).collect();
        assert_eq!(indexes, vec![1, 3, 2]);
        assert_eq!(layers[2].source, LayerSource::Sequence { sequence: 35, frame: 2 });
    }

    #[test]
    fn test_into_image() {
        let (config, store) = fixture();
        let result = Compositor::new(RES).compose(&config, &store, &StateRecord::Cleared).unwrap();
        let image = result.clone().into_image();
        assert_eq!(image.dimensions(), (8, 4));
        assert_eq!(image.get_pixel(5, 3).0[0], result.pixel(5, 3));
    }
}
