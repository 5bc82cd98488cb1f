use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{AssetError, Result};
use crate::panorama::PanoramaConfig;

/// Raster encodings accepted for mask assets
pub const MASK_EXTENSIONS: &[&str] = &["png", "bmp"];

/// A static mask resolved to its file
#[derive(Debug, Clone)]
pub struct StaticAsset {
    pub key: String,
    pub index: u8,
    pub path: PathBuf,
}

/// A sequence resolved to its frame files
#[derive(Debug, Clone)]
pub struct SequenceAsset {
    pub sequence: u32,
    pub index: u8,
    pub dir: PathBuf,
    /// Frame number -> file, ascending
    pub frames: BTreeMap<u32, PathBuf>,
}

/// Snapshot of every asset a panorama needs, taken once at startup
///
/// Layout on disk:
///
/// ```text
/// <landscapes>/<pano>/<pano>_<key>.png|bmp           static mask
/// <landscapes>/<pano>/<pano>_<seq>/<name>_<frame>.bmp sequence frames
/// ```
#[derive(Debug, Clone)]
pub struct PanoramaLayout {
    pub root: PathBuf,
    pub statics: Vec<StaticAsset>,
    pub sequences: Vec<SequenceAsset>,
}

impl PanoramaLayout {
    /// Resolve every configured key to existing files
    pub fn scan(root: &Path, config: &PanoramaConfig) -> Result<Self> {
        if !root.is_dir() {
            return Err(AssetError::PanoramaNotFound {
                path: root.display().to_string(),
            }
            .into());
        }

        info!("Scanning panorama directory {:?}", root);

        let mut statics = Vec::with_capacity(config.static_masks().len());
        for binding in config.static_masks() {
            let path = Self::find_static(root, config.id(), &binding.key)?;
            debug!("Static mask '{}' -> {:?}", binding.key, path);
            statics.push(StaticAsset {
                key: binding.key.clone(),
                index: binding.index,
                path,
            });
        }

        let mut sequences = Vec::with_capacity(config.sequence_masks().len());
        for binding in config.sequence_masks() {
            let key = binding.sequence.to_string();
            let dir = root.join(format!("{}_{}", config.id(), key));
            if !dir.is_dir() {
                return Err(AssetError::Missing {
                    key,
                    expected: format!("directory {}", dir.display()),
                }
                .into());
            }

            let frames = Self::scan_frames(&dir, &key)?;
            debug!("Sequence {} -> {} frames in {:?}", binding.sequence, frames.len(), dir);
            sequences.push(SequenceAsset {
                sequence: binding.sequence,
                index: binding.index,
                dir,
                frames,
            });
        }

        info!(
            "Found {} static masks and {} sequences ({} frames)",
            statics.len(),
            sequences.len(),
            sequences.iter().map(|s| s.frames.len()).sum::<usize>()
        );

        Ok(Self {
            root: root.to_path_buf(),
            statics,
            sequences,
        })
    }

    fn find_static(root: &Path, panorama_id: &str, key: &str) -> Result<PathBuf> {
        let candidates: Vec<PathBuf> = MASK_EXTENSIONS
            .iter()
            .map(|ext| root.join(format!("{}_{}.{}", panorama_id, key, ext)))
            .filter(|p| p.is_file())
            .collect();

        match candidates.as_slice() {
            [single] => Ok(single.clone()),
            [] => Err(AssetError::Missing {
                key: key.to_string(),
                expected: root
                    .join(format!("{}_{}.{{png,bmp}}", panorama_id, key))
                    .display()
                    .to_string(),
            }
            .into()),
            many => Err(AssetError::Ambiguous {
                key: key.to_string(),
                paths: many.iter().map(|p| p.display().to_string()).collect(),
            }
            .into()),
        }
    }

    fn scan_frames(dir: &Path, key: &str) -> Result<BTreeMap<u32, PathBuf>> {
        let mut frames = BTreeMap::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || !is_mask_file(&path) {
                continue;
            }

            let Some(frame) = frame_number(&path) else {
                warn!("Skipping frame with unparsable name: {:?}", path);
                continue;
            };

            if frames.insert(frame, path).is_some() {
                return Err(AssetError::DuplicateFrame {
                    key: key.to_string(),
                    frame,
                }
                .into());
            }
        }

        if frames.is_empty() {
            return Err(AssetError::EmptySequence {
                key: key.to_string(),
                path: dir.display().to_string(),
            }
            .into());
        }

        Ok(frames)
    }
}

/// Check the extension against [`MASK_EXTENSIONS`], ignoring case
pub fn is_mask_file(path: &Path) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => MASK_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

/// Parse the frame number from a name like `pano_35_0007.bmp` or `12.png`
pub fn frame_number(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    stem.rsplit('_').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompositorError;
    use crate::panorama::MappingFile;
    use tempfile::tempdir;

    fn config(json: &str) -> PanoramaConfig {
        MappingFile::from_json(json).unwrap().panorama("p").unwrap()
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_frame_number() {
        assert_eq!(frame_number(Path::new("p_35_0007.bmp")), Some(7));
        assert_eq!(frame_number(Path::new("12.png")), Some(12));
        assert_eq!(frame_number(Path::new("thumbs.db")), None);
        assert_eq!(frame_number(Path::new("p_35_last.bmp")), None);
    }

    #[test]
    fn test_is_mask_file() {
        assert!(is_mask_file(Path::new("a.png")));
        assert!(is_mask_file(Path::new("a.BMP")));
        assert!(!is_mask_file(Path::new("a.jpg")));
        assert!(!is_mask_file(Path::new("a")));
    }

    #[test]
    fn test_scan_resolves_assets() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("p_10.png"));
        touch(&root.join("p_35/p_35_1.bmp"));
        touch(&root.join("p_35/p_35_2.bmp"));
        touch(&root.join("p_35/notes.txt"));
        touch(&root.join("p_35/p_35_final.bmp"));

        let layout = PanoramaLayout::scan(
            root,
            &config(r#"{"p": {"static_masks": {"10": 1}, "sequence_masks": {"35": 2}}}"#),
        )
        .unwrap();

        assert_eq!(layout.statics.len(), 1);
        assert_eq!(layout.statics[0].path, root.join("p_10.png"));
        assert_eq!(layout.sequences.len(), 1);
        let frames: Vec<u32> = layout.sequences[0].frames.keys().copied().collect();
        assert_eq!(frames, vec![1, 2]);
    }

    #[test]
    fn test_missing_static_asset() {
        let dir = tempdir().unwrap();
        let result = PanoramaLayout::scan(dir.path(), &config(r#"{"p": {"static_masks": {"10": 1}}}"#));
        assert!(matches!(result, Err(CompositorError::Asset(AssetError::Missing { .. }))));
    }

    #[test]
    fn test_ambiguous_static_asset() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("p_10.png"));
        touch(&dir.path().join("p_10.bmp"));

        let result = PanoramaLayout::scan(dir.path(), &config(r#"{"p": {"static_masks": {"10": 1}}}"#));
        assert!(matches!(result, Err(CompositorError::Asset(AssetError::Ambiguous { .. }))));
    }

    #[test]
    fn test_empty_sequence_directory() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("p_35")).unwrap();

        let result = PanoramaLayout::scan(dir.path(), &config(r#"{"p": {"sequence_masks": {"35": 1}}}"#));
        assert!(matches!(result, Err(CompositorError::Asset(AssetError::EmptySequence { .. }))));
    }

    #[test]
    fn test_duplicate_frame_numbers() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("p_35/a_3.bmp"));
        touch(&dir.path().join("p_35/b_3.png"));

        let result = PanoramaLayout::scan(dir.path(), &config(r#"{"p": {"sequence_masks": {"35": 1}}}"#));
        assert!(matches!(
            result,
            Err(CompositorError::Asset(AssetError::DuplicateFrame { frame: 3, .. }))
        ));
    }

    #[test]
    fn test_missing_panorama_directory() {
        let dir = tempdir().unwrap();
        let result = PanoramaLayout::scan(&dir.path().join("nope"), &config(r#"{"p": {}}"#));
        assert!(matches!(
            result,
            Err(CompositorError::Asset(AssetError::PanoramaNotFound { .. }))
        ));
    }
}
