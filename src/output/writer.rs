use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::bmp::BmpEncoder;
use image::ColorType;
use tracing::{debug, info};

use crate::composition::CompositeResult;
use crate::error::{CompositorError, Result};

/// Extension of composed output files
pub const OUTPUT_EXTENSION: &str = "bmp";

/// Persists composites as sequentially numbered 8-bit indexed bitmaps
///
/// The counter starts at the highest number already present in the results
/// directory and only advances after a file is fully in place. Files are
/// written to a hidden temporary name and renamed, so a final name never
/// refers to a partial file.
#[derive(Debug)]
pub struct ResultWriter {
    dir: PathBuf,
    last_number: u64,
}

impl ResultWriter {
    /// Open the results directory, creating it if needed
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let last_number = Self::highest_existing(&dir)?;
        info!("Results directory {:?}, continuing after #{}", dir, last_number);

        Ok(Self { dir, last_number })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of the most recent successful write (0 if none)
    pub fn last_number(&self) -> u64 {
        self.last_number
    }

    /// Final path for output number `number`
    pub fn output_path(&self, number: u64) -> PathBuf {
        self.dir.join(format!("{:06}.{}", number, OUTPUT_EXTENSION))
    }

    /// Write a composite under the next number and return its path
    ///
    /// On failure the counter is untouched and the number is reused by the
    /// next successful write.
    pub fn write(&mut self, result: &CompositeResult) -> Result<PathBuf> {
        let number = self.last_number.checked_add(1).ok_or_else(|| {
            CompositorError::generic(format!("Output counter exhausted in {:?}", self.dir))
        })?;
        let path = self.output_path(number);
        let resolution = result.resolution();

        let mut temp = tempfile::Builder::new()
            .prefix(".pending-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;

        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            BmpEncoder::new(&mut writer).encode(
                result.pixels(),
                resolution.width,
                resolution.height,
                ColorType::L8,
            )?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| e.error)?;

        self.last_number = number;
        debug!("Wrote result #{} to {:?}", number, path);
        Ok(path)
    }

    /// Highest numbered output already present in `dir`
    fn highest_existing(dir: &Path) -> Result<u64> {
        let mut highest = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if let Some(number) = output_number(&path) {
                highest = highest.max(number);
            }
        }
        Ok(highest)
    }
}

/// Parse the sequence number of an output file name like `000042.bmp`
pub fn output_number(path: &Path) -> Option<u64> {
    let ext = path.extension()?.to_str()?;
    if !ext.eq_ignore_ascii_case(OUTPUT_EXTENSION) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}
