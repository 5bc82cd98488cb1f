use thiserror::Error;

/// Main error type for the pano-masker library
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mask asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Dimension error: {0}")]
    Dimension(#[from] DimensionError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Configuration-specific errors (settings file and mask mapping)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse configuration file: {path} ({reason})")]
    ParseFailed { path: String, reason: String },

    #[error("No mapping found for panorama '{id}'")]
    UnknownPanorama { id: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Index {index} is assigned to both '{first}' and '{second}'")]
    IndexCollision {
        index: u32,
        first: String,
        second: String,
    },

    #[error("Key '{key}' appears in both static_masks and sequence_masks")]
    KeyCollision { key: String },
}

/// Mask asset errors raised while scanning and decoding the panorama tree
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Panorama directory not found: {path}")]
    PanoramaNotFound { path: String },

    #[error("No asset found for mask '{key}' (looked for {expected})")]
    Missing { key: String, expected: String },

    #[error("Mask '{key}' has more than one asset: {paths:?}")]
    Ambiguous { key: String, paths: Vec<String> },

    #[error("Sequence '{key}' has no frames in {path}")]
    EmptySequence { key: String, path: String },

    #[error("Sequence '{key}' has two files for frame {frame}")]
    DuplicateFrame { key: String, frame: u32 },

    #[error("Failed to decode mask {path}: {reason}")]
    DecodeFailed { path: String, reason: String },

    #[error("Mask {path} contains non-binary value {value}")]
    NonBinaryValue { path: String, value: u8 },
}

/// A raster did not match the fixed target resolution
#[derive(Error, Debug)]
#[error("{source_name} is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
pub struct DimensionError {
    pub source_name: String,
    pub expected_width: u32,
    pub expected_height: u32,
    pub actual_width: u32,
    pub actual_height: u32,
}

/// Errors while interpreting the watched state file
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Unrecognized state content: {content:?}")]
    Format { content: String },

    #[error("Sequence {sequence} is out of range (max {max})")]
    InvalidSequence { sequence: u32, max: u32 },
}

/// Errors looking up a loaded mask
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("No static mask with index {index}")]
    StaticIndex { index: u8 },

    #[error("Sequence {sequence} is not configured for this panorama")]
    Sequence { sequence: u32 },

    #[error("Sequence {sequence} has no frame {frame}")]
    Frame { sequence: u32, frame: u32 },
}

/// Convenience type alias for Results using CompositorError
pub type Result<T> = std::result::Result<T, CompositorError>;

impl CompositorError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Errors that must abort the process when they happen during startup
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Asset(_) | Self::Dimension(_) | Self::Io(_) | Self::Image(_)
        )
    }

    /// Check if this error is recoverable inside the monitoring loop
    ///
    /// Recoverable errors skip a single tick; the loop keeps polling.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The external writer may still be rewriting the file
            Self::State(_) => true,
            // A frame the state points at may simply not exist
            Self::Lookup(_) => true,
            // Output writes might work on retry
            Self::Io(_) | Self::Image(_) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            Self::Config(ConfigError::UnknownPanorama { id }) => {
                format!("Panorama '{}' is not listed in the mask mapping file.", id)
            }
            Self::Asset(AssetError::Missing { key, expected }) => {
                format!("Mask '{}' has no asset on disk. Expected {}.", key, expected)
            }
            Self::Dimension(e) => {
                format!(
                    "Mask '{}' must be exactly {}x{} pixels.",
                    e.source_name, e.expected_width, e.expected_height
                )
            }
            _ => self.to_string(),
        }
    }
}
