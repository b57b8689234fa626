//! Error types for `bgsplit`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `bgsplit` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Configuration Errors ====================
    /// The splitter configuration failed validation.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        message: String,
    },

    /// The configuration file could not be parsed.
    #[error("failed to parse config {path}: {message}")]
    ConfigParse {
        /// The config file that failed to parse.
        path: PathBuf,
        /// The parser error message.
        message: String,
    },

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    // ==================== Grid Planning Errors ====================
    /// The image has a zero dimension.
    #[error("invalid image dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },

    /// The capacity limit leaves no room for a tile once padding is applied.
    #[error("texture limit {limit}px is too small for padding {padding}")]
    CapacityTooSmall {
        /// The aggregated client texture limit.
        limit: u32,
        /// The safety margin fraction applied to the limit.
        padding: f64,
    },

    /// The padding fraction is outside `(0, 1]`.
    #[error("padding must be in (0, 1], got {padding}")]
    InvalidPadding {
        /// The rejected padding fraction.
        padding: f64,
    },

    // ==================== Image Errors ====================
    /// The source image could not be loaded or decoded.
    #[error("image load failed for {src}: {message}")]
    ImageLoad {
        /// The image reference that failed to load.
        src: String,
        /// The decoder or transport error message.
        message: String,
    },

    /// A tile could not be encoded.
    #[error("failed to encode tile {col},{row}: {message}")]
    TileEncode {
        /// Grid column of the tile.
        col: u32,
        /// Grid row of the tile.
        row: u32,
        /// The encoder error message.
        message: String,
    },

    /// Image library error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    // ==================== Storage Errors ====================
    /// The directory already exists (benign for directory creation).
    #[error("directory already exists: {dir}")]
    DirectoryExists {
        /// The directory that already exists.
        dir: String,
    },

    /// The tile directory could not be created.
    #[error("failed to create directory {dir}: {message}")]
    DirectoryCreate {
        /// The directory being created.
        dir: String,
        /// The storage error message.
        message: String,
    },

    /// A tile blob could not be uploaded.
    #[error("failed to upload {file_name}: {message}")]
    Upload {
        /// The tile file name.
        file_name: String,
        /// The storage error message.
        message: String,
    },

    // ==================== Scene / Participant Store Errors ====================
    /// The scene does not exist in the document store.
    #[error("scene not found: {0}")]
    SceneNotFound(String),

    /// A scene document mutation failed.
    #[error("scene store error: {message}")]
    SceneStore {
        /// The store error message.
        message: String,
    },

    /// A participant record could not be read or written.
    #[error("participant store error: {message}")]
    ParticipantStore {
        /// The store error message.
        message: String,
    },

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ==================== Pipeline Errors ====================
    /// A split failed and the compensating rollback also failed.
    #[error("{source} (rollback incomplete: {rollback})")]
    RollbackFailed {
        /// The error that triggered the rollback.
        source: Box<Error>,
        /// The first error raised while rolling back.
        rollback: String,
    },

    /// The scene queue worker is gone.
    #[error("scene queue closed for {scene}")]
    QueueClosed {
        /// The scene whose worker stopped.
        scene: String,
    },

    /// A blocking render task panicked or was cancelled.
    #[error("render task failed: {0}")]
    RenderTask(String),
}

impl Error {
    /// Whether this error only reports that a directory already exists.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::DirectoryExists { .. } => true,
            Self::Io(err) => err.kind() == std::io::ErrorKind::AlreadyExists,
            _ => false,
        }
    }
}

/// A specialized Result type for `bgsplit` operations.
pub type Result<T> = std::result::Result<T, Error>;
