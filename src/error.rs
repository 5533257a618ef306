//! Error types for the upload and compression pipeline.
//!
//! Every per-file failure is one of the five [`UploadError`] kinds. They never abort a
//! batch; each one ends only the pipeline of the file it belongs to.

use crate::status::Status;

/// Rejected compression settings. Raised before any file of a batch is touched.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SettingsError {
    #[error("quality must be a number between 0.0 and 1.0, got {0:?}")]
    Quality(String),

    #[error("max dimension must be a positive integer, got {0:?}")]
    MaxDimension(String),

    #[error("unknown resize filter {0:?} (expected nearest, triangle, catmull-rom, gaussian or lanczos3)")]
    Filter(String),
}

/// Failure inside the compressor: scaling, drawing or encoding.
#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("encoder failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("encoder produced no data")]
    EmptyOutput,

    #[error("panicked while compressing: {0}")]
    Panicked(String),
}

/// Why a single file did not produce a download.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("unsupported file format {media_type:?}")]
    UnsupportedFormat { media_type: String },

    #[error("failed to read file: {0:#}")]
    ReadFailure(anyhow::Error),

    #[error("failed to decode image: {0}")]
    DecodeFailure(#[source] image::ImageError),

    #[error("compression failed: {0}")]
    CompressionFailure(#[from] CompressError),

    #[error("compression process failed: {0:#}")]
    CompressionProcess(anyhow::Error),
}

impl UploadError {
    /// Status line shown to the user for this failure.
    pub fn status(&self) -> Status {
        match self {
            UploadError::UnsupportedFormat { .. } => Status::UnsupportedFormat,
            UploadError::ReadFailure(_) => Status::ReadFailure,
            UploadError::DecodeFailure(_) => Status::DecodeFailure,
            UploadError::CompressionFailure(_) => Status::CompressionFailure,
            UploadError::CompressionProcess(_) => Status::CompressionProcess,
        }
    }
}
