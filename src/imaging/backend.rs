//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: decode a candidate file, and apply one [`Stage`] to a decoded
//! image. Stage ordering lives in [`operations`](super::operations), not in
//! the backend.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust and
//! statically linked.

use super::params::Stage;
use crate::types::ImageCandidate;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image processing backends.
///
/// `Sync` so one backend can be shared across rayon workers.
pub trait ImageBackend: Sync {
    /// Read and decode the candidate's file.
    fn decode(&self, candidate: &ImageCandidate) -> Result<DynamicImage, BackendError>;

    /// Apply a single transform stage.
    fn apply(&self, image: DynamicImage, stage: &Stage) -> Result<DynamicImage, BackendError>;
}
