//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the post-process
//! phase needs: identify and resize.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Everything is statically linked into the binary.

use super::params::ResizeParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// The rest of the codebase only talks to this trait, so the planning and
/// markup code can be tested against a recording mock.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Resize the source to exactly `width`x`height` and encode it to
    /// `output`, in the format implied by its extension.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}
