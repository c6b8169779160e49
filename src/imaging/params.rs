//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`operations`](super::operations) module (which
//! decides which derivatives an image needs) and the
//! [`backend`](super::backend) (which does the pixel work). This separation
//! lets tests swap in a mock backend without changing planning logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1-100, default 75). Clamped on construction.
//! - [`ResizeParams`]: Full description of one derivative: source, output path, pixel size, quality.

use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// Parameters for one resize-and-encode operation.
///
/// The output format follows the extension of `output`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}
