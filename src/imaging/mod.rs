//! Image processing: pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions`; AVIF via `avif-parse` |
//! | **Decode** | `image` decoders; AVIF via `avif-parse` + `rav1d` |
//! | **Resize** | Lanczos3 |
//! | **Encode** | AVIF (rav1e), lossless WebP, JPEG, PNG |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for breakpoint and dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Planning derivatives and markup, then encoding through a backend

mod avif;
pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{density_width, display_size, scaled_height, target_widths};
pub use operations::{
    ImageMarkup, ImagePlan, ImageSettings, ImageVariant, SizeHints, SourceImage,
    encode_derivatives, get_dimensions, plan_image,
};
pub use params::{Quality, ResizeParams};
pub use rust_backend::RustBackend;
