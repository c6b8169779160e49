//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::image_dimensions` (header only); AVIF container metadata |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Decode (AVIF) | `avif-parse` + `rav1d`, see [`super::avif`] |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → other | `DynamicImage::save_with_format` |

use super::avif;
use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::ResizeParams;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    if avif::is_avif(path) {
        return avif::decode(path);
    }
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// 8-bit RGB(A) copy, the pixel layout the AVIF and WebP encoders accept.
fn to_rgb8_or_rgba8(img: &DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

fn create_writer(path: &Path) -> Result<BufWriter<File>, BackendError> {
    let file = File::create(path).map_err(BackendError::Io)?;
    Ok(BufWriter::new(file))
}

/// Save a DynamicImage to the given path, inferring format from extension.
fn save_image(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "avif" => save_avif(img, path, quality),
        "webp" => save_webp(img, path),
        "jpg" | "jpeg" => save_jpeg(img, path, quality),
        other => {
            let format = ImageFormat::from_extension(other).ok_or_else(|| {
                BackendError::ProcessingFailed(format!("Unsupported output format: {}", other))
            })?;
            img.save_with_format(path, format).map_err(|e| {
                BackendError::ProcessingFailed(format!("{} encode failed: {}", other, e))
            })
        }
    }
}

/// Encode and save as AVIF using rav1e (speed=6 for reasonable throughput).
fn save_avif(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
        create_writer(path)?,
        6,
        quality as u8,
    );
    to_rgb8_or_rgba8(img)
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("AVIF encode failed: {}", e)))
}

/// Encode and save as lossless WebP. The `image` crate has no lossy WebP
/// encoder, so quality does not apply.
fn save_webp(img: &DynamicImage, path: &Path) -> Result<(), BackendError> {
    let encoder = image::codecs::webp::WebPEncoder::new_lossless(create_writer(path)?);
    to_rgb8_or_rgba8(img)
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("WebP encode failed: {}", e)))
}

fn save_jpeg(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(create_writer(path)?, quality as u8);
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        if avif::is_avif(path) {
            return avif::identify(path);
        }
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!(
                "Failed to read dimensions of {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let resized = if img.width() == params.width && img.height() == params.height {
            img
        } else {
            img.resize_exact(params.width, params.height, FilterType::Lanczos3)
        };
        save_image(&resized, &params.output, params.quality.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::Quality;
    use crate::test_helpers::{write_avif, write_jpeg, write_png};

    fn resize_to(source: &Path, output: &Path, width: u32, height: u32) -> Result<(), BackendError> {
        RustBackend::new().resize(&ResizeParams {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            width,
            height,
            quality: Quality::new(75),
        })
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        write_jpeg(&path, 200, 150);

        let backend = RustBackend::new();
        let dims = backend.identify(&path).unwrap();
        assert_eq!(dims.width, 200);
        assert_eq!(dims.height, 150);
    }

    #[test]
    fn identify_nonexistent_file_errors() {
        let backend = RustBackend::new();
        let result = backend.identify(Path::new("/nonexistent/image.jpg"));
        assert!(result.is_err());
    }

    #[test]
    fn resize_synthetic_to_avif() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        write_jpeg(&source, 400, 300);

        let output = tmp.path().join("resized.avif");
        resize_to(&source, &output, 200, 150).unwrap();

        assert!(output.exists());
        assert!(std::fs::metadata(&output).unwrap().len() > 0);
    }

    #[test]
    fn resize_png_to_lossless_webp() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.png");
        write_png(&source, 120, 80);

        let output = tmp.path().join("resized.webp");
        resize_to(&source, &output, 60, 40).unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (60, 40));
    }

    #[test]
    fn resize_avif_source() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.avif");
        write_avif(&source, 160, 120);

        let backend = RustBackend::new();
        assert_eq!(backend.identify(&source).unwrap(), Dimensions { width: 160, height: 120 });

        let output = tmp.path().join("source-80.webp");
        resize_to(&source, &output, 80, 60).unwrap();
        assert_eq!(image::image_dimensions(&output).unwrap(), (80, 60));
    }

    #[test]
    fn resize_keeps_source_format() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.png");
        write_png(&source, 100, 50);

        let output = tmp.path().join("source-40.png");
        resize_to(&source, &output, 40, 20).unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (40, 20));
    }

    #[test]
    fn resize_overwrites_existing_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        write_jpeg(&source, 100, 100);
        let output = tmp.path().join("out.jpg");
        std::fs::write(&output, b"stale").unwrap();

        resize_to(&source, &output, 50, 50).unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (50, 50));
    }

    #[test]
    fn resize_unknown_output_format_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        write_jpeg(&source, 100, 100);

        let result = resize_to(&source, &tmp.path().join("output.xyz"), 50, 50);
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
    }

    #[test]
    fn resize_undecodable_source_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("broken.jpg");
        std::fs::write(&source, b"not an image").unwrap();

        let result = resize_to(&source, &tmp.path().join("out.avif"), 10, 10);
        assert!(result.is_err());
    }
}
