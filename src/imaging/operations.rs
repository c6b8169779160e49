//! High-level image operations.
//!
//! Planning is pure: given an image reference, its natural size and the
//! image settings, [`plan_image`] decides which derivatives to encode and
//! what markup the `<img>` gets. Encoding is then a flat list of
//! [`ResizeParams`] handed to the backend.
//!
//! Derivative names depend only on the source name, the target width and
//! the output format, so re-running over the same inputs produces the same
//! files.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{
    density_width, display_size, encode_dimensions, scaled_height, target_widths,
};
use super::params::{Quality, ResizeParams};
use crate::config::{ImageStrategy, ImagesConfig, ModernFormat};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Image settings resolved from the `[images]` config section.
#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub strategy: ImageStrategy,
    pub breakpoints: Vec<u32>,
    pub max_width: u32,
    /// Lowercased source extensions that are transcoded.
    pub convert: Vec<String>,
    pub convert_to: ModernFormat,
    pub quality: Quality,
}

impl From<&ImagesConfig> for ImageSettings {
    fn from(config: &ImagesConfig) -> Self {
        Self {
            strategy: config.strategy,
            breakpoints: config.widths.clone(),
            max_width: config.max_width,
            convert: config.convert.iter().map(|e| e.to_lowercase()).collect(),
            convert_to: config.convert_to,
            quality: Quality::new(config.quality),
        }
    }
}

/// Display size hints carried in the src query string (`?w=320&h=200`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SizeHints {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl SizeHints {
    /// Parse `w` and `h` from a query string. Zero or malformed values are
    /// ignored.
    pub fn from_query(query: &str) -> Self {
        let mut hints = Self::default();
        for pair in query.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = value.parse::<u32>().ok().filter(|&v| v > 0);
            match key {
                "w" => hints.width = value,
                "h" => hints.height = value,
                _ => {}
            }
        }
        hints
    }
}

/// A site-local image reference resolved to a file on disk.
#[derive(Debug, Clone)]
pub struct SourceImage<'a> {
    /// The `src` path as written, without query or fragment.
    pub src: &'a str,
    /// The resolved source file.
    pub file: &'a Path,
    pub hints: SizeHints,
}

/// One generated derivative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageVariant {
    /// Target width: used in the name and the `w` descriptor.
    pub width: u32,
    pub derived_path: PathBuf,
    pub derived_src: String,
}

/// Attribute values for a processed `<img>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageMarkup {
    /// `src` stays, `srcset` lists width-described derivatives.
    Responsive {
        srcset: String,
        width: u32,
        height: u32,
    },
    /// `src` becomes the derivative, `srcset` marks it as 2x.
    Density {
        src: String,
        srcset: String,
        width: u32,
        height: u32,
    },
}

/// Everything needed to process one image reference.
#[derive(Debug, Clone)]
pub struct ImagePlan {
    pub variants: Vec<ImageVariant>,
    pub jobs: Vec<ResizeParams>,
    pub markup: ImageMarkup,
}

/// Lowercased extension of a path-like string, if any.
pub fn extension_of(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Output extension: the modern format for convertible sources, otherwise
/// the (lowercased) source extension.
pub fn output_extension(src: &str, settings: &ImageSettings) -> String {
    match extension_of(src) {
        Some(ext) if settings.convert.contains(&ext) => settings.convert_to.extension().to_string(),
        Some(ext) => ext,
        None => settings.convert_to.extension().to_string(),
    }
}

/// `{dir}/{stem}-{width}.{ext}` for a src or file name.
pub fn derived_name(src: &str, width: u32, ext: &str) -> String {
    let (dir, file) = match src.rfind('/') {
        Some(i) => src.split_at(i + 1),
        None => ("", src),
    };
    let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
    format!("{dir}{stem}-{width}.{ext}")
}

fn variant(source: &SourceImage, width: u32, ext: &str) -> ImageVariant {
    let file_name = source
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    ImageVariant {
        width,
        derived_path: source.file.with_file_name(derived_name(&file_name, width, ext)),
        derived_src: derived_name(source.src, width, ext),
    }
}

fn resize_job(
    source: &SourceImage,
    variant: &ImageVariant,
    natural: Dimensions,
    quality: Quality,
) -> ResizeParams {
    let size = encode_dimensions(natural, variant.width);
    ResizeParams {
        source: source.file.to_path_buf(),
        output: variant.derived_path.clone(),
        width: size.width,
        height: size.height,
        quality,
    }
}

/// Plan derivatives and markup for one image under the active profile.
pub fn plan_image(source: &SourceImage, natural: Dimensions, settings: &ImageSettings) -> ImagePlan {
    let ext = output_extension(source.src, settings);
    match settings.strategy {
        ImageStrategy::Responsive => plan_responsive(source, natural, settings, &ext),
        ImageStrategy::Density => plan_density(source, natural, settings, &ext),
    }
}

fn plan_responsive(
    source: &SourceImage,
    natural: Dimensions,
    settings: &ImageSettings,
    ext: &str,
) -> ImagePlan {
    let mut widths = target_widths(natural.width, &settings.breakpoints);
    if widths.is_empty() {
        widths.push(natural.width.max(1));
    }
    let max = widths.last().copied().unwrap_or(natural.width);

    let variants: Vec<ImageVariant> = widths.iter().map(|&w| variant(source, w, ext)).collect();
    let jobs = variants
        .iter()
        .map(|v| resize_job(source, v, natural, settings.quality))
        .collect();
    let srcset = variants
        .iter()
        .map(|v| format!("{} {}w", v.derived_src, v.width))
        .collect::<Vec<_>>()
        .join(", ");

    ImagePlan {
        variants,
        jobs,
        markup: ImageMarkup::Responsive {
            srcset,
            width: max,
            height: scaled_height(natural, max),
        },
    }
}

fn plan_density(
    source: &SourceImage,
    natural: Dimensions,
    settings: &ImageSettings,
    ext: &str,
) -> ImagePlan {
    let display = display_size(
        natural,
        source.hints.width,
        source.hints.height,
        settings.max_width,
    );
    let derivative = variant(source, density_width(display.width, natural.width), ext);
    let job = resize_job(source, &derivative, natural, settings.quality);

    ImagePlan {
        markup: ImageMarkup::Density {
            src: derivative.derived_src.clone(),
            srcset: format!("{} 2x", derivative.derived_src),
            width: display.width,
            height: display.height,
        },
        variants: vec![derivative],
        jobs: vec![job],
    }
}

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &dyn ImageBackend, path: &Path) -> Result<Dimensions> {
    backend.identify(path)
}

/// Encode every job in parallel, stopping at the first failure.
pub fn encode_derivatives(backend: &dyn ImageBackend, jobs: &[ResizeParams]) -> Result<()> {
    jobs.par_iter().try_for_each(|job| backend.resize(job))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};

    fn settings() -> ImageSettings {
        ImageSettings::from(&ImagesConfig::default())
    }

    fn density_settings() -> ImageSettings {
        ImageSettings {
            strategy: ImageStrategy::Density,
            ..settings()
        }
    }

    fn source<'a>(src: &'a str, file: &'a Path) -> SourceImage<'a> {
        SourceImage {
            src,
            file,
            hints: SizeHints::default(),
        }
    }

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    #[test]
    fn derived_name_keeps_directory() {
        assert_eq!(derived_name("media/cover.jpg", 400, "avif"), "media/cover-400.avif");
        assert_eq!(derived_name("/img/a.b.png", 800, "webp"), "/img/a.b-800.webp");
        assert_eq!(derived_name("cover.jpg", 200, "avif"), "cover-200.avif");
    }

    #[test]
    fn output_extension_converts_listed_formats() {
        let s = settings();
        assert_eq!(output_extension("a/photo.JPG", &s), "avif");
        assert_eq!(output_extension("a/photo.png", &s), "avif");
        assert_eq!(output_extension("a/photo.webp", &s), "webp");
    }

    #[test]
    fn size_hints_from_query() {
        assert_eq!(
            SizeHints::from_query("w=320&h=200"),
            SizeHints {
                width: Some(320),
                height: Some(200)
            }
        );
        assert_eq!(
            SizeHints::from_query("h=90&x=1&w=abc&w"),
            SizeHints {
                width: None,
                height: Some(90)
            }
        );
        assert_eq!(SizeHints::from_query("w=0"), SizeHints::default());
    }

    #[test]
    fn responsive_plan_for_wide_image() {
        let file = Path::new("/dist/post/media/cover.jpg");
        let plan = plan_image(&source("media/cover.jpg", file), dims(1000, 500), &settings());

        let srcs: Vec<&str> = plan.variants.iter().map(|v| v.derived_src.as_str()).collect();
        assert_eq!(
            srcs,
            vec![
                "media/cover-400.avif",
                "media/cover-800.avif",
                "media/cover-1600.avif"
            ]
        );
        assert_eq!(
            plan.variants[0].derived_path,
            PathBuf::from("/dist/post/media/cover-400.avif")
        );
        assert_eq!(
            plan.markup,
            ImageMarkup::Responsive {
                srcset: "media/cover-400.avif 400w, media/cover-800.avif 800w, \
                         media/cover-1600.avif 1600w"
                    .to_string(),
                width: 1600,
                height: 800,
            }
        );
    }

    #[test]
    fn responsive_plan_never_upscales() {
        let file = Path::new("/dist/a.png");
        let plan = plan_image(&source("/a.png", file), dims(300, 200), &settings());

        let widths: Vec<u32> = plan.variants.iter().map(|v| v.width).collect();
        assert_eq!(widths, vec![200, 400]);
        // The 400 derivative is encoded at the natural 300px
        assert_eq!((plan.jobs[1].width, plan.jobs[1].height), (300, 200));
        assert!(plan.jobs[1].output.ends_with("a-400.avif"));
        assert_eq!((plan.jobs[0].width, plan.jobs[0].height), (200, 133));
    }

    #[test]
    fn density_plan_defaults_to_max_width() {
        let file = Path::new("/dist/p/hero.jpg");
        let plan = plan_image(&source("hero.jpg", file), dims(2000, 1000), &density_settings());

        assert_eq!(plan.variants.len(), 1);
        assert_eq!(
            plan.markup,
            ImageMarkup::Density {
                src: "hero-1600.avif".to_string(),
                srcset: "hero-1600.avif 2x".to_string(),
                width: 800,
                height: 400,
            }
        );
        assert_eq!((plan.jobs[0].width, plan.jobs[0].height), (1600, 800));
    }

    #[test]
    fn density_plan_uses_hints() {
        let file = Path::new("/dist/p/hero.jpg");
        let image = SourceImage {
            hints: SizeHints {
                width: Some(300),
                height: None,
            },
            ..source("hero.jpg", file)
        };
        let plan = plan_image(&image, dims(2000, 1000), &density_settings());
        assert!(matches!(
            plan.markup,
            ImageMarkup::Density { width: 300, height: 150, ref src, .. } if src == "hero-600.avif"
        ));
    }

    #[test]
    fn density_plan_caps_at_natural_width() {
        let file = Path::new("/dist/p/small.png");
        let plan = plan_image(&source("small.png", file), dims(500, 250), &density_settings());
        assert_eq!(plan.variants[0].width, 500);
    }

    #[test]
    fn plan_uses_configured_quality() {
        let file = Path::new("/dist/a.jpg");
        let s = ImageSettings {
            quality: Quality::new(60),
            ..settings()
        };
        let plan = plan_image(&source("a.jpg", file), dims(1000, 500), &s);
        assert!(plan.jobs.iter().all(|j| j.quality.value() == 60));
    }

    #[test]
    fn encode_derivatives_runs_every_job() {
        let backend = MockBackend::with_dimensions(1000, 500);
        let file = Path::new("/dist/a.jpg");
        let plan = plan_image(&source("a.jpg", file), dims(1000, 500), &settings());

        encode_derivatives(&backend, &plan.jobs).unwrap();

        let mut outputs = backend.resized_outputs();
        outputs.sort();
        assert_eq!(
            outputs,
            vec!["/dist/a-1600.avif", "/dist/a-400.avif", "/dist/a-800.avif"]
        );
    }

    #[test]
    fn get_dimensions_calls_backend() {
        let backend = MockBackend::with_dimensions(1920, 1080);
        let result = get_dimensions(&backend, Path::new("/test.jpg")).unwrap();
        assert_eq!(result, dims(1920, 1080));
        assert!(matches!(&backend.get_operations()[0], RecordedOp::Identify(_)));
    }
}
