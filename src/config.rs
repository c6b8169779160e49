//! Site configuration module.
//!
//! Handles loading and validating `postpress.toml`. Stock defaults are the
//! base layer; the user file only needs the keys it wants to override.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [site]
//! base_url = "https://example.com"  # No trailing slash
//! title = "My Blog"
//! description = "A blog about things."
//! language = "en"
//! date_format = "%B %-d, %Y"          # chrono format for listing dates
//!
//! [paths]
//! pages = "src/pages"                 # Relative to the project root
//! public = "public"
//! script = "src/scripts/index.js"
//! output = "dist"
//!
//! [markdown]
//! theme = "base16-ocean.dark"         # syntect theme for code blocks
//! languages = []                      # Restrict highlighting (empty = all)
//!
//! [feed]
//! source = "pages"                    # "pages" or "output"
//! strict = false                      # Fail when a built page is missing
//!
//! [images]
//! strategy = "responsive"             # "responsive" or "density"
//! widths = [400, 800, 1600]
//! max_width = 800                     # Display width for "density"
//! convert = ["jpg", "jpeg", "png"]
//! convert_to = "avif"                 # "avif" or "webp"
//! quality = 75
//!
//! [styles]
//! path = "styles/main.css"            # Relative to the output directory
//! targets = ["defaults"]              # browserslist queries
//!
//! [annotate]
//! view_transitions = true
//!
//! [processing]
//! max_processes = 4                   # Omit for auto = CPU cores
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default config file name, looked up in the project root.
pub const CONFIG_FILENAME: &str = "postpress.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `postpress.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Site identity used by the layout and the feed channel.
    pub site: SiteInfo,
    /// Input and output locations.
    pub paths: PathsConfig,
    /// Markdown rendering and syntax highlighting.
    pub markdown: MarkdownConfig,
    /// Feed generation settings.
    pub feed: FeedConfig,
    /// Image post-processing settings.
    pub images: ImagesConfig,
    /// Stylesheet post-processing settings.
    pub styles: StylesConfig,
    /// Markup annotation settings.
    pub annotate: AnnotateConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.base_url.ends_with('/') {
            return Err(ConfigError::Validation(
                "site.base_url must not end with '/'".into(),
            ));
        }
        if self.images.widths.is_empty() {
            return Err(ConfigError::Validation(
                "images.widths must not be empty".into(),
            ));
        }
        if self.images.widths.contains(&0) {
            return Err(ConfigError::Validation(
                "images.widths values must be non-zero".into(),
            ));
        }
        if self.images.max_width == 0 {
            return Err(ConfigError::Validation(
                "images.max_width must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.images.quality) {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteInfo {
    /// Absolute site origin, used for permalinks. No trailing slash.
    pub base_url: String,
    pub title: String,
    pub description: String,
    /// `lang` attribute of generated documents.
    pub language: String,
    /// chrono format string for the human-readable post date.
    pub date_format: String,
}

impl Default for SiteInfo {
    fn default() -> Self {
        Self {
            base_url: "https://example.com".to_string(),
            title: "My Blog".to_string(),
            description: "A blog about web technology and remotely related thingies.".to_string(),
            language: "en".to_string(),
            date_format: "%B %-d, %Y".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Page tree, relative to the project root.
    pub pages: String,
    /// Static assets copied verbatim to the output root.
    pub public: String,
    /// Entry script copied to `scripts/index.js`.
    pub script: String,
    /// Build output directory. Cleared at the start of every build.
    pub output: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            pages: "src/pages".to_string(),
            public: "public".to_string(),
            script: "src/scripts/index.js".to_string(),
            output: "dist".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownConfig {
    /// syntect theme name used for fenced code blocks.
    pub theme: String,
    /// Languages eligible for highlighting. Empty means every bundled syntax.
    pub languages: Vec<String>,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            theme: "base16-ocean.dark".to_string(),
            languages: Vec::new(),
        }
    }
}

/// Where the feed reads full article content from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedContentSource {
    /// In-memory page records from discovery.
    #[default]
    Pages,
    /// Built `index.html` files, read back after page assembly.
    Output,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    pub source: FeedContentSource,
    /// When true, a post without a built page fails the run instead of
    /// being skipped.
    pub strict: bool,
}

/// Image processing profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStrategy {
    /// Breakpoint-driven `srcset` with several width-described derivatives.
    #[default]
    Responsive,
    /// One double-resolution derivative sized by `w`/`h` query parameters.
    Density,
}

/// Modern format legacy images are transcoded to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModernFormat {
    #[default]
    Avif,
    /// Encoded losslessly; `quality` does not apply.
    Webp,
}

impl ModernFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ModernFormat::Avif => "avif",
            ModernFormat::Webp => "webp",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    pub strategy: ImageStrategy,
    /// Breakpoint widths for the responsive profile, ascending.
    pub widths: Vec<u32>,
    /// Fallback display width for the density profile.
    pub max_width: u32,
    /// Source extensions transcoded to `convert_to` (case-insensitive).
    pub convert: Vec<String>,
    pub convert_to: ModernFormat,
    /// Lossy encoding quality (1-100).
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            strategy: ImageStrategy::default(),
            widths: vec![400, 800, 1600],
            max_width: 800,
            convert: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
            convert_to: ModernFormat::default(),
            quality: 75,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylesConfig {
    /// Stylesheet path relative to the output directory.
    pub path: String,
    /// browserslist queries. Empty disables targeting.
    pub targets: Vec<String>,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            path: "styles/main.css".to_string(),
            targets: vec!["defaults".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnnotateConfig {
    pub view_transitions: bool,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            view_transitions: true,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of worker threads.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading and validation
// =============================================================================

/// Load config from the given file.
///
/// Returns validated stock defaults when the file does not exist. Returns
/// `Err` if the file exists but is invalid TOML, has unknown keys, or fails
/// validation.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    if !path.exists() {
        let config = SiteConfig::default();
        config.validate()?;
        return Ok(config);
    }
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate a config document.
pub fn parse_config(content: &str) -> Result<SiteConfig, ConfigError> {
    let config: SiteConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `postpress.toml` with all keys.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# postpress configuration
# =======================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Site identity (layout, listing and feed channel)
# ---------------------------------------------------------------------------
[site]
# Absolute origin used for feed permalinks. No trailing slash.
base_url = "https://example.com"
title = "My Blog"
description = "A blog about web technology and remotely related thingies."
language = "en"
# chrono format for the human-readable post date ("January 5, 2024").
date_format = "%B %-d, %Y"

# ---------------------------------------------------------------------------
# Paths, relative to the project root
# ---------------------------------------------------------------------------
[paths]
# One directory per page, each holding an index.md and an optional media/.
pages = "src/pages"
# Copied verbatim to the output root.
public = "public"
# Copied to scripts/index.js when present.
script = "src/scripts/index.js"
# Cleared at the start of every build.
output = "dist"

# ---------------------------------------------------------------------------
# Markdown
# ---------------------------------------------------------------------------
[markdown]
# syntect theme for fenced code blocks.
theme = "base16-ocean.dark"
# Languages eligible for highlighting. Empty = every bundled syntax.
languages = []

# ---------------------------------------------------------------------------
# Feed (rss.xml)
# ---------------------------------------------------------------------------
[feed]
# "pages": content from the rendered markdown.
# "output": content read back from the built HTML pages.
source = "pages"
# Fail the build when a post has no built page (otherwise skip it).
strict = false

# ---------------------------------------------------------------------------
# Images (post-process)
# ---------------------------------------------------------------------------
[images]
# "responsive": srcset with one derivative per breakpoint.
# "density": one 2x derivative sized by ?w= / ?h= on the image URL.
strategy = "responsive"
# Breakpoints for "responsive".
widths = [400, 800, 1600]
# Display width for "density" images without ?w=.
max_width = 800
# Source formats transcoded to convert_to.
convert = ["jpg", "jpeg", "png"]
# "avif" or "webp" (webp is encoded losslessly).
convert_to = "avif"
# Encoding quality (1 = worst, 100 = best).
quality = 75

# ---------------------------------------------------------------------------
# Stylesheet (post-process)
# ---------------------------------------------------------------------------
[styles]
# Relative to the output directory.
path = "styles/main.css"
# browserslist queries. Empty = no targeting, minify only.
targets = ["defaults"]

# ---------------------------------------------------------------------------
# Markup annotation (post-process)
# ---------------------------------------------------------------------------
[annotate]
# Add view-transition-name to listing and article headings.
view_transitions = true

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum worker threads.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_image_settings() {
        let config = SiteConfig::default();
        assert_eq!(config.images.widths, vec![400, 800, 1600]);
        assert_eq!(config.images.quality, 75);
        assert_eq!(config.images.strategy, ImageStrategy::Responsive);
        assert_eq!(config.images.convert_to, ModernFormat::Avif);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(SiteConfig::default().validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let config = parse_config(
            r##"
[site]
title = "Field Notes"

[images]
widths = [320, 640]
"##,
        )
        .unwrap();
        assert_eq!(config.site.title, "Field Notes");
        assert_eq!(config.images.widths, vec![320, 640]);
        // Defaults preserved
        assert_eq!(config.site.date_format, "%B %-d, %Y");
        assert_eq!(config.images.quality, 75);
        assert_eq!(config.paths.output, "dist");
    }

    #[test]
    fn parse_enums() {
        let config = parse_config(
            r##"
[feed]
source = "output"
strict = true

[images]
strategy = "density"
convert_to = "webp"
"##,
        )
        .unwrap();
        assert_eq!(config.feed.source, FeedContentSource::Output);
        assert!(config.feed.strict);
        assert_eq!(config.images.strategy, ImageStrategy::Density);
        assert_eq!(config.images.convert_to.extension(), "webp");
    }

    #[test]
    fn unknown_keys_rejected() {
        let result = parse_config("[images]\nsizes = [1]\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn validation_rejects_trailing_slash_base_url() {
        let result = parse_config("[site]\nbase_url = \"https://example.com/\"\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validation_rejects_empty_widths() {
        let result = parse_config("[images]\nwidths = []\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validation_rejects_out_of_range_quality() {
        assert!(parse_config("[images]\nquality = 0\n").is_err());
        assert!(parse_config("[images]\nquality = 101\n").is_err());
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.site.title, "My Blog");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "[site]\nbase_url = \"https://blog.test\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.site.base_url, "https://blog.test");
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config = parse_config(stock_config_toml()).unwrap();
        let defaults = SiteConfig::default();
        assert_eq!(config.images.widths, defaults.images.widths);
        assert_eq!(config.images.convert, defaults.images.convert);
        assert_eq!(config.styles.targets, defaults.styles.targets);
        assert_eq!(config.site.base_url, defaults.site.base_url);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn effective_threads_clamps_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(10_000),
        };
        assert_eq!(effective_threads(&config), cores);
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }
}
