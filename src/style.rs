//! Stylesheet post-processing.
//!
//! Minifies the built stylesheet in place with `lightningcss`, lowering
//! modern syntax and adding vendor prefixes for the configured browserslist
//! targets. An empty target list minifies without any lowering.

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum StyleError {
    #[error("Stylesheet not found: {0}")]
    Missing(PathBuf),
    #[error("Failed to access {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Invalid browser targets {queries:?}: {message}")]
    Targets {
        queries: Vec<String>,
        message: String,
    },
    #[error("Failed to process stylesheet: {0}")]
    Css(String),
}

/// Sizes before and after minification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleSummary {
    pub original_bytes: usize,
    pub minified_bytes: usize,
}

/// Resolve browserslist queries. Empty queries mean no targeting.
pub fn resolve_targets(queries: &[String]) -> Result<Targets, StyleError> {
    if queries.is_empty() {
        return Ok(Targets::default());
    }
    let browsers = Browsers::from_browserslist(queries.iter().map(String::as_str)).map_err(
        |e| StyleError::Targets {
            queries: queries.to_vec(),
            message: e.to_string(),
        },
    )?;
    Ok(Targets {
        browsers,
        ..Targets::default()
    })
}

/// Minify `css` for the given browserslist queries.
pub fn minify_css(css: &str, queries: &[String]) -> Result<String, StyleError> {
    let targets = resolve_targets(queries)?;

    let mut sheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|e| StyleError::Css(e.to_string()))?;
    sheet
        .minify(MinifyOptions {
            targets: targets.clone(),
            ..MinifyOptions::default()
        })
        .map_err(|e| StyleError::Css(e.to_string()))?;
    let output = sheet
        .to_css(PrinterOptions {
            minify: true,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| StyleError::Css(e.to_string()))?;
    Ok(output.code)
}

/// Minify the stylesheet at `path` and overwrite it.
pub fn transform_stylesheet(path: &Path, queries: &[String]) -> Result<StyleSummary, StyleError> {
    if !path.is_file() {
        return Err(StyleError::Missing(path.to_path_buf()));
    }
    let css = fs::read_to_string(path).map_err(|source| StyleError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let minified = minify_css(&css, queries)?;
    fs::write(path, &minified).map_err(|source| StyleError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        target: "transform_styles",
        "Minified {} ({} → {} bytes)",
        path.display(),
        css.len(),
        minified.len()
    );
    Ok(StyleSummary {
        original_bytes: css.len(),
        minified_bytes: minified.len(),
    })
}
