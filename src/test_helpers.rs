//! Shared test utilities for the postpress test suite.
//!
//! Provides page constructors, a temporary project layout, and synthetic
//! images, so stage tests can run without fixtures on disk.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let site = TempSite::new();
//! site.page("2024/hello", "---\ntitle: Hello\ndate: 2024-01-05\n---\n# Hello");
//! let ctx = site.context();
//! let pages = discover_pages(&ctx.paths.pages, ctx.renderer.as_ref(), &options).unwrap();
//! ```

use crate::config::SiteConfig;
use crate::imaging::RustBackend;
use crate::pipeline::Context;
use crate::render::ContentRenderer;
use crate::types::{Page, PageBase, Post};
use chrono::NaiveDate;
use image::{Rgb, RgbImage};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =========================================================================
// Page constructors
// =========================================================================

fn page_base(url: &str) -> PageBase {
    PageBase {
        source_path: PathBuf::from(format!("/site/src/pages{url}/index.md")),
        url: url.to_string(),
        title: Some(url.trim_start_matches('/').to_string()),
        content: format!("<p>Content of {url}</p>"),
        extra: BTreeMap::new(),
    }
}

/// Undated page at `url`.
pub fn info_page(url: &str) -> Page {
    Page::Info(page_base(url))
}

/// Post at `url` dated `date` (`YYYY-MM-DD`). Panics on a malformed date.
pub fn post(url: &str, date: &str) -> Page {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap_or_else(|e| panic!("bad test date '{date}': {e}"));
    Page::Post(Post {
        base: page_base(url),
        date_formatted: date.format("%B %-d, %Y").to_string(),
        date,
        summary: None,
        draft: false,
    })
}

/// Unwrap a page known to be a post. Panics otherwise.
pub fn as_post(page: &Page) -> &Post {
    page.as_post()
        .unwrap_or_else(|| panic!("page '{}' is not a post", page.url()))
}

/// Renderer that wraps the body in a marker element, so tests can tell
/// rendered content from raw source without depending on markdown output.
pub struct PlainRenderer;

impl ContentRenderer for PlainRenderer {
    fn render(&self, body: &str) -> String {
        format!("<rendered>{body}</rendered>")
    }
}

// =========================================================================
// Filesystem fixtures
// =========================================================================

/// Write `<root>/<dir>/index.md`, creating directories as needed.
pub fn write_page(root: &Path, dir: &str, content: &str) -> PathBuf {
    let page_dir = root.join(dir);
    fs::create_dir_all(&page_dir).unwrap();
    let path = page_dir.join("index.md");
    fs::write(&path, content).unwrap();
    path
}

/// Write a file, creating parent directories.
pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
}

/// Synthetic PNG of the given size. Parent directories are created.
pub fn write_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    gradient(width, height)
        .save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}

/// Synthetic JPEG of the given size. Parent directories are created.
pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    gradient(width, height)
        .save_with_format(path, image::ImageFormat::Jpeg)
        .unwrap();
}

/// Synthetic AVIF of the given size, encoded at the fastest speed. Parent
/// directories are created.
pub fn write_avif(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let file = std::io::BufWriter::new(fs::File::create(path).unwrap());
    let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(file, 10, 80);
    gradient(width, height).write_with_encoder(encoder).unwrap();
}

/// A throwaway project root laid out with the default paths.
pub struct TempSite {
    pub dir: TempDir,
    pub config: SiteConfig,
}

impl TempSite {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/pages")).unwrap();
        Self {
            dir,
            config: SiteConfig::default(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.root().join(&self.config.paths.pages)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join(&self.config.paths.output)
    }

    /// Add a page under the pages root.
    pub fn page(&self, dir: &str, content: &str) -> PathBuf {
        write_page(&self.pages_dir(), dir, content)
    }

    /// Context over this site with a plain renderer and the real image backend.
    pub fn context(&self) -> Context {
        Context::with_parts(
            self.root(),
            self.config.clone(),
            Box::new(PlainRenderer),
            Box::new(RustBackend::new()),
        )
    }
}
