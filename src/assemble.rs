//! Page assembly.
//!
//! Wraps each discovered page in the site layout and writes it to
//! `<output>/<page dir>/index.html`, mirroring the source tree. A `media/`
//! directory next to the source `index.md` is copied alongside the built
//! page, so relative image references keep working.
//!
//! Pages are independent and written in parallel. The first failure aborts
//! the stage.

use crate::assets::copy_dir_recursive;
use crate::pipeline::Context;
use crate::templates::{self, Chrome, LayoutProps};
use crate::types::Page;
use maud::Markup;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Per-page media directory name.
pub const MEDIA_DIR: &str = "media";

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("Failed to copy media from {path}: {source}")]
    Media { path: PathBuf, source: io::Error },
}

/// Output file for a page URL: `/2024/hello` → `<output>/2024/hello/index.html`.
pub fn page_output_path(output_dir: &Path, url: &str) -> PathBuf {
    let relative = url.trim_matches('/');
    if relative.is_empty() {
        output_dir.join("index.html")
    } else {
        output_dir.join(relative).join("index.html")
    }
}

/// Write a rendered document, creating parent directories.
pub fn write_document(path: &Path, markup: Markup) -> Result<(), AssembleError> {
    let write = || -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, markup.into_string())
    };
    write().map_err(|source| AssembleError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Build every page into the output directory. Returns the page count.
pub fn assemble_pages(pages: &[Page], ctx: &Context) -> Result<usize, AssembleError> {
    let chrome = ctx.chrome();
    pages
        .par_iter()
        .try_for_each(|page| assemble_page(page, &chrome, &ctx.paths.output))?;

    info!(target: "build_pages", "Built {} pages", pages.len());
    Ok(pages.len())
}

fn assemble_page(page: &Page, chrome: &Chrome, output_dir: &Path) -> Result<(), AssembleError> {
    let path = page_output_path(output_dir, page.url());
    let document = templates::layout(
        chrome,
        LayoutProps {
            title: page.title(),
            description: page.description(),
            content: templates::page_content(&page.base().content),
        },
    );
    write_document(&path, document)?;
    debug!(target: "build_pages", "{} → {}", page.url(), path.display());

    let media = page
        .base()
        .source_path
        .parent()
        .map(|dir| dir.join(MEDIA_DIR))
        .filter(|dir| dir.is_dir());
    if let Some(media) = media {
        let target = path
            .parent()
            .unwrap_or(output_dir)
            .join(MEDIA_DIR);
        let copied = copy_dir_recursive(&media, &target).map_err(|source| AssembleError::Media {
            path: media.clone(),
            source,
        })?;
        debug!(target: "build_pages", "Copied {} media files for {}", copied, page.url());
    }
    Ok(())
}
