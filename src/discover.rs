//! Page discovery.
//!
//! First step of the build phase. Walks the page tree, finds one `index.md`
//! per directory, splits front matter from body, renders the body and
//! produces the [`Page`] list every later stage consumes.
//!
//! ## Directory Structure
//!
//! ```text
//! src/pages/                       # Pages root
//! ├── about/
//! │   └── index.md                 # Info page (no date) → /about
//! └── 2024/
//!     └── hello-world/
//!         ├── index.md             # Post (has date) → /2024/hello-world
//!         └── media/               # Copied next to the built page
//!             └── cover.jpg
//! ```
//!
//! The URL comes from the directory, never from the file contents. Pages are
//! returned in file-name walk order, which is also the tie-break order for
//! posts sharing a date.
//!
//! ## Validation
//!
//! - A root-level `index.md` is rejected: `/` belongs to the listing page.
//! - Two pages resolving to the same URL fail the build.
//! - A dated page whose front matter does not parse fails the build; an
//!   undated one is kept with empty front matter and a warning.

use crate::frontmatter::{self, FrontMatter, FrontMatterError};
use crate::render::ContentRenderer;
use crate::types::{Page, PageBase, Post};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File name that marks a page directory.
pub const PAGE_FILENAME: &str = "index.md";

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("Pages directory not found: {0}")]
    MissingRoot(PathBuf),
    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid front matter in {path}: {source}")]
    FrontMatter {
        path: PathBuf,
        source: FrontMatterError,
    },
    #[error("Page URL {url} is defined by both {first} and {second}")]
    DuplicateUrl {
        url: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("{0} would be served at `/`, which is reserved for the listing page")]
    RootPage(PathBuf),
    #[error("Page path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),
}

/// Discovery settings taken from the site config.
#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    /// chrono format for `Post::date_formatted`.
    pub date_format: String,
}

/// Find, parse and render every page under `pages_dir`.
pub fn discover_pages(
    pages_dir: &Path,
    renderer: &dyn ContentRenderer,
    options: &DiscoverOptions,
) -> Result<Vec<Page>, DiscoverError> {
    if !pages_dir.is_dir() {
        return Err(DiscoverError::MissingRoot(pages_dir.to_path_buf()));
    }

    let mut pages = Vec::new();
    for source in find_page_files(pages_dir)? {
        let page = load_page(pages_dir, &source, renderer, options)?;
        debug!(target: "discover", "Found {} ({})", page.url(), source.display());
        pages.push(page);
    }

    check_unique_urls(&pages)?;

    let posts = pages.iter().filter(|p| p.is_post()).count();
    info!(
        target: "discover",
        "Discovered {} pages ({} posts) in {}",
        pages.len(),
        posts,
        pages_dir.display()
    );
    Ok(pages)
}

/// All `index.md` files below `pages_dir`, in deterministic walk order.
fn find_page_files(pages_dir: &Path) -> Result<Vec<PathBuf>, DiscoverError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(pages_dir).sort_by_file_name() {
        let entry = entry.map_err(|source| DiscoverError::Walk {
            path: pages_dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && entry.file_name() == PAGE_FILENAME {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Site URL for a page file: `/` + its directory relative to the root.
pub fn page_url(pages_dir: &Path, source: &Path) -> Result<String, DiscoverError> {
    let dir = source.parent().unwrap_or(pages_dir);
    let relative = dir.strip_prefix(pages_dir).unwrap_or(dir);

    let mut segments = Vec::new();
    for component in relative.components() {
        let segment = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| DiscoverError::NonUtf8Path(source.to_path_buf()))?;
        segments.push(segment);
    }

    if segments.is_empty() {
        return Err(DiscoverError::RootPage(source.to_path_buf()));
    }
    Ok(format!("/{}", segments.join("/")))
}

fn load_page(
    pages_dir: &Path,
    source: &Path,
    renderer: &dyn ContentRenderer,
    options: &DiscoverOptions,
) -> Result<Page, DiscoverError> {
    let content = fs::read_to_string(source).map_err(|e| DiscoverError::Read {
        path: source.to_path_buf(),
        source: e,
    })?;
    let url = page_url(pages_dir, source)?;

    let (front_matter, body) = match frontmatter::parse_front_matter(&content) {
        Ok(parsed) => (parsed.front_matter, parsed.body),
        Err(header) if header.declares_date => {
            return Err(DiscoverError::FrontMatter {
                path: source.to_path_buf(),
                source: header.error,
            });
        }
        Err(header) => {
            warn!(
                target: "discover",
                "Ignoring unreadable front matter in {}: {}",
                source.display(),
                header.error
            );
            (FrontMatter::default(), &content[header.body_offset..])
        }
    };

    let rendered = renderer.render(body);
    build_page(source, url, front_matter, rendered, options)
}

/// Turn parsed front matter into an info page or a post.
fn build_page(
    source: &Path,
    url: String,
    front_matter: FrontMatter,
    content: String,
    options: &DiscoverOptions,
) -> Result<Page, DiscoverError> {
    let date = front_matter
        .publication_date()
        .map_err(|e| DiscoverError::FrontMatter {
            path: source.to_path_buf(),
            source: e,
        })?;

    let base = PageBase {
        source_path: source.to_path_buf(),
        url,
        title: front_matter.title,
        content,
        extra: front_matter.extra,
    };

    Ok(match date {
        Some(date) => Page::Post(Post {
            base,
            date_formatted: date.format(&options.date_format).to_string(),
            date,
            summary: front_matter.summary,
            draft: front_matter.draft,
        }),
        None => Page::Info(base),
    })
}

/// Fail if two pages resolve to the same URL.
pub fn check_unique_urls(pages: &[Page]) -> Result<(), DiscoverError> {
    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for page in pages {
        let base = page.base();
        if let Some(first) = seen.insert(&base.url, &base.source_path) {
            return Err(DiscoverError::DuplicateUrl {
                url: base.url.clone(),
                first: first.to_path_buf(),
                second: base.source_path.clone(),
            });
        }
    }
    Ok(())
}
