//! Build and post-process orchestration.
//!
//! A [`Context`] is built once per run and handed to every stage. It owns the
//! config, the resolved project paths, the content renderer and the image
//! backend, so nothing downstream reaches for globals.
//!
//! ```text
//! build:        discover ─┬─ assemble pages ─── feed (output source)
//!                         ├─ overview
//!                         ├─ feed (pages source)
//!                         └─ copy assets
//!
//! postprocess:  ┬─ transform stylesheet
//!               └─ process markup (images, then view transitions)
//! ```
//!
//! [`build`] returns a [`BuildOutput`], the only way (besides
//! [`BuildOutput::open`]) to get hold of the handle that [`postprocess`] and
//! the output-backed feed need.

use crate::assemble::{AssembleError, assemble_pages};
use crate::assets::{AssetError, AssetSummary, copy_assets};
use crate::config::{FeedContentSource, PathsConfig, SiteConfig};
use crate::discover::{DiscoverError, DiscoverOptions, discover_pages};
use crate::feed::{FeedError, FeedSource, FeedSummary, build_feed};
use crate::imaging::{ImageBackend, RustBackend};
use crate::overview::build_overview;
use crate::postprocess::{ImageError, MarkupSummary, process_markup};
use crate::render::{ContentRenderer, MarkdownRenderer, RenderError};
use crate::style::{StyleError, StyleSummary, transform_stylesheet};
use crate::templates::Chrome;
use crate::types::{Page, listed_posts};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Discover(#[from] DiscoverError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Assets(#[from] AssetError),
    #[error(transparent)]
    Style(#[from] StyleError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("Failed to prepare output directory {path}: {source}")]
    Output { path: PathBuf, source: io::Error },
    #[error("Build output not found: {0}")]
    MissingOutput(PathBuf),
    #[error("Refusing to clear {0}: it contains the project sources")]
    UnsafeOutput(PathBuf),
}

/// Project paths resolved against the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePaths {
    pub root: PathBuf,
    pub pages: PathBuf,
    pub public: PathBuf,
    pub script: PathBuf,
    pub output: PathBuf,
}

impl SitePaths {
    pub fn resolve(root: &Path, paths: &PathsConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            pages: root.join(&paths.pages),
            public: root.join(&paths.public),
            script: root.join(&paths.script),
            output: root.join(&paths.output),
        }
    }
}

/// Everything a stage needs for one run.
pub struct Context {
    pub config: SiteConfig,
    pub paths: SitePaths,
    pub renderer: Box<dyn ContentRenderer + Send + Sync>,
    pub backend: Box<dyn ImageBackend + Send + Sync>,
}

impl Context {
    /// Production context: markdown renderer and the pure Rust image backend.
    pub fn new(root: &Path, config: SiteConfig) -> Result<Self, PipelineError> {
        let renderer = MarkdownRenderer::new(&config.markdown)?;
        Ok(Self::with_parts(
            root,
            config,
            Box::new(renderer),
            Box::new(RustBackend::new()),
        ))
    }

    pub fn with_parts(
        root: &Path,
        config: SiteConfig,
        renderer: Box<dyn ContentRenderer + Send + Sync>,
        backend: Box<dyn ImageBackend + Send + Sync>,
    ) -> Self {
        let paths = SitePaths::resolve(root, &config.paths);
        Self {
            config,
            paths,
            renderer,
            backend,
        }
    }

    /// Shared layout chrome. The script tag is only emitted when the entry
    /// script exists.
    pub fn chrome(&self) -> Chrome<'_> {
        Chrome::new(&self.config, self.paths.script.is_file())
    }

    pub fn discover_options(&self) -> DiscoverOptions {
        DiscoverOptions {
            date_format: self.config.site.date_format.clone(),
        }
    }
}

/// A completed build output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    root: PathBuf,
}

impl BuildOutput {
    /// Handle to an existing output directory, e.g. from an earlier `build`.
    pub fn open(dir: &Path) -> Result<Self, PipelineError> {
        if !dir.is_dir() {
            return Err(PipelineError::MissingOutput(dir.to_path_buf()));
        }
        Ok(Self {
            root: dir.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every `.html` file in the output, in deterministic walk order.
    pub fn html_files(&self) -> Result<Vec<PathBuf>, walkdir::Error> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry?;
            let is_html = entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("html"));
            if entry.file_type().is_file() && is_html {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

/// What a build produced.
#[derive(Debug)]
pub struct BuildReport {
    pub output: BuildOutput,
    pub pages: usize,
    pub posts: usize,
    pub overview: PathBuf,
    pub feed: FeedSummary,
    pub assets: AssetSummary,
}

/// What a post-process pass changed.
#[derive(Debug)]
pub struct PostprocessReport {
    pub style: StyleSummary,
    pub markup: MarkupSummary,
}

/// Discover and render every page.
pub fn discover(ctx: &Context) -> Result<Vec<Page>, PipelineError> {
    Ok(discover_pages(
        &ctx.paths.pages,
        ctx.renderer.as_ref(),
        &ctx.discover_options(),
    )?)
}

/// Run the build phase: clear the output, discover, then write pages,
/// overview, feed and assets.
pub fn build(ctx: &Context) -> Result<BuildReport, PipelineError> {
    clear_output(&ctx.paths)?;

    let pages = discover(ctx)?;
    let posts = listed_posts(&pages);
    let feed_from_pages = ctx.config.feed.source == FeedContentSource::Pages;

    let ((assembled, overview), (pages_feed, assets)) = rayon::join(
        || {
            rayon::join(
                || assemble_pages(&pages, ctx),
                || build_overview(&posts, ctx),
            )
        },
        || {
            rayon::join(
                || {
                    feed_from_pages
                        .then(|| build_feed(&posts, FeedSource::Pages, ctx))
                        .transpose()
                },
                || copy_assets(ctx),
            )
        },
    );
    let assembled = assembled?;
    let overview = overview?;
    let assets = assets?;
    let output = BuildOutput::open(&ctx.paths.output)?;

    let feed = match pages_feed? {
        Some(feed) => feed,
        None => build_feed(&posts, FeedSource::BuildOutput(&output), ctx)?,
    };

    info!(
        "Built {} pages ({} listed posts) into {}",
        assembled,
        posts.len(),
        output.root().display()
    );
    Ok(BuildReport {
        pages: assembled,
        posts: posts.len(),
        overview,
        feed,
        assets,
        output,
    })
}

/// Run the post-process phase over a build output.
pub fn postprocess(ctx: &Context, output: &BuildOutput) -> Result<PostprocessReport, PipelineError> {
    let stylesheet = output.root().join(&ctx.config.styles.path);
    let (style, markup) = rayon::join(
        || transform_stylesheet(&stylesheet, &ctx.config.styles.targets),
        || process_markup(output, ctx),
    );
    Ok(PostprocessReport {
        style: style?,
        markup: markup?,
    })
}

/// Remove and recreate the output directory. Refuses to touch a directory
/// that holds the project root or the page sources.
fn clear_output(paths: &SitePaths) -> Result<(), PipelineError> {
    let output = &paths.output;
    let resolve = |path: &Path| {
        resolved(path).map_err(|source| PipelineError::Output {
            path: path.to_path_buf(),
            source,
        })
    };
    let target = resolve(output)?;
    if resolve(&paths.root)?.starts_with(&target) || resolve(&paths.pages)?.starts_with(&target) {
        return Err(PipelineError::UnsafeOutput(output.clone()));
    }
    if output.exists() {
        debug!("Clearing {}", output.display());
        fs::remove_dir_all(output).map_err(|source| PipelineError::Output {
            path: output.clone(),
            source,
        })?;
    }
    fs::create_dir_all(output).map_err(|source| PipelineError::Output {
        path: output.clone(),
        source,
    })
}

/// Absolute form of `path` with `.` and `..` resolved. Existing paths are
/// canonicalized, so symlinks are followed too.
fn resolved(path: &Path) -> io::Result<PathBuf> {
    if path.exists() {
        return fs::canonicalize(path);
    }
    let mut out = PathBuf::new();
    for component in std::path::absolute(path)?.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    Ok(out)
}
