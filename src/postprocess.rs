//! Markup post-processing: responsive images and view transitions.
//!
//! Runs over every `.html` file of a [`BuildOutput`] in three passes:
//!
//! 1. **Plan** (parallel, per document): collect site-local `<img src>`
//!    references, resolve them to files, identify their size and plan
//!    derivatives and markup.
//! 2. **Encode** (parallel, per derivative): derivatives are deduplicated by
//!    output path first, so an image shared by several documents is encoded
//!    once and no two workers write the same file.
//! 3. **Rewrite** (parallel, per document): set the planned `<img>`
//!    attributes, add view-transition names, and write the document back if
//!    anything changed.
//!
//! Images that already carry a `srcset` are left alone, which makes the pass
//! safe to run twice.

use crate::annotate::{AnnotateError, annotate_headings};
use crate::imaging::operations::extension_of;
use crate::imaging::{
    BackendError, ImageBackend, ImageMarkup, ImageSettings, ResizeParams, SizeHints, SourceImage,
    encode_derivatives, get_dimensions, plan_image,
};
use crate::pipeline::{BuildOutput, Context};
use lol_html::{RewriteStrSettings, element, rewrite_str};
use rayon::prelude::*;
use std::cell::RefCell;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Extensions passed through untouched.
const SKIPPED_EXTENSIONS: &[&str] = &["gif", "svg"];

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Image '{src}' referenced by {} not found at {}", .page.display(), .path.display())]
    Missing {
        page: PathBuf,
        src: String,
        path: PathBuf,
    },
    #[error("Failed to read image '{src}' referenced by {}: {source}", .page.display())]
    Identify {
        page: PathBuf,
        src: String,
        source: BackendError,
    },
    #[error("Failed to encode derivative: {0}")]
    Encode(#[from] BackendError),
    #[error(
        "Images {} and {} both produce {}",
        .first.display(),
        .second.display(),
        .output.display()
    )]
    DerivativeConflict {
        output: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("Failed to list documents in {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("Failed to access {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Failed to rewrite {path}: {message}")]
    Rewrite { path: PathBuf, message: String },
    #[error("Failed to annotate {path}: {source}")]
    Annotate {
        path: PathBuf,
        source: AnnotateError,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkupSummary {
    /// Documents scanned.
    pub documents: usize,
    /// Documents written back.
    pub rewritten: usize,
    /// `<img>` references rewritten (distinct per document).
    pub images: usize,
    /// Derivative files encoded.
    pub derivatives: usize,
}

/// A site-local image reference split into path and size hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef<'a> {
    /// The src without query or fragment.
    pub path: &'a str,
    pub hints: SizeHints,
}

/// A document after planning, before rewriting.
struct PlannedDocument {
    path: PathBuf,
    html: String,
    /// Planned markup keyed by the `src` attribute as written.
    markups: HashMap<String, ImageMarkup>,
    jobs: Vec<ResizeParams>,
}

/// Whether `src` carries a URL scheme (`https:`, `data:`, `mailto:` ...).
fn has_scheme(src: &str) -> bool {
    match src.find(':') {
        Some(0) | None => false,
        Some(i) => {
            let scheme = &src[..i];
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
    }
}

/// Parse a `src` attribute. `None` for anything that is not a processable
/// site-local image: remote, protocol-relative, `data:`, gif/svg, or
/// without an extension.
pub fn parse_image_ref(src: &str) -> Option<ImageRef<'_>> {
    if src.is_empty() || src.starts_with("//") || has_scheme(src) {
        return None;
    }
    let end = src.find(['?', '#']).unwrap_or(src.len());
    let path = &src[..end];
    let query = src[end..]
        .strip_prefix('?')
        .map(|q| q.split('#').next().unwrap_or(q))
        .unwrap_or("");

    let ext = extension_of(path)?;
    if path.is_empty() || SKIPPED_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    Some(ImageRef {
        path,
        hints: SizeHints::from_query(query),
    })
}

/// File for an image path: root-absolute paths resolve against the output
/// root, everything else against the document's directory.
pub fn resolve_image_path(path: &str, doc_dir: &Path, root: &Path) -> PathBuf {
    match path.strip_prefix('/') {
        Some(absolute) => root.join(absolute),
        None => doc_dir.join(path),
    }
}

/// Distinct `src` values of `<img>` elements without a `srcset`, in
/// document order.
fn collect_image_sources(html: &str) -> Result<Vec<String>, String> {
    let sources: RefCell<Vec<String>> = RefCell::new(Vec::new());
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("img[src]", |el| {
                if el.has_attribute("srcset") {
                    return Ok(());
                }
                if let Some(src) = el.get_attribute("src") {
                    let mut sources = sources.borrow_mut();
                    if !sources.contains(&src) {
                        sources.push(src);
                    }
                }
                Ok(())
            })],
            ..RewriteStrSettings::new()
        },
    )
    .map_err(|e| e.to_string())?;
    Ok(sources.into_inner())
}

/// Apply planned markup to every matching `<img>`.
fn rewrite_images(html: &str, markups: &HashMap<String, ImageMarkup>) -> Result<String, String> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("img[src]", |el| {
                if el.has_attribute("srcset") {
                    return Ok(());
                }
                let Some(markup) = el.get_attribute("src").and_then(|src| markups.get(&src))
                else {
                    return Ok(());
                };
                match markup {
                    ImageMarkup::Responsive {
                        srcset,
                        width,
                        height,
                    } => {
                        el.set_attribute("srcset", srcset)?;
                        el.set_attribute("sizes", "auto")?;
                        el.set_attribute("loading", "lazy")?;
                        el.set_attribute("width", &width.to_string())?;
                        el.set_attribute("height", &height.to_string())?;
                    }
                    ImageMarkup::Density {
                        src,
                        srcset,
                        width,
                        height,
                    } => {
                        el.set_attribute("src", src)?;
                        el.set_attribute("srcset", srcset)?;
                        el.set_attribute("loading", "lazy")?;
                        el.set_attribute("width", &width.to_string())?;
                        el.set_attribute("height", &height.to_string())?;
                    }
                }
                Ok(())
            })],
            ..RewriteStrSettings::new()
        },
    )
    .map_err(|e| e.to_string())
}

/// Document directory relative to the output root, `/`-separated.
fn page_dir(path: &Path, root: &Path) -> String {
    path.parent()
        .and_then(|dir| dir.strip_prefix(root).ok())
        .map(|dir| {
            dir.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}

fn plan_document(
    path: &Path,
    output: &BuildOutput,
    backend: &dyn ImageBackend,
    settings: &ImageSettings,
) -> Result<PlannedDocument, ImageError> {
    let html = fs::read_to_string(path).map_err(|source| ImageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let sources = collect_image_sources(&html).map_err(|message| ImageError::Rewrite {
        path: path.to_path_buf(),
        message,
    })?;
    let doc_dir = path.parent().unwrap_or(output.root());

    let mut markups = HashMap::new();
    let mut jobs = Vec::new();
    for src in sources {
        let Some(image) = parse_image_ref(&src) else {
            continue;
        };
        let file = resolve_image_path(image.path, doc_dir, output.root());
        if !file.is_file() {
            return Err(ImageError::Missing {
                page: path.to_path_buf(),
                src: src.clone(),
                path: file,
            });
        }
        let natural = get_dimensions(backend, &file).map_err(|source| ImageError::Identify {
            page: path.to_path_buf(),
            src: src.clone(),
            source,
        })?;

        let plan = plan_image(
            &SourceImage {
                src: image.path,
                file: &file,
                hints: image.hints,
            },
            natural,
            settings,
        );
        debug!(
            target: "process_images",
            "{} ({}x{}) → {} derivatives",
            src,
            natural.width,
            natural.height,
            plan.jobs.len()
        );
        jobs.extend(plan.jobs);
        markups.insert(src, plan.markup);
    }

    Ok(PlannedDocument {
        path: path.to_path_buf(),
        html,
        markups,
        jobs,
    })
}

/// Rewrite and annotate one document. Returns whether it was written.
fn finish_document(
    doc: &PlannedDocument,
    root: &Path,
    view_transitions: bool,
) -> Result<bool, ImageError> {
    let mut html = if doc.markups.is_empty() {
        doc.html.clone()
    } else {
        rewrite_images(&doc.html, &doc.markups).map_err(|message| ImageError::Rewrite {
            path: doc.path.clone(),
            message,
        })?
    };
    if view_transitions {
        html = annotate_headings(&html, &page_dir(&doc.path, root)).map_err(|source| {
            ImageError::Annotate {
                path: doc.path.clone(),
                source,
            }
        })?;
    }

    if html == doc.html {
        return Ok(false);
    }
    fs::write(&doc.path, html).map_err(|source| ImageError::Io {
        path: doc.path.clone(),
        source,
    })?;
    debug!(target: "process_markup", "Rewrote {}", doc.path.display());
    Ok(true)
}

/// Derivative jobs keyed by output file, in path order. The same source
/// planned by several documents collapses to one job; two sources planning
/// the same file is an error.
fn unique_jobs<'a>(
    jobs: impl Iterator<Item = &'a ResizeParams>,
) -> Result<Vec<ResizeParams>, ImageError> {
    let mut unique: BTreeMap<&Path, &ResizeParams> = BTreeMap::new();
    for job in jobs {
        match unique.entry(job.output.as_path()) {
            Entry::Vacant(slot) => {
                slot.insert(job);
            }
            Entry::Occupied(slot) if slot.get().source != job.source => {
                return Err(ImageError::DerivativeConflict {
                    output: job.output.clone(),
                    first: slot.get().source.clone(),
                    second: job.source.clone(),
                });
            }
            Entry::Occupied(_) => {}
        }
    }
    Ok(unique.into_values().cloned().collect())
}

/// Process every document of `output` with the context's image settings and
/// backend.
pub fn process_markup(output: &BuildOutput, ctx: &Context) -> Result<MarkupSummary, ImageError> {
    process_documents(
        output,
        &ImageSettings::from(&ctx.config.images),
        ctx.config.annotate.view_transitions,
        ctx.backend.as_ref(),
    )
}

pub(crate) fn process_documents(
    output: &BuildOutput,
    settings: &ImageSettings,
    view_transitions: bool,
    backend: &dyn ImageBackend,
) -> Result<MarkupSummary, ImageError> {
    let documents = output.html_files().map_err(|source| ImageError::Walk {
        path: output.root().to_path_buf(),
        source,
    })?;

    let planned: Vec<PlannedDocument> = documents
        .par_iter()
        .map(|path| plan_document(path, output, backend, settings))
        .collect::<Result<_, _>>()?;

    let jobs = unique_jobs(planned.iter().flat_map(|doc| doc.jobs.iter()))?;
    encode_derivatives(backend, &jobs)?;
    info!(target: "process_images", "Encoded {} derivatives", jobs.len());

    let written: Vec<bool> = planned
        .par_iter()
        .map(|doc| finish_document(doc, output.root(), view_transitions))
        .collect::<Result<_, _>>()?;

    let summary = MarkupSummary {
        documents: planned.len(),
        rewritten: written.iter().filter(|&&w| w).count(),
        images: planned.iter().map(|doc| doc.markups.len()).sum(),
        derivatives: jobs.len(),
    };
    info!(
        target: "process_markup",
        "Processed {} documents ({} rewritten, {} images)",
        summary.documents,
        summary.rewritten,
        summary.images
    );
    Ok(summary)
}
