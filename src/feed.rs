//! RSS 2.0 feed generation.
//!
//! One `<item>` per listed post, in listing order, each carrying the full
//! article HTML in a CDATA section. Content comes from one of two places:
//!
//! - [`FeedSource::Pages`]: the rendered markdown held by discovery.
//! - [`FeedSource::BuildOutput`]: the built `index.html` of each post, read
//!   back after page assembly. The inner HTML of `<main>` is used, minus the
//!   title heading the layout puts first (the item already has a title).
//!
//! A post whose built page is missing is skipped with a warning, or fails
//! the run when `feed.strict` is set.

use crate::assemble::page_output_path;
use crate::config::SiteInfo;
use crate::pipeline::{BuildOutput, Context};
use crate::types::Post;
use lol_html::html_content::ContentType;
use lol_html::{RewriteStrSettings, element, rewrite_str};
use maud::{PreEscaped, html};
use rayon::prelude::*;
use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Feed file name in the output root.
pub const FEED_FILENAME: &str = "rss.xml";

const MAIN_START: &str = "<!--postpress:main-start-->";
const MAIN_END: &str = "<!--postpress:main-end-->";

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("Failed to read built page {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("No usable built page for {url} at {path}: {reason}")]
    MissingPage {
        url: String,
        path: PathBuf,
        reason: &'static str,
    },
    #[error("Failed to extract content from {path}: {message}")]
    Extract { path: PathBuf, message: String },
}

/// Where item content is read from.
#[derive(Debug, Clone, Copy)]
pub enum FeedSource<'a> {
    Pages,
    BuildOutput(&'a BuildOutput),
}

/// What to do when a post has no usable built page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedStrictness {
    /// Skip the item and warn.
    #[default]
    Lenient,
    /// Fail the run.
    Strict,
}

impl FeedStrictness {
    pub fn from_flag(strict: bool) -> Self {
        if strict {
            FeedStrictness::Strict
        } else {
            FeedStrictness::Lenient
        }
    }
}

/// One feed item: the post plus its full content.
#[derive(Debug)]
pub struct FeedEntry<'a> {
    pub post: &'a Post,
    pub content: Cow<'a, str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSummary {
    pub path: PathBuf,
    pub items: usize,
    pub skipped: usize,
}

/// Build `rss.xml` from `posts` (already in listing order).
pub fn build_feed(
    posts: &[&Post],
    source: FeedSource,
    ctx: &Context,
) -> Result<FeedSummary, FeedError> {
    let strictness = FeedStrictness::from_flag(ctx.config.feed.strict);
    let entries = collect_entries(posts, source, strictness)?;
    let skipped = posts.len() - entries.len();

    let path = ctx.paths.output.join(FEED_FILENAME);
    let xml = render_feed(&ctx.config.site, &entries);
    fs::write(&path, xml).map_err(|source| FeedError::Write {
        path: path.clone(),
        source,
    })?;

    info!(
        target: "build_feed",
        "Wrote {} items to {} ({} skipped)",
        entries.len(),
        path.display(),
        skipped
    );
    Ok(FeedSummary {
        path,
        items: entries.len(),
        skipped,
    })
}

fn collect_entries<'a>(
    posts: &[&'a Post],
    source: FeedSource,
    strictness: FeedStrictness,
) -> Result<Vec<FeedEntry<'a>>, FeedError> {
    let output = match source {
        FeedSource::Pages => {
            return Ok(posts
                .iter()
                .map(|&post| FeedEntry {
                    post,
                    content: Cow::Borrowed(post.base.content.as_str()),
                })
                .collect());
        }
        FeedSource::BuildOutput(output) => output,
    };

    let entries: Vec<Option<FeedEntry<'a>>> = posts
        .par_iter()
        .map(|&post| match built_content(post, output) {
            Ok(content) => Ok(Some(FeedEntry {
                post,
                content: Cow::Owned(content),
            })),
            Err(err @ FeedError::MissingPage { .. }) if strictness == FeedStrictness::Lenient => {
                warn!(target: "build_feed", "Skipping feed item: {}", err);
                Ok(None)
            }
            Err(err) => Err(err),
        })
        .collect::<Result<_, _>>()?;

    Ok(entries.into_iter().flatten().collect())
}

/// Content of a post's built page.
fn built_content(post: &Post, output: &BuildOutput) -> Result<String, FeedError> {
    let path = page_output_path(output.root(), post.url());
    let html = match fs::read_to_string(&path) {
        Ok(html) => html,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(FeedError::MissingPage {
                url: post.url().to_string(),
                path,
                reason: "file not found",
            });
        }
        Err(source) => return Err(FeedError::Read { path, source }),
    };

    match extract_main_content(&html) {
        Ok(Some(content)) => Ok(content),
        Ok(None) => Err(FeedError::MissingPage {
            url: post.url().to_string(),
            path,
            reason: "no <main> element",
        }),
        Err(message) => Err(FeedError::Extract { path, message }),
    }
}

/// Inner HTML of the first `<main>`, with the first `<h1>` inside it removed.
/// `None` when the document has no `<main>`.
pub fn extract_main_content(html: &str) -> Result<Option<String>, String> {
    let mut in_first_main = false;
    let mut first_heading = true;

    let marked = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("main", |el| {
                    if !in_first_main {
                        in_first_main = true;
                        el.prepend(MAIN_START, ContentType::Html);
                        el.append(MAIN_END, ContentType::Html);
                    }
                    Ok(())
                }),
                element!("main h1", |el| {
                    if first_heading {
                        first_heading = false;
                        el.remove();
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::new()
        },
    )
    .map_err(|e| e.to_string())?;

    let Some(start) = marked.find(MAIN_START) else {
        return Ok(None);
    };
    let body = &marked[start + MAIN_START.len()..];
    let end = body.find(MAIN_END).unwrap_or(body.len());
    Ok(Some(body[..end].trim().to_string()))
}

/// Wrap `content` in CDATA. Any `]]>` inside is split across two sections.
pub fn cdata(content: &str) -> String {
    format!(
        "<![CDATA[{}]]>",
        content.replace("]]>", "]]]]><![CDATA[>")
    )
}

/// Permalink of a post: `base_url + url + "/"`.
pub fn permalink(site: &SiteInfo, post: &Post) -> String {
    format!("{}{}/", site.base_url, post.url())
}

/// `pubDate` value: the post date at midnight UTC, RFC 2822.
pub fn pub_date(post: &Post) -> String {
    post.date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().to_rfc2822())
        .unwrap_or_default()
}

/// Serialize the feed document.
pub fn render_feed(site: &SiteInfo, entries: &[FeedEntry]) -> String {
    let markup = html! {
        (PreEscaped(r#"<?xml version="1.0" encoding="utf-8"?>"#))
        rss version="2.0" {
            channel {
                title { (site.title) }
                description { (site.description) }
                link { (site.base_url) }
                language { (site.language) }
                @for entry in entries {
                    @let link = permalink(site, entry.post);
                    item {
                        title { (entry.post.display_title()) }
                        link { (link) }
                        guid isPermaLink="true" { (link) }
                        pubDate { (pub_date(entry.post)) }
                        description { (PreEscaped(cdata(&entry.content))) }
                    }
                }
            }
        }
    };
    markup.into_string()
}
