//! Shared page types produced by discovery and consumed by every build stage.
//!
//! A page either has a publication date or it does not, and that single fact
//! decides whether it shows up in the listing and the feed. The distinction is
//! made once, when the page is constructed, and carried as an enum variant:
//!
//! - [`Page::Info`]: static/info pages (about, imprint, ...)
//! - [`Page::Post`]: dated articles

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Fields every page carries.
#[derive(Debug, Clone, Serialize)]
pub struct PageBase {
    /// Absolute path of the source `index.md`.
    pub source_path: PathBuf,
    /// Site-relative URL of the containing directory, e.g. `/2024/hello`.
    pub url: String,
    /// Display title. Info pages may omit it.
    pub title: Option<String>,
    /// Rendered HTML body.
    pub content: String,
    /// Unrecognized front matter fields, passed through untouched.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// A dated article.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    #[serde(flatten)]
    pub base: PageBase,
    pub date: NaiveDate,
    /// Human-readable date, formatted once at discovery time.
    pub date_formatted: String,
    /// The `abstract` front matter field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Drafts are built but left out of the listing and the feed.
    pub draft: bool,
}

/// One discovered content unit.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Page {
    Info(PageBase),
    Post(Post),
}

impl Page {
    pub fn base(&self) -> &PageBase {
        match self {
            Page::Info(base) => base,
            Page::Post(post) => &post.base,
        }
    }

    pub fn url(&self) -> &str {
        &self.base().url
    }

    pub fn title(&self) -> Option<&str> {
        self.base().title.as_deref()
    }

    pub fn as_post(&self) -> Option<&Post> {
        match self {
            Page::Post(post) => Some(post),
            Page::Info(_) => None,
        }
    }

    pub fn is_post(&self) -> bool {
        self.as_post().is_some()
    }

    /// Page description for the layout `<meta>`: the post summary, if any.
    pub fn description(&self) -> Option<&str> {
        self.as_post().and_then(|p| p.summary.as_deref())
    }
}

impl Post {
    pub fn url(&self) -> &str {
        &self.base.url
    }

    /// Title for listing and feed entries, falling back to the URL.
    pub fn display_title(&self) -> &str {
        self.base.title.as_deref().unwrap_or(&self.base.url)
    }
}

/// Non-draft posts ordered for the listing and the feed: newest first,
/// discovery order preserved among posts sharing a date.
pub fn listed_posts(pages: &[Page]) -> Vec<&Post> {
    let mut posts: Vec<&Post> = pages
        .iter()
        .filter_map(Page::as_post)
        .filter(|p| !p.draft)
        .collect();
    // `sort_by` is stable, which keeps ties in discovery order.
    posts.sort_by(|a, b| b.date.cmp(&a.date));
    posts
}
