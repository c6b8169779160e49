//! CLI output formatting.
//!
//! Output is **information-centric, not file-centric**: every page leads with
//! its positional index and title, and filesystem paths follow as indented
//! `Source:` context lines.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Posts
//! 001 Hello (January 5, 2024)
//!     Source: 2024/hello/index.md
//!     A short summary of the post...
//! 002 Work in progress (March 1, 2024, draft)
//!     Source: 2024/wip/index.md
//!
//! Pages
//! 001 About
//!     Source: about/index.md
//! ```
//!
//! ## Build
//!
//! ```text
//! Built 3 pages (2 listed posts) → dist
//!     Overview: index.html
//!     Feed: rss.xml (2 items)
//!     Public: 4 files
//!     Script: scripts/index.js
//! ```
//!
//! ## Postprocess
//!
//! ```text
//! Stylesheet: 2048 → 1311 bytes
//! Markup: 4 documents (2 rewritten)
//!     Images: 3 (9 derivatives)
//! ```
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::assets::SCRIPT_OUTPUT;
use crate::pipeline::{BuildReport, PostprocessReport};
use crate::types::{Page, Post, listed_posts};
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Path relative to `base`, `/`-separated, falling back to the full path.
fn relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

fn post_lines(index: usize, post: &Post, pages_dir: &Path) -> Vec<String> {
    let status = if post.draft {
        format!("{}, draft", post.date_formatted)
    } else {
        post.date_formatted.clone()
    };
    let mut lines = vec![format!(
        "{} {} ({})",
        format_index(index),
        post.display_title(),
        status
    )];
    lines.push(format!(
        "{}Source: {}",
        indent(1),
        relative(&post.base.source_path, pages_dir)
    ));
    if let Some(summary) = post.summary.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        lines.push(format!("{}{}", indent(1), truncate_desc(summary, 60)));
    }
    lines
}

/// Inventory of discovered pages: listed posts in overview order, then
/// drafts, then undated pages.
pub fn format_inventory(pages: &[Page], pages_dir: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    let listed = listed_posts(pages);
    let drafts = pages
        .iter()
        .filter_map(Page::as_post)
        .filter(|post| post.draft);
    let posts: Vec<&Post> = listed.into_iter().chain(drafts).collect();

    if !posts.is_empty() {
        lines.push("Posts".to_string());
        for (i, post) in posts.iter().enumerate() {
            lines.extend(post_lines(i + 1, post, pages_dir));
        }
    }

    let info: Vec<&Page> = pages.iter().filter(|p| !p.is_post()).collect();
    if !info.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Pages".to_string());
        for (i, page) in info.iter().enumerate() {
            lines.push(format!(
                "{} {}",
                format_index(i + 1),
                page.title().unwrap_or(page.url())
            ));
            lines.push(format!(
                "{}Source: {}",
                indent(1),
                relative(&page.base().source_path, pages_dir)
            ));
        }
    }

    if lines.is_empty() {
        lines.push("No pages found".to_string());
    }
    lines
}

/// Print the page inventory to stdout.
pub fn print_inventory(pages: &[Page], pages_dir: &Path) {
    for line in format_inventory(pages, pages_dir) {
        println!("{}", line);
    }
}

/// Summary of a build run. Paths are shown relative to `root`.
pub fn format_build_report(report: &BuildReport, root: &Path) -> Vec<String> {
    let output = report.output.root();
    let mut lines = vec![format!(
        "Built {} ({}) → {}",
        plural(report.pages, "page", "pages"),
        plural(report.posts, "listed post", "listed posts"),
        relative(output, root)
    )];
    lines.push(format!(
        "{}Overview: {}",
        indent(1),
        relative(&report.overview, output)
    ));

    let skipped = if report.feed.skipped > 0 {
        format!(", {} skipped", report.feed.skipped)
    } else {
        String::new()
    };
    lines.push(format!(
        "{}Feed: {} ({}{})",
        indent(1),
        relative(&report.feed.path, output),
        plural(report.feed.items, "item", "items"),
        skipped
    ));

    match report.assets.public_files {
        Some(n) => lines.push(format!("{}Public: {}", indent(1), plural(n as usize, "file", "files"))),
        None => lines.push(format!("{}Public: none", indent(1))),
    }
    if report.assets.script {
        lines.push(format!("{}Script: {}", indent(1), SCRIPT_OUTPUT));
    }
    lines
}

/// Print the build summary to stdout.
pub fn print_build_report(report: &BuildReport, root: &Path) {
    for line in format_build_report(report, root) {
        println!("{}", line);
    }
}

/// Summary of a post-process run.
pub fn format_postprocess_report(report: &PostprocessReport) -> Vec<String> {
    let markup = &report.markup;
    vec![
        format!(
            "Stylesheet: {} → {} bytes",
            report.style.original_bytes, report.style.minified_bytes
        ),
        format!(
            "Markup: {} ({} rewritten)",
            plural(markup.documents, "document", "documents"),
            markup.rewritten
        ),
        format!(
            "{}Images: {} ({})",
            indent(1),
            markup.images,
            plural(markup.derivatives, "derivative", "derivatives")
        ),
    ]
}

/// Print the post-process summary to stdout.
pub fn print_postprocess_report(report: &PostprocessReport) {
    for line in format_postprocess_report(report) {
        println!("{}", line);
    }
}
