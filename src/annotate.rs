//! View-transition annotation.
//!
//! Links a listing entry and the article it points to with a shared
//! `view-transition-name`, so browsers can morph one heading into the other
//! on navigation:
//!
//! - A document with `article h2` headings (the listing) names each heading
//!   after the `href` of its first link.
//! - Any other document names its first `main h1` after its own directory.
//!
//! Both sides derive the name from the same site path, so `/2024/hello` on
//! the listing and `2024/hello/index.html` agree on `vt-2024-hello`.

use lol_html::{RewriteStrSettings, element, rewrite_str};
use std::cell::RefCell;
use thiserror::Error;

const PROPERTY: &str = "view-transition-name";

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("HTML rewrite failed: {0}")]
    Rewrite(String),
}

/// CSS ident for a site path: `vt-` + the path without surrounding slashes,
/// every character outside `[A-Za-z0-9_-]` replaced by `-`.
pub fn transition_name(path: &str) -> Option<String> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    let ident: String = trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    Some(format!("vt-{ident}"))
}

/// `style` value with the transition name appended, or `None` if the
/// element already carries one.
fn with_transition(style: Option<String>, name: &str) -> Option<String> {
    let style = style.unwrap_or_default();
    if style.contains(PROPERTY) {
        return None;
    }
    let existing = style.trim_end();
    let declaration = format!("{PROPERTY}: {name}");
    Some(if existing.is_empty() {
        declaration
    } else if existing.ends_with(';') {
        format!("{existing} {declaration}")
    } else {
        format!("{existing}; {declaration}")
    })
}

/// Add view-transition names to a document. `page_dir` is the document's
/// directory relative to the output root (empty for the root).
///
/// Documents with nothing to annotate are returned unchanged.
pub fn annotate_headings(html: &str, page_dir: &str) -> Result<String, AnnotateError> {
    let targets = listing_targets(html)?;
    if !targets.is_empty() {
        return annotate_listing(html, &targets);
    }
    match transition_name(page_dir) {
        Some(name) => annotate_article(html, &name),
        None => Ok(html.to_string()),
    }
}

/// First link `href` of every `article h2`, in document order.
fn listing_targets(html: &str) -> Result<Vec<Option<String>>, AnnotateError> {
    let headings: RefCell<Vec<Option<String>>> = RefCell::new(Vec::new());

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("article h2", |_el| {
                    headings.borrow_mut().push(None);
                    Ok(())
                }),
                element!("article h2 a[href]", |el| {
                    if let Some(slot) = headings.borrow_mut().last_mut() {
                        if slot.is_none() {
                            *slot = el.get_attribute("href");
                        }
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::new()
        },
    )
    .map_err(|e| AnnotateError::Rewrite(e.to_string()))?;

    Ok(headings.into_inner())
}

fn annotate_listing(html: &str, targets: &[Option<String>]) -> Result<String, AnnotateError> {
    let mut index = 0;
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("article h2", |el| {
                let target = targets.get(index).cloned().flatten();
                index += 1;
                let style = target
                    .as_deref()
                    .and_then(transition_name)
                    .and_then(|name| with_transition(el.get_attribute("style"), &name));
                if let Some(style) = style {
                    el.set_attribute("style", &style)?;
                }
                Ok(())
            })],
            ..RewriteStrSettings::new()
        },
    )
    .map_err(|e| AnnotateError::Rewrite(e.to_string()))
}

fn annotate_article(html: &str, name: &str) -> Result<String, AnnotateError> {
    let mut first = true;
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("main h1", |el| {
                if first {
                    first = false;
                    if let Some(style) = with_transition(el.get_attribute("style"), name) {
                        el.set_attribute("style", &style)?;
                    }
                }
                Ok(())
            })],
            ..RewriteStrSettings::new()
        },
    )
    .map_err(|e| AnnotateError::Rewrite(e.to_string()))
}
