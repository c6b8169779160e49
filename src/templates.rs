//! HTML templates.
//!
//! Two pure functions produce every document the build writes: [`layout`]
//! wraps a content fragment in the site shell, [`listing`] renders the
//! article overview. Both are [maud](https://maud.lambda.xyz/) markup, so all
//! interpolated text is escaped and only already-rendered page HTML is
//! spliced in through [`PreEscaped`].

use crate::config::{SiteConfig, SiteInfo};
use crate::types::Post;
use maud::{DOCTYPE, Markup, PreEscaped, html};

/// Site-wide parts shared by every document.
#[derive(Debug, Clone)]
pub struct Chrome<'a> {
    pub site: &'a SiteInfo,
    /// Root-absolute stylesheet href, e.g. `/styles/main.css`.
    pub stylesheet: String,
    /// Root-absolute entry script href, when the site has one.
    pub script: Option<String>,
}

impl<'a> Chrome<'a> {
    pub fn new(config: &'a SiteConfig, has_script: bool) -> Self {
        Self {
            site: &config.site,
            stylesheet: format!("/{}", config.styles.path.trim_start_matches('/')),
            script: has_script.then(|| format!("/{}", crate::assets::SCRIPT_OUTPUT)),
        }
    }
}

/// Per-document layout input.
pub struct LayoutProps<'a> {
    /// Page title, rendered as the `main` heading. `None` uses the bare
    /// site title and renders no heading.
    pub title: Option<&'a str>,
    /// `<meta name="description">`. `None` uses the site description.
    pub description: Option<&'a str>,
    pub content: Markup,
}

/// `<title>` text: `Page | Site`, or just the site title.
pub fn document_title(site: &SiteInfo, title: Option<&str>) -> String {
    match title {
        Some(t) if !t.is_empty() && t != site.title => format!("{} | {}", t, site.title),
        _ => site.title.clone(),
    }
}

/// Renders a full HTML document around `props.content`.
pub fn layout(chrome: &Chrome, props: LayoutProps) -> Markup {
    let site = chrome.site;
    let description = props.description.unwrap_or(&site.description);

    html! {
        (DOCTYPE)
        html lang=(site.language) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (document_title(site, props.title)) }
                meta name="description" content=(description);
                link rel="stylesheet" href=(chrome.stylesheet);
                link rel="alternate" type="application/rss+xml" title=(site.title) href="/rss.xml";
                @if let Some(script) = &chrome.script {
                    script type="module" src=(script) {}
                }
            }
            body {
                header.site-header {
                    a.site-title href="/" { (site.title) }
                }
                main {
                    @if let Some(title) = props.title {
                        h1 { (title) }
                    }
                    (props.content)
                }
                footer.site-footer {
                    a href="/rss.xml" { "RSS" }
                }
            }
        }
    }
}

/// Page body as rendered by the markdown stage.
pub fn page_content(html: &str) -> Markup {
    PreEscaped(html.to_string())
}

/// Renders the article overview, one `<article>` per post, in the given order.
pub fn listing(posts: &[&Post]) -> Markup {
    html! {
        @for post in posts {
            article {
                time datetime=(post.date.format("%Y-%m-%d").to_string()) { (post.date_formatted) }
                h2 {
                    a href=(post.url()) { (post.display_title()) }
                }
                @if let Some(summary) = &post.summary {
                    p { (summary) }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{as_post, post};

    fn chrome(config: &SiteConfig) -> Chrome<'_> {
        Chrome::new(config, false)
    }

    #[test]
    fn layout_wraps_content_in_main() {
        let config = SiteConfig::default();
        let html = layout(
            &chrome(&config),
            LayoutProps {
                title: Some("Hello"),
                description: None,
                content: page_content("<p>Body</p>"),
            },
        )
        .into_string();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<main><h1>Hello</h1><p>Body</p></main>"));
        assert!(html.contains("<title>Hello | My Blog</title>"));
        assert!(html.contains(r#"<html lang="en">"#));
    }

    #[test]
    fn layout_description_falls_back_to_site() {
        let config = SiteConfig::default();
        let html = layout(
            &chrome(&config),
            LayoutProps {
                title: None,
                description: None,
                content: html! {},
            },
        )
        .into_string();
        assert!(html.contains(&format!(
            r#"<meta name="description" content="{}">"#,
            config.site.description
        )));
        assert!(html.contains("<title>My Blog</title>"));
        assert!(html.contains("<main></main>"));
    }

    #[test]
    fn layout_escapes_title_and_description() {
        let config = SiteConfig::default();
        let html = layout(
            &chrome(&config),
            LayoutProps {
                title: Some("Tom & Jerry"),
                description: Some("<b>bold</b>"),
                content: html! {},
            },
        )
        .into_string();
        assert!(html.contains("Tom &amp; Jerry"));
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;"));
    }

    #[test]
    fn layout_links_stylesheet_and_optional_script() {
        let config = SiteConfig::default();
        let without = layout(
            &Chrome::new(&config, false),
            LayoutProps {
                title: None,
                description: None,
                content: html! {},
            },
        )
        .into_string();
        assert!(without.contains(r#"href="/styles/main.css""#));
        assert!(!without.contains("<script"));

        let with = layout(
            &Chrome::new(&config, true),
            LayoutProps {
                title: None,
                description: None,
                content: html! {},
            },
        )
        .into_string();
        assert!(with.contains(r#"<script type="module" src="/scripts/index.js"></script>"#));
    }

    #[test]
    fn listing_entry_shape() {
        let mut page = post("/2024/hello", "2024-01-05");
        if let crate::types::Page::Post(p) = &mut page {
            p.base.title = Some("Hello".to_string());
            p.summary = Some("First".to_string());
        }
        let html = listing(&[as_post(&page)]).into_string();
        assert_eq!(
            html,
            "<article><time datetime=\"2024-01-05\">January 5, 2024</time>\
             <h2><a href=\"/2024/hello\">Hello</a></h2><p>First</p></article>"
        );
    }

    #[test]
    fn listing_omits_missing_summary() {
        let page = post("/a", "2024-01-05");
        let html = listing(&[as_post(&page)]).into_string();
        assert!(!html.contains("<p>"));
    }

    #[test]
    fn listing_keeps_given_order() {
        let a = post("/a", "2024-01-01");
        let b = post("/b", "2024-06-01");
        let html = listing(&[as_post(&b), as_post(&a)]).into_string();
        let pos_a = html.find(r#"href="/a""#).unwrap();
        let pos_b = html.find(r#"href="/b""#).unwrap();
        assert!(pos_b < pos_a);
    }

    #[test]
    fn document_title_avoids_duplicate_site_name() {
        let site = SiteInfo::default();
        assert_eq!(document_title(&site, Some("My Blog")), "My Blog");
        assert_eq!(document_title(&site, Some("")), "My Blog");
        assert_eq!(document_title(&site, Some("About")), "About | My Blog");
    }
}
