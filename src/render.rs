//! Markdown to HTML rendering.
//!
//! Discovery only needs `render(body) -> html`; the [`ContentRenderer`] trait
//! is that seam. [`MarkdownRenderer`] is the production implementation:
//! `pulldown-cmark` for markdown and `syntect` for fenced code blocks.
//!
//! The syntax set and theme are loaded once, when the renderer is built, and
//! shared read-only by every page rendered during the run.

use crate::config::MarkdownConfig;
use maud::html;
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd, html as md_html};
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::{SyntaxReference, SyntaxSet};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Unknown highlighting theme: {0}")]
    UnknownTheme(String),
}

/// Converts a page body to HTML.
pub trait ContentRenderer: Sync {
    fn render(&self, body: &str) -> String;
}

pub struct MarkdownRenderer {
    syntaxes: SyntaxSet,
    theme: Theme,
    /// Lowercased language tokens eligible for highlighting; empty = all.
    languages: Vec<String>,
}

impl MarkdownRenderer {
    pub fn new(config: &MarkdownConfig) -> Result<Self, RenderError> {
        let mut themes = ThemeSet::load_defaults();
        let theme = themes
            .themes
            .remove(&config.theme)
            .ok_or_else(|| RenderError::UnknownTheme(config.theme.clone()))?;

        Ok(Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            theme,
            languages: config.languages.iter().map(|l| l.to_lowercase()).collect(),
        })
    }

    fn options() -> Options {
        Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
    }

    /// Syntax for a fence info string like `rust` or `rust,ignore`.
    fn syntax_for(&self, info: &str) -> Option<&SyntaxReference> {
        let token = info
            .split(|c: char| c == ',' || c.is_whitespace())
            .next()
            .unwrap_or("")
            .to_lowercase();
        if token.is_empty() {
            return None;
        }
        if !self.languages.is_empty() && !self.languages.contains(&token) {
            return None;
        }
        self.syntaxes.find_syntax_by_token(&token)
    }

    fn highlight(&self, code: &str, info: &str) -> String {
        let highlighted = self
            .syntax_for(info)
            .and_then(|syntax| {
                highlighted_html_for_string(code, &self.syntaxes, syntax, &self.theme).ok()
            });

        match highlighted {
            Some(html) => html,
            None => html! {
                pre { code class={ "language-" (info) } { (code) } }
            }
            .into_string(),
        }
    }
}

impl ContentRenderer for MarkdownRenderer {
    fn render(&self, body: &str) -> String {
        let parser = Parser::new_ext(body, Self::options());

        let mut events = Vec::new();
        // (fence info, collected code) while inside a highlighted block
        let mut code_block: Option<(String, String)> = None;

        for event in parser {
            if let Some((info, code)) = code_block.as_mut() {
                match event {
                    Event::Text(text) => code.push_str(&text),
                    Event::End(TagEnd::CodeBlock) => {
                        let html = self.highlight(code, info);
                        events.push(Event::Html(html.into()));
                        code_block = None;
                    }
                    _ => {}
                }
                continue;
            }

            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))
                    if self.syntax_for(&info).is_some() =>
                {
                    code_block = Some((info.to_string(), String::new()));
                }
                other => events.push(other),
            }
        }

        let mut html = String::new();
        md_html::push_html(&mut html, events.into_iter());
        html
    }
}
