//! # postpress
//!
//! A static blog builder. The page tree is the data source: every `index.md`
//! becomes a page at the URL of its directory, and pages whose front matter
//! declares a date are posts, listed newest first on the home page and in
//! the RSS feed.
//!
//! # Architecture: Build, then Post-process
//!
//! ```text
//! 1. Build        src/pages/  →  dist/     (markdown → HTML, listing, feed, assets)
//! 2. Postprocess  dist/       →  dist/     (stylesheet, responsive images, view transitions)
//! ```
//!
//! The build phase owns the output directory: it is cleared and rewritten on
//! every run. The post-process phase only rewrites what the build produced,
//! so it can be re-run on its own and leaves an already processed tree
//! unchanged.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Run context, `build` and `postprocess` orchestration, the [`pipeline::BuildOutput`] handle |
//! | [`discover`] | Walks the page tree, parses front matter, renders bodies |
//! | [`frontmatter`] | YAML front matter splitting and date parsing |
//! | [`render`] | Markdown to HTML with `pulldown-cmark` and `syntect` highlighting |
//! | [`assemble`] | Wraps pages in the layout and mirrors them into the output |
//! | [`overview`] | Home page listing of posts |
//! | [`feed`] | RSS 2.0 feed from rendered or built pages |
//! | [`assets`] | Copies `public/` and the entry script |
//! | [`templates`] | Maud layout and listing markup |
//! | [`style`] | Stylesheet minification and browser targeting with `lightningcss` |
//! | [`postprocess`] | Rewrites built `<img>` elements and adds view-transition names |
//! | [`imaging`] | Pure-Rust image operations: breakpoints, planning, resize, encode |
//! | [`annotate`] | `view-transition-name` annotation of listing and article headings |
//! | [`config`] | `postpress.toml` loading and validation |
//! | [`types`] | Page and post types shared by every stage |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Pages and Posts Are One Enum
//!
//! A page is a post exactly when its front matter declares a date. That
//! branch is taken once, at discovery, and produces a [`types::Page::Post`]
//! with a parsed date. Nothing downstream re-checks optional fields.
//!
//! ## Maud Over Template Engines
//!
//! HTML and the RSS document are generated with [Maud](https://maud.lambda.xyz/).
//! Interpolation is escaped by default; rendered markdown and CDATA sections
//! are the only places that opt out with `PreEscaped`.
//!
//! ## Rewriting HTML as a Stream
//!
//! The post-process phase never parses a DOM. `lol_html` streams each
//! document through CSS-selector handlers, so untouched markup passes through
//! byte for byte and a second run finds nothing to change.
//!
//! ## Pure-Rust Imaging
//!
//! Derivatives are resized with the `image` crate (Lanczos3) and encoded as
//! AVIF with `rav1e` or as lossless WebP. No system libraries are needed.
//!
//! ## No Globals
//!
//! A [`pipeline::Context`] carries the config, resolved paths, renderer and
//! image backend. Tests swap the renderer and backend through the
//! [`render::ContentRenderer`] and [`imaging::ImageBackend`] traits.

pub mod annotate;
pub mod assemble;
pub mod assets;
pub mod config;
pub mod discover;
pub mod feed;
pub mod frontmatter;
pub mod imaging;
pub mod output;
pub mod overview;
pub mod pipeline;
pub mod postprocess;
pub mod render;
pub mod style;
pub mod templates;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
