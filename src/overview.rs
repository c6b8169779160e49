//! Article overview.
//!
//! Writes the site's front page, `<output>/index.html`: every listed post,
//! newest first, inside the root layout with the site description.

use crate::assemble::{AssembleError, page_output_path, write_document};
use crate::pipeline::Context;
use crate::templates::{self, LayoutProps};
use crate::types::Post;
use std::path::PathBuf;
use tracing::info;

/// Render the listing of `posts` (already in listing order) to
/// `<output>/index.html`. Returns the written path.
pub fn build_overview(posts: &[&Post], ctx: &Context) -> Result<PathBuf, AssembleError> {
    let path = page_output_path(&ctx.paths.output, "/");
    let document = templates::layout(
        &ctx.chrome(),
        LayoutProps {
            title: None,
            description: None,
            content: templates::listing(posts),
        },
    );
    write_document(&path, document)?;

    info!(target: "build_overview", "Listed {} posts in {}", posts.len(), path.display());
    Ok(path)
}
