//! Static asset copying.
//!
//! Two independent copies run during the build phase:
//!
//! - `public/` is mirrored verbatim into the output root. A site without a
//!   public directory simply has nothing to copy.
//! - The entry script is copied to [`SCRIPT_OUTPUT`] when it exists. No
//!   bundling or transpiling happens here.

use crate::pipeline::Context;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Entry script location relative to the output root.
pub const SCRIPT_OUTPUT: &str = "scripts/index.js";

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

/// What the asset stage copied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetSummary {
    /// Files copied from `public/`; `None` when the directory is absent.
    pub public_files: Option<u64>,
    /// Whether an entry script was copied.
    pub script: bool,
}

/// Copy `public/` and the entry script into the output directory.
pub fn copy_assets(ctx: &Context) -> Result<AssetSummary, AssetError> {
    let (public_files, script) = rayon::join(
        || copy_public(&ctx.paths.public, &ctx.paths.output),
        || copy_script(&ctx.paths.script, &ctx.paths.output),
    );
    Ok(AssetSummary {
        public_files: public_files?,
        script: script?,
    })
}

/// Mirror `public_dir` into `output_dir`. Returns the number of files copied,
/// or `None` if there is no public directory.
pub fn copy_public(public_dir: &Path, output_dir: &Path) -> Result<Option<u64>, AssetError> {
    if !public_dir.is_dir() {
        info!(target: "copy_public", "No public directory at {}, skipping", public_dir.display());
        return Ok(None);
    }

    let copied = copy_dir_recursive(public_dir, output_dir).map_err(|source| AssetError::Copy {
        from: public_dir.to_path_buf(),
        to: output_dir.to_path_buf(),
        source,
    })?;
    info!(target: "copy_public", "Copied {} files from {}", copied, public_dir.display());
    Ok(Some(copied))
}

/// Copy the entry script to `scripts/index.js`. Returns whether it existed.
pub fn copy_script(script: &Path, output_dir: &Path) -> Result<bool, AssetError> {
    if !script.is_file() {
        info!(target: "copy_scripts", "No entry script at {}, skipping", script.display());
        return Ok(false);
    }

    let target = output_dir.join(SCRIPT_OUTPUT);
    let copy = || -> io::Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(script, &target)?;
        Ok(())
    };
    copy().map_err(|source| AssetError::Copy {
        from: script.to_path_buf(),
        to: target.clone(),
        source,
    })?;

    info!(target: "copy_scripts", "Copied {} → {}", script.display(), target.display());
    Ok(true)
}

/// Recursively copy `src` into `dst`, creating directories as needed.
/// Returns the number of files copied.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<u64> {
    fs::create_dir_all(dst)?;
    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            copied += copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
            copied += 1;
        }
    }
    Ok(copied)
}
