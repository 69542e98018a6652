use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Create the output directory and any missing parents. Existing directories
/// are left untouched.
pub(crate) fn ensure_out_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create output dir {}", path.display()))?;
    tracing::debug!(path = %path.display(), "output dir ready");
    Ok(())
}
