//! Print content hashes.

use anyhow::{Context, Result};
use peersync_types::FileInfo;
use std::path::Path;

/// Run the hash command.
pub fn run(path: &Path) -> Result<()> {
    let info = FileInfo::from_disk(path)
        .with_context(|| format!("Failed to hash {}", path.display()))?;
    let kind = if info.is_folder { "folder" } else { "file" };
    println!("{}  {}  {}", info.content_hash, kind, path.display());
    Ok(())
}
