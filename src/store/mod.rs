//! In-memory documents loaded from the decoded APK tree.

pub mod xml;
pub mod yaml;

use crate::core::error::{Error, IoContext, Result};
use std::io::Write;
use std::path::Path;

pub use xml::{Element, Node, XmlDocument};
pub use yaml::YamlDocument;

/// Writes `contents` to a temporary file next to `path`, then renames it over `path`.
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)
        .io_context(|| format!("Creating temporary file in `{}`", dir.display()))?;
    file.write_all(contents)
        .io_context(|| format!("Writing `{}`", path.display()))?;
    file.persist(path)
        .map_err(|err| Error::io(format!("Replacing `{}`", path.display()), err.error))?;
    Ok(())
}
