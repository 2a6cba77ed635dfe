use crate::core::error::{IoContext, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// A scratch directory under `<tempdir>/<scope>/<id>` that is deleted when dropped.
///
/// Call [`Workspace::keep`] to leave the tree on disk, e.g. to inspect a failed run.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    keep: bool,
}

impl Workspace {
    pub fn create(scope: &str) -> Result<Self> {
        Self::create_in(&std::env::temp_dir().join(scope))
    }

    pub fn create_in(base: &Path) -> Result<Self> {
        Self::at(base.join(unique_id()))
    }

    /// Like [`Workspace::create`], with the directory named `<prefix>-<id>`.
    pub fn create_prefixed(scope: &str, prefix: &str) -> Result<Self> {
        let name = format!("{}-{}", prefix, unique_id());
        Self::at(std::env::temp_dir().join(scope).join(name))
    }

    fn at(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .io_context(|| format!("Creating workspace `{}`", root.display()))?;
        log::debug!("workspace created at {}", root.display());
        Ok(Self { root, keep: false })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    /// Release the handle without deleting the tree and return its path.
    pub fn keep(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.root)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.keep || self.root.as_os_str().is_empty() {
            return;
        }
        if let Err(err) = fs::remove_dir_all(&self.root) {
            log::warn!(
                "failed to clear workspace {}: {}",
                self.root.display(),
                err
            );
        }
    }
}

/// Random RFC 4122 v4 identifier.
///
/// 122 bits come from `rand`; the version nibble is forced to `4` and the variant bits to `10`.
pub fn unique_id() -> String {
    let bits = rand::random::<u128>();
    let bits = (bits & !(0xf << 76) | (0x4 << 76)) & !(0x3 << 62) | (0x2 << 62);
    let hex = format!("{:032X}", bits);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
