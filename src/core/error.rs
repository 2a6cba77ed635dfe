use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("can't find template APK at `{}`", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("`{binary}` not found in PATH")]
    ToolNotFound { binary: String },

    #[error("`{binary} {}` exited with code {code:?}\n\n{output}", .args.join(" "))]
    ExternalToolFailed {
        binary: String,
        args: Vec<String>,
        code: Option<i32>,
        output: String,
    },

    #[error("`{binary} {}` timed out after {timeout:?}", .args.join(" "))]
    ExternalToolTimeout {
        binary: String,
        args: Vec<String>,
        timeout: Duration,
    },

    #[error("malformed XML in `{}`: {reason}", .path.display())]
    MalformedXml { path: PathBuf, reason: String },

    #[error("malformed YAML in `{}`: {reason}", .path.display())]
    MalformedYaml { path: PathBuf, reason: String },

    #[error("invalid icon format at `{}`, expected PNG", .path.display())]
    InvalidIconFormat { path: PathBuf },

    #[error("invalid icon size {width}x{height} at `{}`, expected 1024x1024", .path.display())]
    InvalidIconSize {
        path: PathBuf,
        width: u32,
        height: u32,
    },

    #[error("icon source `{source_url}` unavailable: {reason}")]
    IconSourceUnavailable { source_url: String, reason: String },

    #[error("keystore generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("component failed: {0:#}")]
    Component(anyhow::Error),

    #[error("invalid config `{}`: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// True for failures reported by one of the external binaries.
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            Self::ToolNotFound { .. } | Self::ExternalToolFailed { .. } | Self::ExternalToolTimeout { .. }
        )
    }
}

/// Attach a description to `std::io` failures, in the spirit of `anyhow::Context`.
pub(crate) trait IoContext<T> {
    fn io_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|source| Error::io(f(), source))
    }
}
