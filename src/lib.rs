//! Re-brand a pre-built Android APK without its sources.
//!
//! [`ApkParser`] decodes a template with apktool and edits the manifest, `apktool.yml`,
//! `strings.xml` and launcher icons in place. [`ApkSigner`] aligns and signs the rebuilt
//! package. [`Recipe`] drives both from a TOML file.

pub mod builder;
pub mod component;
pub mod core;
pub mod store;

pub use crate::component::{Component, Context};
pub use crate::core::config::Recipe;
pub use crate::core::error::{Error, Result};
pub use crate::core::packager::{ApkParser, ApkSigner, KeyProvider, SigningKey, ToolNames};
pub use crate::core::process::{CommandRunner, ShellCommandRunner};
