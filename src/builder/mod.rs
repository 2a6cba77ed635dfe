pub mod icon;
pub mod manifest;
pub mod strings;
pub mod yaml;

pub use icon::{IconBuilder, IconType};
pub use manifest::ManifestBuilder;
pub use strings::StringsBuilder;
pub use yaml::YamlBuilder;

use std::path::{Path, PathBuf};

/// Where apktool puts the files the builders edit, relative to a decoded app directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AppLayout {
    root: PathBuf,
}

impl AppLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> PathBuf {
        self.root.join("AndroidManifest.xml")
    }

    pub fn apktool_yml(&self) -> PathBuf {
        self.root.join("apktool.yml")
    }

    pub fn strings(&self) -> PathBuf {
        self.root.join("res").join("values").join("strings.xml")
    }

    pub fn res(&self) -> PathBuf {
        self.root.join("res")
    }

    pub fn assets(&self) -> PathBuf {
        self.root.join("assets")
    }
}
