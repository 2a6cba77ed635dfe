use crate::component::{FacebookComponent, GoogleComponent, LinkDeepComponent};
use crate::core::error::{Error, IoContext, Result};
use crate::core::packager::{ApkParser, ApkSigner, SdkBuildToolsLocator, SigningKey, ToolNames};
use crate::core::process::CommandRunner;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One tenant variant of a template APK, read from a TOML file.
///
/// Every group carries `#[serde(default)]` so a missing group never fails the whole recipe.
/// Relative paths are resolved against the directory holding the recipe.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Recipe {
    pub template: PathBuf,
    pub output: PathBuf,

    #[serde(default)]
    pub app: AppConfig,

    /// Components run only when their group is present.
    #[serde(default)]
    pub google: Option<GoogleComponent>,
    #[serde(default)]
    pub facebook: Option<FacebookComponent>,
    #[serde(default)]
    pub link_deep: Option<LinkDeepComponent>,

    #[serde(default)]
    pub signing: SigningConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub package_name: Option<String>,
    pub display_name: Option<String>,
    pub version_name: Option<String>,
    pub version_code: Option<String>,
    /// Local path or `http(s)://` URL of a 1024x1024 PNG.
    pub icon: Option<String>,
    pub round_icon: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SigningConfig {
    pub enabled: bool,
    /// Without a keystore a throwaway key is generated for every run.
    pub keystore: Option<PathBuf>,
    pub alias: Option<String>,
    pub key_password: Option<String>,
    pub store_password: Option<String>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keystore: None,
            alias: None,
            key_password: None,
            store_password: None,
        }
    }
}

impl SigningConfig {
    /// The configured key. The store password doubles as key password when only one is set.
    pub fn key(&self) -> Option<SigningKey> {
        let path = self.keystore.clone()?;
        let store_password = self.store_password.clone().or(self.key_password.clone())?;
        Some(SigningKey {
            path,
            alias: self.alias.clone()?,
            key_password: self.key_password.clone().unwrap_or(store_password.clone()),
            store_password,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ToolsConfig {
    pub timeout_secs: u64,
    /// Android SDK holding `build-tools/`; the platform default when unset.
    pub sdk_home: Option<PathBuf>,
    #[serde(flatten)]
    pub names: ToolNames,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            sdk_home: None,
            names: ToolNames::default(),
        }
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn locator(&self) -> SdkBuildToolsLocator {
        match &self.sdk_home {
            Some(sdk_home) => SdkBuildToolsLocator::new(sdk_home),
            None => SdkBuildToolsLocator::platform_default(),
        }
    }
}

fn is_url(source: &str) -> bool {
    source.contains("://")
}

impl Recipe {
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).io_context(|| format!("Reading recipe `{}`", path.display()))?;
        let mut recipe = Self::parse(&content).map_err(|reason| Error::Config {
            path: path.to_path_buf(),
            reason,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        recipe.resolve_paths(base);
        Ok(recipe)
    }

    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|err| err.to_string())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.template);
        resolve(&mut self.output);
        if let Some(keystore) = &mut self.signing.keystore {
            resolve(keystore);
        }
        if let Some(sdk_home) = &mut self.tools.sdk_home {
            resolve(sdk_home);
        }
        for icon in [&mut self.app.icon, &mut self.app.round_icon]
            .into_iter()
            .flatten()
        {
            if !is_url(icon) && Path::new(icon.as_str()).is_relative() {
                *icon = base.join(icon.as_str()).display().to_string();
            }
        }
    }

    /// Decodes the template, applies every configured edit, rebuilds and, unless disabled,
    /// signs and verifies the result. Returns the path of the produced APK.
    pub fn run<R: CommandRunner>(&self, runner: &R) -> Result<PathBuf> {
        let mut parser = ApkParser::with_tools(
            &self.template,
            runner,
            self.tools.names.clone(),
            self.tools.timeout(),
        )?;

        let app = &self.app;
        if let Some(package_name) = &app.package_name {
            parser.try_replace_package_name(package_name)?;
        }
        if let Some(display_name) = &app.display_name {
            parser.try_replace_display_name(display_name)?;
        }
        if let Some(version_name) = &app.version_name {
            parser.try_replace_version_name(version_name)?;
        }
        if let Some(version_code) = &app.version_code {
            parser.try_replace_version_code(version_code)?;
        }
        if let Some(icon) = &app.icon {
            parser.replace_icon(icon)?;
        }
        if let Some(round_icon) = &app.round_icon {
            parser.replace_round_icon(round_icon)?;
        }

        if let Some(google) = &self.google {
            parser.apply(google)?;
        }
        if let Some(facebook) = &self.facebook {
            parser.apply(facebook)?;
        }
        if let Some(link_deep) = &self.link_deep {
            parser.apply(link_deep)?;
        }

        if !self.signing.enabled {
            if let Some(parent) = self.output.parent() {
                fs::create_dir_all(parent)
                    .io_context(|| format!("Creating `{}`", parent.display()))?;
            }
            parser.build(&self.output)?;
            return Ok(self.output.clone());
        }

        let unsigned = parser.workspace().join("unsigned.apk");
        parser.build(&unsigned)?;
        let signer = ApkSigner::new(runner)
            .with_tools(self.tools.names.clone())
            .with_timeout(self.tools.timeout())
            .with_locator(self.tools.locator());
        let key = self.signing.key();
        if self.signing.keystore.is_some() && key.is_none() {
            log::warn!("keystore set without alias or password, generating a throwaway key");
        }
        signer.sign(&unsigned, &self.output, key.as_ref())?;
        signer.verify_alignment(&self.output)?;
        signer.verify_signature(&self.output)?;
        Ok(self.output.clone())
    }
}
