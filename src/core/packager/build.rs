use super::{args, ToolNames};
use crate::builder::{AppLayout, IconBuilder, IconType, ManifestBuilder, StringsBuilder, YamlBuilder};
use crate::component::{Component, Context};
use crate::core::error::{Error, IoContext, Result};
use crate::core::process::{CommandRunner, DEFAULT_TIMEOUT};
use crate::core::workspace::Workspace;
use crate::store::write_atomically;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const RENAME_NULL: &str = "renameManifestPackage: null";
const STRING_REFERENCE: &str = "@string/";

/// A template APK decoded into a private workspace, ready to be edited and rebuilt.
///
/// The `replace_*` setters are chainable and best effort: a failure is logged and the call
/// becomes a no-op. Their `try_replace_*` twins return the error instead. Decoding,
/// rebuilding, icon replacement and components always report failures.
pub struct ApkParser<R: CommandRunner> {
    runner: R,
    tools: ToolNames,
    timeout: Duration,
    layout: AppLayout,
    workspace: Workspace,
}

impl<R: CommandRunner> fmt::Debug for ApkParser<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApkParser")
            .field("app_directory", &self.layout.root())
            .field("tools", &self.tools)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<R: CommandRunner> ApkParser<R> {
    pub fn new(template: &Path, runner: R) -> Result<Self> {
        Self::with_tools(template, runner, ToolNames::default(), DEFAULT_TIMEOUT)
    }

    /// Decodes `template` with `<decompiler> d -f <apk> -o <workspace>/apk`.
    pub fn with_tools(
        template: &Path,
        runner: R,
        tools: ToolNames,
        timeout: Duration,
    ) -> Result<Self> {
        if !template.is_file() {
            return Err(Error::TemplateNotFound(template.to_path_buf()));
        }
        let workspace = Workspace::create("APKParser")?;
        let layout = AppLayout::new(workspace.join("apk"));
        log::info!("decoding {}", template.display());
        runner.run(
            &tools.decompiler,
            &args([
                "d",
                "-f",
                template.display().to_string().as_str(),
                "-o",
                layout.root().display().to_string().as_str(),
            ]),
            &HashMap::new(),
            timeout,
        )?;
        Ok(Self {
            runner,
            tools,
            timeout,
            layout,
            workspace,
        })
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    /// Keeps the workspace on disk after the parser is gone and returns its path.
    pub fn keep_workspace(self) -> PathBuf {
        self.workspace.keep()
    }

    pub fn app_directory(&self) -> &Path {
        self.layout.root()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.layout.manifest()
    }

    pub fn apktool_yml_path(&self) -> PathBuf {
        self.layout.apktool_yml()
    }

    pub fn strings_path(&self) -> PathBuf {
        self.layout.strings()
    }

    pub fn res_directory(&self) -> PathBuf {
        self.layout.res()
    }

    pub fn assets_directory(&self) -> PathBuf {
        self.layout.assets()
    }

    fn manifest(&self) -> Result<ManifestBuilder> {
        ManifestBuilder::load(&self.layout.manifest())
    }

    fn yaml(&self) -> Result<YamlBuilder> {
        YamlBuilder::load(&self.layout.apktool_yml())
    }

    pub fn package_name(&self) -> Option<String> {
        let manifest = self.manifest().ok()?;
        manifest.package_name().map(str::to_string)
    }

    /// The application label, resolved through `strings.xml` when it is a `@string/` reference.
    pub fn display_name(&self) -> Option<String> {
        let manifest = self.manifest().ok()?;
        let label = manifest.application_label()?;
        match label.strip_prefix(STRING_REFERENCE) {
            Some(name) => StringsBuilder::load(&self.layout.strings()).ok()?.value(name),
            None => Some(label.to_string()),
        }
    }

    pub fn version(&self) -> Option<String> {
        self.yaml().ok()?.version_name()
    }

    pub fn version_code(&self) -> Option<String> {
        self.yaml().ok()?.version_code()
    }

    /// `<versionName>.<versionCode>`, or `None` when either is missing.
    pub fn version_with_code(&self) -> Result<Option<String>> {
        let yaml = self.yaml()?;
        Ok(yaml
            .version_name()
            .zip(yaml.version_code())
            .map(|(name, code)| format!("{}.{}", name, code)))
    }

    /// Renames the manifest package and records it as `renameManifestPackage` in
    /// `apktool.yml`, which apktool applies to the resource table on rebuild.
    pub fn try_replace_package_name(&mut self, package_name: &str) -> Result<()> {
        let path = self.layout.manifest();
        self.manifest()?
            .replace_package_name(package_name)
            .save(&path)?;

        let yml = self.layout.apktool_yml();
        let content =
            std::fs::read_to_string(&yml).io_context(|| format!("Reading `{}`", yml.display()))?;
        if content.contains(RENAME_NULL) {
            let replaced = format!("renameManifestPackage: {}", package_name);
            write_atomically(&yml, content.replace(RENAME_NULL, &replaced).as_bytes())?;
        } else {
            let mut yaml = self.yaml()?;
            if yaml.rename_manifest_package().as_deref() != Some(package_name) {
                yaml.set_rename_manifest_package(Some(package_name)).save(&yml)?;
            }
        }
        Ok(())
    }

    pub fn replace_package_name(&mut self, package_name: &str) -> &mut Self {
        if let Err(err) = self.try_replace_package_name(package_name) {
            log::error!("[replace package name] failed: {}", err);
        }
        self
    }

    /// Writes the string resource behind a `@string/` label, or the label itself otherwise.
    pub fn try_replace_display_name(&mut self, display_name: &str) -> Result<()> {
        let mut manifest = self.manifest()?;
        let reference = manifest
            .application_label()
            .and_then(|label| label.strip_prefix(STRING_REFERENCE))
            .map(str::to_string);
        match reference {
            Some(name) => {
                let path = self.layout.strings();
                let mut strings = StringsBuilder::load(&path)?;
                if strings.value(&name).is_none() {
                    log::warn!("label references missing string `{}`", name);
                }
                strings.replace(&name, display_name).save(&path)
            }
            None => manifest
                .replace_display_name(display_name)
                .save(&self.layout.manifest()),
        }
    }

    pub fn replace_display_name(&mut self, display_name: &str) -> &mut Self {
        if let Err(err) = self.try_replace_display_name(display_name) {
            log::error!("[replace display name] failed: {}", err);
        }
        self
    }

    pub fn try_replace_version_code(&mut self, version_code: &str) -> Result<()> {
        self.yaml()?
            .set_version_code(version_code)
            .save(&self.layout.apktool_yml())
    }

    pub fn replace_version_code(&mut self, version_code: &str) -> &mut Self {
        if let Err(err) = self.try_replace_version_code(version_code) {
            log::error!("[replace version code] failed: {}", err);
        }
        self
    }

    pub fn try_replace_version_name(&mut self, version_name: &str) -> Result<()> {
        self.yaml()?
            .set_version_name(version_name)
            .save(&self.layout.apktool_yml())
    }

    pub fn replace_version_name(&mut self, version_name: &str) -> &mut Self {
        if let Err(err) = self.try_replace_version_name(version_name) {
            log::error!("[replace version name] failed: {}", err);
        }
        self
    }

    /// Fans `source` out into the existing launcher icons named by `android:icon`.
    pub fn replace_icon(&mut self, source: &str) -> Result<&mut Self> {
        let name = self.manifest()?.icon_name();
        self.replace_icon_of(source, IconType::Rectangle(name))
    }

    pub fn replace_round_icon(&mut self, source: &str) -> Result<&mut Self> {
        let name = self.manifest()?.icon_round_name();
        self.replace_icon_of(source, IconType::Round(name))
    }

    fn replace_icon_of(&mut self, source: &str, icon_type: IconType) -> Result<&mut Self> {
        let icons = IconBuilder::new(source, icon_type)?;
        let written = icons.build(&self.layout.res())?;
        if written.is_empty() {
            log::warn!("no existing `{}` icons to replace", icons.file_name());
        }
        Ok(self)
    }

    /// Loads the three documents, runs `component` over them and saves them all back.
    pub fn apply(&mut self, component: &dyn Component) -> Result<&mut Self> {
        let mut ctx = Context::load(self.layout.clone())?;
        component.apply(&mut ctx).map_err(Error::Component)?;
        ctx.save()?;
        Ok(self)
    }

    /// Repackages the workspace with `<decompiler> b <workspace>/apk -o <to>`.
    pub fn build(&self, to: &Path) -> Result<()> {
        log::info!("building {}", to.display());
        self.runner.run(
            &self.tools.decompiler,
            &args([
                "b",
                self.layout.root().display().to_string().as_str(),
                "-o",
                to.display().to_string().as_str(),
            ]),
            &HashMap::new(),
            self.timeout,
        )?;
        Ok(())
    }
}
