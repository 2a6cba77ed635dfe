use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Finds the Android SDK build-tools whose `zipalign` and `apksigner` should be used.
pub trait BuildToolsLocator {
    fn sdk_home(&self) -> Option<PathBuf>;

    fn latest_build_tools(&self) -> Option<PathBuf>;

    /// `ANDROID_HOME` plus a PATH with the build-tools directory in front.
    ///
    /// Empty when no build-tools are found, leaving the runner on its default PATH.
    fn env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        let (Some(home), Some(tools)) = (self.sdk_home(), self.latest_build_tools()) else {
            log::debug!("no Android build-tools found, using default PATH");
            return env;
        };
        let inherited = std::env::var("PATH").unwrap_or_default();
        env.insert("ANDROID_HOME".to_string(), home.display().to_string());
        env.insert(
            "PATH".to_string(),
            format!("{}:{}", tools.display(), inherited),
        );
        env
    }
}

/// Looks under `<sdk_home>/build-tools/<major>.<minor>.<patch>`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SdkBuildToolsLocator {
    sdk_home: PathBuf,
}

impl SdkBuildToolsLocator {
    pub fn new(sdk_home: impl Into<PathBuf>) -> Self {
        Self {
            sdk_home: sdk_home.into(),
        }
    }

    /// `~/Library/Android/sdk` on macOS. Elsewhere `$ANDROID_HOME`, then `~/Android/Sdk`.
    pub fn platform_default() -> Self {
        let home = dirs::home_dir().unwrap_or_default();
        if cfg!(target_os = "macos") {
            return Self::new(home.join("Library").join("Android").join("sdk"));
        }
        match std::env::var_os("ANDROID_HOME") {
            Some(sdk) if !sdk.is_empty() => Self::new(sdk),
            _ => Self::new(home.join("Android").join("Sdk")),
        }
    }

    pub fn build_tools_dir(&self) -> PathBuf {
        self.sdk_home.join("build-tools")
    }
}

impl BuildToolsLocator for SdkBuildToolsLocator {
    fn sdk_home(&self) -> Option<PathBuf> {
        Some(self.sdk_home.clone())
    }

    fn latest_build_tools(&self) -> Option<PathBuf> {
        let dir = self.build_tools_dir();
        let latest = latest_version(&dir)?;
        log::debug!("using build-tools {}", latest);
        Some(dir.join(latest))
    }
}

impl<L: BuildToolsLocator + ?Sized> BuildToolsLocator for Box<L> {
    fn sdk_home(&self) -> Option<PathBuf> {
        (**self).sdk_home()
    }

    fn latest_build_tools(&self) -> Option<PathBuf> {
        (**self).latest_build_tools()
    }
}

/// Highest `\d+.\d+.\d+` subdirectory name, compared numerically per component.
fn latest_version(dir: &Path) -> Option<String> {
    let pattern = Regex::new(r"^(\d+)\.(\d+)\.(\d+)$").ok()?;
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter_map(|name| {
            let caps = pattern.captures(&name)?;
            let mut parts = [0u64; 3];
            for (part, i) in parts.iter_mut().zip(1..) {
                *part = caps[i].parse().ok()?;
            }
            Some((parts, name))
        })
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, name)| name)
}
