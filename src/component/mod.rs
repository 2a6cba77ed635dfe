//! Composite edits that touch several resource files at once.

pub mod facebook;
pub mod google;
pub mod link_deep;

pub use facebook::FacebookComponent;
pub use google::GoogleComponent;
pub use link_deep::LinkDeepComponent;

use crate::builder::{AppLayout, ManifestBuilder, StringsBuilder, YamlBuilder};
use crate::core::error::Result;
use std::path::{Path, PathBuf};

/// A reusable bundle of edits, applied through [`crate::ApkParser::apply`].
pub trait Component {
    fn apply(&self, ctx: &mut Context) -> anyhow::Result<()>;
}

impl<F> Component for F
where
    F: Fn(&mut Context) -> anyhow::Result<()>,
{
    fn apply(&self, ctx: &mut Context) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// Freshly loaded builders for one decoded app.
#[derive(Debug)]
pub struct Context {
    pub manifest: ManifestBuilder,
    pub strings: StringsBuilder,
    pub yaml: YamlBuilder,
    layout: AppLayout,
}

impl Context {
    pub fn load(layout: AppLayout) -> Result<Self> {
        Ok(Self {
            manifest: ManifestBuilder::load(&layout.manifest())?,
            strings: StringsBuilder::load(&layout.strings())?,
            yaml: YamlBuilder::load(&layout.apktool_yml())?,
            layout,
        })
    }

    /// Writes all three documents back, touched or not.
    pub fn save(&self) -> Result<()> {
        self.manifest.save(&self.layout.manifest())?;
        self.strings.save(&self.layout.strings())?;
        self.yaml.save(&self.layout.apktool_yml())
    }

    pub fn app_directory(&self) -> &Path {
        self.layout.root()
    }

    pub fn res_directory(&self) -> PathBuf {
        self.layout.res()
    }

    pub fn assets_directory(&self) -> PathBuf {
        self.layout.assets()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;

    pub(crate) const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8" standalone="no"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.example.template">
    <application android:icon="@mipmap/ic_launcher" android:label="@string/app_name" android:name="com.example.template.App">
        <meta-data android:name="com.google.android.geo.API_KEY" android:value="OLD_API_KEY"/>
        <meta-data android:name="com.facebook.sdk.ApplicationId" android:value="OLD_FB_ID"/>
        <meta-data android:name="com.facebook.sdk.ClientToken" android:value="OLD_TOKEN"/>
        <meta-data android:name="LINK_DEEP_APP_KEY" android:value="${LINK_DEEP_APP_KEY}"/>
        <activity android:name="com.example.template.MainActivity">
            <intent-filter>
                <action android:name="android.intent.action.VIEW"/>
                <data android:scheme="${LINK_DEEP_APP_KEY}"/>
                <data android:scheme="${LINK_DEEP_GROUP_SCHEME}"/>
            </intent-filter>
        </activity>
    </application>
</manifest>
"#;

    pub(crate) const STRINGS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<resources>
    <string name="app_name">Template</string>
    <string name="google_app_id">OLD_APP_ID</string>
    <string name="default_web_client_id">OLD_WEB_ID</string>
    <string name="facebook_app_id">OLD_FB_ID</string>
    <string name="facebook_client_token">OLD_TOKEN</string>
    <string name="facebook_app_name">Old FB App</string>
</resources>
"#;

    pub(crate) const APKTOOL_YML: &str = "!!brut.androlib.meta.MetaInfo
apkFileName: template.apk
packageInfo:
  forcedPackageId: '127'
  renameManifestPackage: null
version: 2.9.3
versionInfo:
  versionCode: '12'
  versionName: 1.0.0
";

    /// Lays out a decoded app under `root` and returns it.
    pub(crate) fn decoded_app(root: &Path) -> AppLayout {
        let layout = AppLayout::new(root);
        fs::create_dir_all(layout.res().join("values")).unwrap();
        fs::write(layout.manifest(), MANIFEST).unwrap();
        fs::write(layout.strings(), STRINGS).unwrap();
        fs::write(layout.apktool_yml(), APKTOOL_YML).unwrap();
        layout
    }

    #[test]
    fn should_save_untouched_documents_losslessly() {
        let dir = tempfile::tempdir().unwrap();
        let layout = decoded_app(dir.path());
        let ctx = Context::load(layout.clone()).unwrap();
        ctx.save().unwrap();
        let reloaded = Context::load(layout).unwrap();
        assert_eq!(reloaded.manifest.document(), ctx.manifest.document());
        assert_eq!(reloaded.strings.document(), ctx.strings.document());
        assert_eq!(reloaded.yaml.document(), ctx.yaml.document());
    }

    #[test]
    fn should_apply_closures() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = Context::load(decoded_app(dir.path())).unwrap();
        let rename = |ctx: &mut Context| -> anyhow::Result<()> {
            ctx.strings.replace_display_name("Closure");
            Ok(())
        };
        rename.apply(&mut ctx).unwrap();
        assert_eq!(ctx.strings.value("app_name").as_deref(), Some("Closure"));
        assert_eq!(ctx.res_directory(), dir.path().join("res"));
        assert_eq!(ctx.assets_directory(), dir.path().join("assets"));
    }
}
