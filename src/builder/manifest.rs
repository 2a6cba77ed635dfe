use crate::core::error::Result;
use crate::store::{Element, XmlDocument};
use std::path::Path;

pub const ANDROID_LABEL: &str = "android:label";
pub const ANDROID_ICON: &str = "android:icon";
pub const ANDROID_ROUND_ICON: &str = "android:roundIcon";
pub const ANDROID_NAME: &str = "android:name";
pub const ANDROID_VALUE: &str = "android:value";
pub const ANDROID_SCHEME: &str = "android:scheme";

const SCHEME_PATH: &str = "//activity/intent-filter/data";

/// Semantic operations on a decoded `AndroidManifest.xml`.
///
/// Only the first `<application>` element is ever addressed.
#[derive(Clone, Debug)]
pub struct ManifestBuilder {
    doc: XmlDocument,
}

impl ManifestBuilder {
    pub fn new(doc: XmlDocument) -> Self {
        Self { doc }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(XmlDocument::load(path)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.doc.save(path)
    }

    pub fn document(&self) -> &XmlDocument {
        &self.doc
    }

    pub fn into_document(self) -> XmlDocument {
        self.doc
    }

    pub fn applications(&self) -> impl Iterator<Item = &Element> {
        self.doc.root().elements("application")
    }

    fn application(&self) -> Option<&Element> {
        self.doc.root().first_element("application")
    }

    fn application_mut(&mut self) -> Option<&mut Element> {
        self.doc.root_mut().first_element_mut("application")
    }

    pub fn first_application_meta_data(&self) -> impl Iterator<Item = &Element> {
        self.application()
            .into_iter()
            .flat_map(|app| app.elements("meta-data"))
    }

    pub fn package_name(&self) -> Option<&str> {
        self.doc.root().attribute("package")
    }

    /// Sets `package` and rewrites every attribute that embeds the old package name,
    /// which covers fully qualified component names and provider authorities.
    pub fn replace_package_name(&mut self, package_name: &str) -> &mut Self {
        let Some(current) = self.package_name().map(str::to_string) else {
            log::warn!("manifest has no `package` attribute, nothing to rename");
            return self;
        };
        if current.is_empty() || current == package_name {
            return self;
        }
        let mut rewritten = 0;
        self.doc.root_mut().walk_mut(&mut |el| {
            for value in el.attribute_values_mut() {
                if value.contains(&current) {
                    *value = value.replace(&current, package_name);
                    rewritten += 1;
                }
            }
        });
        log::debug!(
            "renamed package {} -> {} in {} attributes",
            current,
            package_name,
            rewritten
        );
        self
    }

    pub fn application_label(&self) -> Option<&str> {
        self.application()?.attribute(ANDROID_LABEL)
    }

    /// `None` removes `android:label`; a value adds or updates it.
    pub fn set_application_label(&mut self, label: Option<&str>) -> &mut Self {
        match self.application_mut() {
            Some(app) => match label {
                Some(label) => app.set_attribute(ANDROID_LABEL, label),
                None => {
                    app.remove_attribute(ANDROID_LABEL);
                }
            },
            None => log::warn!("manifest has no <application>, label left unchanged"),
        }
        self
    }

    /// Writes the label verbatim, without resolving `@string/` references.
    pub fn replace_display_name(&mut self, display_name: &str) -> &mut Self {
        self.set_application_label(Some(display_name))
    }

    pub fn application_meta_data(&self, name: &str) -> Option<&str> {
        self.first_application_meta_data()
            .find(|meta| meta.attribute(ANDROID_NAME) == Some(name))?
            .attribute(ANDROID_VALUE)
    }

    /// Writes `android:value` of the first application-level `<meta-data>` named `name`.
    pub fn replace_application_meta_data(&mut self, name: &str, value: &str) -> &mut Self {
        let meta = self.application_mut().and_then(|app| {
            app.elements_mut("meta-data")
                .find(|meta| meta.attribute(ANDROID_NAME) == Some(name))
        });
        match meta {
            Some(meta) => meta.set_attribute(ANDROID_VALUE, value),
            None => log::debug!("no <meta-data> named {}, skipped", name),
        }
        self
    }

    /// Rewrites every intent-filter `<data android:scheme>` exactly equal to `old_scheme`.
    pub fn replace_scheme(&mut self, old_scheme: &str, new_scheme: &str) -> &mut Self {
        let mut replaced = 0;
        let result = self.doc.update_nodes(SCHEME_PATH, |data| {
            if data.attribute(ANDROID_SCHEME) == Some(old_scheme) {
                data.set_attribute(ANDROID_SCHEME, new_scheme);
                replaced += 1;
            }
        });
        if let Err(err) = result {
            log::error!("{}", err);
        } else if replaced == 0 {
            log::warn!("no intent-filter scheme `{}` to replace", old_scheme);
        }
        self
    }

    pub fn schemes(&self) -> Vec<&str> {
        self.doc
            .nodes(SCHEME_PATH)
            .map(|nodes| {
                nodes
                    .into_iter()
                    .filter_map(|data| data.attribute(ANDROID_SCHEME))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `ic_launcher.png` for `android:icon="@mipmap/ic_launcher"`.
    pub fn icon_name(&self) -> Option<String> {
        self.icon_file(ANDROID_ICON)
    }

    pub fn icon_round_name(&self) -> Option<String> {
        self.icon_file(ANDROID_ROUND_ICON)
    }

    fn icon_file(&self, attribute: &str) -> Option<String> {
        let reference = self.application()?.attribute(attribute)?;
        let name = reference.rsplit('/').next()?;
        Some(format!("{}.png", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(xml: &str) -> ManifestBuilder {
        ManifestBuilder::new(XmlDocument::parse(xml).unwrap())
    }

    #[test]
    fn should_rename_package_transitively() {
        let mut manifest = builder(
            r#"<manifest package="com.old.app" xmlns:android="http://schemas.android.com/apk/res/android">
                <application android:name="com.old.app.Application" android:label="Old">
                    <activity android:name="com.old.app.MainActivity"/>
                    <activity android:name="com.vendor.sdk.Activity"/>
                    <provider android:authorities="com.old.app.provider"/>
                </application>
            </manifest>"#,
        );
        manifest.replace_package_name("com.new.app");

        assert_eq!(manifest.package_name(), Some("com.new.app"));
        let app = manifest.applications().next().unwrap();
        assert_eq!(app.attribute(ANDROID_NAME), Some("com.new.app.Application"));
        assert_eq!(app.attribute(ANDROID_LABEL), Some("Old"));
        let activities: Vec<_> = app
            .elements("activity")
            .filter_map(|a| a.attribute(ANDROID_NAME))
            .collect();
        assert_eq!(activities, ["com.new.app.MainActivity", "com.vendor.sdk.Activity"]);
        let provider = app.first_element("provider").unwrap();
        assert_eq!(provider.attribute("android:authorities"), Some("com.new.app.provider"));
    }

    #[test]
    fn should_rename_prefix_matches() {
        let mut manifest = builder(
            r#"<manifest package="com.old"><application android:name="com.old.ui.MyActivity"/></manifest>"#,
        );
        manifest.replace_package_name("com.new");
        let app = manifest.applications().next().unwrap();
        assert_eq!(app.attribute(ANDROID_NAME), Some("com.new.ui.MyActivity"));
    }

    #[test]
    fn should_be_idempotent() {
        let xml = r#"<manifest package="com.old"><application android:name="com.old.App"/></manifest>"#;
        let mut once = builder(xml);
        once.replace_package_name("com.new");
        let mut twice = builder(xml);
        twice.replace_package_name("com.new").replace_package_name("com.new");
        assert_eq!(once.document(), twice.document());
    }

    #[test]
    fn should_skip_rename_without_package() {
        let mut manifest = builder(r#"<manifest><application android:name="com.old.App"/></manifest>"#);
        manifest.replace_package_name("com.new");
        assert_eq!(manifest.package_name(), None);
    }

    #[test]
    fn should_read_and_write_label() {
        let mut manifest = builder(r#"<manifest><application android:label="Old"/></manifest>"#);
        assert_eq!(manifest.application_label(), Some("Old"));
        manifest.set_application_label(Some("New"));
        assert_eq!(manifest.application_label(), Some("New"));
        manifest.set_application_label(None);
        assert_eq!(manifest.application_label(), None);
        manifest.replace_display_name("Added");
        assert_eq!(manifest.application_label(), Some("Added"));
    }

    #[test]
    fn should_replace_only_named_meta_data() {
        let mut manifest = builder(
            r#"<manifest package="com.example">
                <application>
                    <meta-data android:name="com.google.android.gms.version" android:value="@integer/google_play_services_version"/>
                    <meta-data android:name="API_KEY" android:value="OLD_KEY"/>
                </application>
            </manifest>"#,
        );
        manifest
            .replace_application_meta_data("API_KEY", "NEW_KEY")
            .replace_application_meta_data("MISSING", "ignored");
        assert_eq!(manifest.application_meta_data("API_KEY"), Some("NEW_KEY"));
        assert_eq!(
            manifest.application_meta_data("com.google.android.gms.version"),
            Some("@integer/google_play_services_version")
        );
        assert_eq!(manifest.application_meta_data("MISSING"), None);
    }

    #[test]
    fn should_replace_exact_schemes_only() {
        let mut manifest = builder(
            r#"<manifest><application>
                <activity android:name="A">
                    <intent-filter>
                        <data android:scheme="${LINK_DEEP_APP_KEY}"/>
                        <data android:scheme="${LINK_DEEP_APP_KEY}x"/>
                    </intent-filter>
                </activity>
                <activity android:name="B">
                    <intent-filter><data android:scheme="${LINK_DEEP_APP_KEY}"/></intent-filter>
                </activity>
            </application></manifest>"#,
        );
        manifest.replace_scheme("${LINK_DEEP_APP_KEY}", "key123");
        assert_eq!(manifest.schemes(), ["key123", "${LINK_DEEP_APP_KEY}x", "key123"]);

        let before = manifest.document().clone();
        manifest.replace_scheme("${LINK_DEEP_APP_KEY}", "again");
        assert_eq!(manifest.document(), &before);
    }

    #[test]
    fn should_derive_icon_file_names() {
        let manifest = builder(
            r#"<manifest><application android:icon="@mipmap/ic_launcher" android:roundIcon="@mipmap/ic_launcher_round"/></manifest>"#,
        );
        assert_eq!(manifest.icon_name().as_deref(), Some("ic_launcher.png"));
        assert_eq!(manifest.icon_round_name().as_deref(), Some("ic_launcher_round.png"));

        let bare = builder("<manifest><application/></manifest>");
        assert_eq!(bare.icon_name(), None);
        assert_eq!(bare.icon_round_name(), None);
    }
}
