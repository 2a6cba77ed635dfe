use crate::core::error::Result;
use crate::store::yaml::{scalar_string, YamlDocument};
use serde_yaml::Value;
use std::path::Path;

const PACKAGE_INFO: &str = "packageInfo";
const RENAME_MANIFEST_PACKAGE: &str = "renameManifestPackage";
const VERSION_INFO: &str = "versionInfo";
const VERSION_CODE: &str = "versionCode";
const VERSION_NAME: &str = "versionName";

/// Accessors over `apktool.yml`.
///
/// Getters accept integer or string scalars alike. Setters always write strings, except for
/// the explicit `null` of `renameManifestPackage`, and never touch sibling fields.
#[derive(Clone, Debug)]
pub struct YamlBuilder {
    doc: YamlDocument,
}

impl YamlBuilder {
    pub fn new(doc: YamlDocument) -> Self {
        Self { doc }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(YamlDocument::load(path)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.doc.save(path)
    }

    pub fn document(&self) -> &YamlDocument {
        &self.doc
    }

    pub fn rename_manifest_package(&self) -> Option<String> {
        self.doc
            .get(&[PACKAGE_INFO, RENAME_MANIFEST_PACKAGE])
            .and_then(scalar_string)
    }

    /// `None` keeps the key with an explicit `null`, which apktool expects.
    pub fn set_rename_manifest_package(&mut self, package_name: Option<&str>) -> &mut Self {
        let value = package_name.map_or(Value::Null, |name| Value::String(name.to_string()));
        self.doc.set(&[PACKAGE_INFO, RENAME_MANIFEST_PACKAGE], value);
        self
    }

    pub fn version_code(&self) -> Option<String> {
        self.doc
            .get(&[VERSION_INFO, VERSION_CODE])
            .and_then(scalar_string)
    }

    pub fn set_version_code(&mut self, version_code: &str) -> &mut Self {
        self.doc.set(
            &[VERSION_INFO, VERSION_CODE],
            Value::String(version_code.to_string()),
        );
        self
    }

    pub fn version_name(&self) -> Option<String> {
        self.doc
            .get(&[VERSION_INFO, VERSION_NAME])
            .and_then(scalar_string)
    }

    pub fn set_version_name(&mut self, version_name: &str) -> &mut Self {
        self.doc.set(
            &[VERSION_INFO, VERSION_NAME],
            Value::String(version_name.to_string()),
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn builder(yaml: &str) -> YamlBuilder {
        YamlBuilder::new(YamlDocument::parse(yaml).unwrap())
    }

    #[test]
    fn should_read_versions_of_either_shape() {
        let unquoted = builder("versionInfo:\n  versionCode: 12\n  versionName: 1.0.0\n");
        let quoted = builder("versionInfo:\n  versionCode: '12'\n  versionName: '1.0'\n");
        assert_eq!(unquoted.version_code().as_deref(), Some("12"));
        assert_eq!(quoted.version_code().as_deref(), Some("12"));
        assert_eq!(unquoted.version_name().as_deref(), Some("1.0.0"));
        assert_eq!(quoted.version_name().as_deref(), Some("1.0"));
    }

    #[test]
    fn should_leave_version_code_shape_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("apktool.yml");
        std::fs::write(
            &path,
            "apkFileName: a.apk\nversionInfo:\n  versionCode: 12\n  versionName: 1.0.0\n",
        )
        .unwrap();
        let mut yaml = YamlBuilder::load(&path).unwrap();
        yaml.set_version_name("2.0.0");
        yaml.save(&path).unwrap();
        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("  versionCode: 12\n"));
        assert!(saved.contains("  versionName: 2.0.0\n"));
    }

    #[test]
    fn should_save_trailing_zero_version_name_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("apktool.yml");
        std::fs::write(&path, "versionInfo:\n  versionCode: 7\n  versionName: 2.10\n").unwrap();
        let yaml = YamlBuilder::load(&path).unwrap();
        assert_eq!(yaml.version_name().as_deref(), Some("2.10"));
        yaml.save(&path).unwrap();
        let saved = YamlBuilder::load(&path).unwrap();
        assert_eq!(saved.version_name().as_deref(), Some("2.10"));
        assert_eq!(saved.version_code().as_deref(), Some("7"));
    }

    #[test]
    fn should_write_version_code_as_string() {
        let mut yaml = builder("versionInfo:\n  versionCode: 12\n");
        yaml.set_version_code("13");
        assert_eq!(
            yaml.document().get(&["versionInfo", "versionCode"]),
            Some(&Value::String("13".into()))
        );
        let printed = yaml.document().to_yaml_string().unwrap();
        assert!(printed.contains("versionCode: '13'"));
    }

    #[test]
    fn should_create_missing_sections() {
        let mut yaml = builder("apkFileName: a.apk\n");
        assert_eq!(yaml.version_code(), None);
        assert_eq!(yaml.rename_manifest_package(), None);
        yaml.set_version_code("7").set_rename_manifest_package(None);
        assert_eq!(yaml.version_code().as_deref(), Some("7"));
        assert_eq!(
            yaml.document().get(&["packageInfo", "renameManifestPackage"]),
            Some(&Value::Null)
        );
        let printed = yaml.document().to_yaml_string().unwrap();
        assert!(printed.contains("renameManifestPackage: null"));
    }

    #[test]
    fn should_round_trip_rename_manifest_package() {
        let mut yaml = builder("packageInfo:\n  forcedPackageId: '127'\n  renameManifestPackage: null\n");
        assert_eq!(yaml.rename_manifest_package(), None);
        yaml.set_rename_manifest_package(Some("com.tenant.x"));
        assert_eq!(yaml.rename_manifest_package().as_deref(), Some("com.tenant.x"));
        yaml.set_rename_manifest_package(None);
        assert_eq!(yaml.rename_manifest_package(), None);
        assert!(yaml
            .document()
            .to_yaml_string()
            .unwrap()
            .contains("forcedPackageId: '127'"));
    }
}
