use super::{Component, Context};
use serde::Deserialize;

pub const API_KEY_META_DATA: &str = "com.google.android.geo.API_KEY";

/// String resources that all carry the Firebase app id.
pub const APP_ID_STRINGS: [&str; 3] = [
    "google_app_id",
    "default_web_client_id",
    "google_server_client_id_web",
];

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GoogleComponent {
    pub api_key: Option<String>,
    pub app_id: Option<String>,
}

impl GoogleComponent {
    pub fn new(api_key: Option<String>, app_id: Option<String>) -> Self {
        Self { api_key, app_id }
    }
}

impl Component for GoogleComponent {
    fn apply(&self, ctx: &mut Context) -> anyhow::Result<()> {
        if let Some(api_key) = &self.api_key {
            ctx.manifest
                .replace_application_meta_data(API_KEY_META_DATA, api_key);
        }
        if let Some(app_id) = &self.app_id {
            for name in APP_ID_STRINGS {
                ctx.strings.replace(name, app_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::tests::decoded_app;

    #[test]
    fn should_write_api_key_and_app_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = Context::load(decoded_app(dir.path())).unwrap();
        GoogleComponent::new(Some("NEW_API_KEY".into()), Some("NEW_APP_ID".into()))
            .apply(&mut ctx)
            .unwrap();

        assert_eq!(
            ctx.manifest.application_meta_data(API_KEY_META_DATA),
            Some("NEW_API_KEY")
        );
        assert_eq!(ctx.strings.value("google_app_id").as_deref(), Some("NEW_APP_ID"));
        assert_eq!(
            ctx.strings.value("default_web_client_id").as_deref(),
            Some("NEW_APP_ID")
        );
        // absent from the template, so still absent
        assert_eq!(ctx.strings.value("google_server_client_id_web"), None);
    }

    #[test]
    fn should_skip_unset_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = Context::load(decoded_app(dir.path())).unwrap();
        let manifest = ctx.manifest.document().clone();
        let strings = ctx.strings.document().clone();
        GoogleComponent::default().apply(&mut ctx).unwrap();
        assert_eq!(ctx.manifest.document(), &manifest);
        assert_eq!(ctx.strings.document(), &strings);
    }
}
