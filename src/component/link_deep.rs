use super::{Component, Context};
use serde::Deserialize;

pub const APP_KEY_META_DATA: &str = "LINK_DEEP_APP_KEY";
pub const APP_KEY_PLACEHOLDER: &str = "${LINK_DEEP_APP_KEY}";
pub const GROUP_SCHEME_PLACEHOLDER: &str = "${LINK_DEEP_GROUP_SCHEME}";

/// Fills the LinkDeep placeholders left in the template manifest.
///
/// Schemes are matched against the literal placeholders, so a second application finds
/// nothing to replace and only logs a warning.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct LinkDeepComponent {
    pub app_key: Option<String>,
    pub group_scheme: Option<String>,
}

impl LinkDeepComponent {
    pub fn new(app_key: Option<String>, group_scheme: Option<String>) -> Self {
        Self {
            app_key,
            group_scheme,
        }
    }
}

impl Component for LinkDeepComponent {
    fn apply(&self, ctx: &mut Context) -> anyhow::Result<()> {
        if let Some(app_key) = &self.app_key {
            ctx.manifest
                .replace_application_meta_data(APP_KEY_META_DATA, app_key)
                .replace_scheme(APP_KEY_PLACEHOLDER, app_key);
        }
        if let Some(group_scheme) = &self.group_scheme {
            ctx.manifest
                .replace_scheme(GROUP_SCHEME_PLACEHOLDER, group_scheme);
        }
        Ok(())
    }
}
