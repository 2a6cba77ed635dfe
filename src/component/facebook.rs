use super::{Component, Context};
use serde::Deserialize;

pub const APP_ID_STRING: &str = "facebook_app_id";
pub const CLIENT_TOKEN_STRING: &str = "facebook_client_token";
pub const APP_NAME_STRING: &str = "facebook_app_name";
pub const APP_ID_META_DATA: &str = "com.facebook.sdk.ApplicationId";
pub const CLIENT_TOKEN_META_DATA: &str = "com.facebook.sdk.ClientToken";

/// Facebook SDK credentials.
///
/// Templates reference them either through string resources or as literal meta-data
/// values, so both places are written.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct FacebookComponent {
    pub app_id: Option<String>,
    pub client_token: Option<String>,
    pub display_name: Option<String>,
}

impl FacebookComponent {
    pub fn new(
        app_id: Option<String>,
        client_token: Option<String>,
        display_name: Option<String>,
    ) -> Self {
        Self {
            app_id,
            client_token,
            display_name,
        }
    }
}

impl Component for FacebookComponent {
    fn apply(&self, ctx: &mut Context) -> anyhow::Result<()> {
        if let Some(app_id) = &self.app_id {
            ctx.strings.replace(APP_ID_STRING, app_id);
            ctx.manifest
                .replace_application_meta_data(APP_ID_META_DATA, app_id);
        }
        if let Some(client_token) = &self.client_token {
            ctx.strings.replace(CLIENT_TOKEN_STRING, client_token);
            ctx.manifest
                .replace_application_meta_data(CLIENT_TOKEN_META_DATA, client_token);
        }
        if let Some(display_name) = &self.display_name {
            ctx.strings.replace(APP_NAME_STRING, display_name);
        }
        Ok(())
    }
}
