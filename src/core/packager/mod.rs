pub mod build;
pub mod env;
pub mod sign;

pub use build::ApkParser;
pub use env::{BuildToolsLocator, SdkBuildToolsLocator};
pub use sign::{ApkSigner, KeyProvider, KeytoolKeyProvider, SigningKey};

use serde::Deserialize;

/// Binary names of the external Android tools, looked up on PATH.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct ToolNames {
    pub decompiler: String,
    pub aligner: String,
    pub signer: String,
    pub keytool: String,
}

impl Default for ToolNames {
    fn default() -> Self {
        Self {
            decompiler: "apktool".to_string(),
            aligner: "zipalign".to_string(),
            signer: "apksigner".to_string(),
            keytool: "keytool".to_string(),
        }
    }
}

pub(crate) fn args<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.into_iter().map(Into::into).collect()
}
