//! Stand-ins for apktool and the build-tools, for tests that drive a whole pipeline.

use crate::component::tests::decoded_app;
use crate::core::error::{Error, Result};
use crate::core::process::RecordedCommand;
use std::fs;
use std::path::Path;

/// Side effect for [`crate::core::process::RecordingRunner`] that produces the files each
/// tool would have written.
///
/// `apktool b` copies the manifest to the output so tests can inspect what was packaged, and
/// `apksigner sign` appends `SIGNED` to its input.
pub(crate) fn fake_android_tools(command: &RecordedCommand) -> Result<String> {
    let io = |err: std::io::Error| Error::io(format!("fake {}", command.binary), err);
    let first = command.args.first().map(String::as_str);
    match (command.binary.as_str(), first) {
        ("apktool", Some("d")) => {
            decoded_app(Path::new(command.arg_after("-o").unwrap_or_default()));
        }
        ("apktool", Some("b")) => {
            let out = Path::new(command.arg_after("-o").unwrap_or_default());
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent).map_err(io)?;
            }
            let manifest = Path::new(&command.args[1]).join("AndroidManifest.xml");
            fs::copy(manifest, out).map_err(io)?;
        }
        ("zipalign", Some("-v")) => {
            fs::copy(&command.args[3], &command.args[4]).map_err(io)?;
            return Ok("Verification successful".to_string());
        }
        ("apksigner", Some("sign")) => {
            let input = command.args.last().cloned().unwrap_or_default();
            let mut bytes = fs::read(input).map_err(io)?;
            bytes.extend_from_slice(b"SIGNED");
            fs::write(command.arg_after("--out").unwrap_or_default(), bytes).map_err(io)?;
        }
        ("keytool", _) => {
            fs::write(command.arg_after("-keystore").unwrap_or_default(), "keystore")
                .map_err(io)?;
        }
        _ => {}
    }
    Ok(String::new())
}
