use super::env::{BuildToolsLocator, SdkBuildToolsLocator};
use super::{args, ToolNames};
use crate::core::error::{Error, IoContext, Result};
use crate::core::process::{CommandRunner, DEFAULT_TIMEOUT};
use crate::core::workspace::{unique_id, Workspace};
use rand::Rng;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const PASSWORD_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()_+-=[]{}|;:,.<>?";
const PASSWORD_LEN: usize = 12;

/// A keystore entry usable by `apksigner`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SigningKey {
    pub path: PathBuf,
    pub alias: String,
    pub key_password: String,
    pub store_password: String,
}

/// Source of throwaway signing keys, used when the caller brings none.
pub trait KeyProvider {
    /// Creates a key inside `dir`, which is deleted after signing.
    fn generate(&self, runner: &dyn CommandRunner, dir: &Path) -> Result<SigningKey>;
}

pub fn random_password() -> String {
    let mut rng = rand::rng();
    (0..PASSWORD_LEN)
        .map(|_| PASSWORD_CHARS[rng.random_range(0..PASSWORD_CHARS.len())] as char)
        .collect()
}

/// Generates an RSA key pair with `keytool -genkeypair`.
#[derive(Clone, Debug)]
pub struct KeytoolKeyProvider {
    pub keytool: String,
    pub dname: String,
    pub validity_days: u32,
    pub timeout: Duration,
}

impl Default for KeytoolKeyProvider {
    fn default() -> Self {
        Self {
            keytool: ToolNames::default().keytool,
            dname: "CN=Android, O=Android, C=US".to_string(),
            validity_days: 10_000,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl KeyProvider for KeytoolKeyProvider {
    fn generate(&self, runner: &dyn CommandRunner, dir: &Path) -> Result<SigningKey> {
        let alias = unique_id();
        let password = random_password();
        let path = dir.join(format!("{}.keystore", alias));
        let keystore = path.display().to_string();
        let validity = self.validity_days.to_string();
        let args = args([
            "-genkeypair",
            "-keystore",
            keystore.as_str(),
            "-storetype",
            "PKCS12",
            "-alias",
            alias.as_str(),
            "-keyalg",
            "RSA",
            "-keysize",
            "2048",
            "-validity",
            validity.as_str(),
            "-storepass",
            password.as_str(),
            "-keypass",
            password.as_str(),
            "-dname",
            self.dname.as_str(),
        ]);
        runner
            .run(&self.keytool, &args, &HashMap::new(), self.timeout)
            .map_err(|err| Error::KeyGenerationFailed(err.to_string()))?;
        if !path.is_file() {
            return Err(Error::KeyGenerationFailed(format!(
                "`{}` did not produce `{}`",
                self.keytool, keystore
            )));
        }
        Ok(SigningKey {
            path,
            alias,
            key_password: password.clone(),
            store_password: password,
        })
    }
}

/// Aligns, signs and verifies APKs with the build-tools `zipalign` and `apksigner`.
pub struct ApkSigner<R: CommandRunner> {
    runner: R,
    tools: ToolNames,
    timeout: Duration,
    locator: Box<dyn BuildToolsLocator>,
    key_provider: Box<dyn KeyProvider>,
}

impl<R: CommandRunner> ApkSigner<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            tools: ToolNames::default(),
            timeout: DEFAULT_TIMEOUT,
            locator: Box::new(SdkBuildToolsLocator::platform_default()),
            key_provider: Box::new(KeytoolKeyProvider::default()),
        }
    }

    pub fn with_tools(mut self, tools: ToolNames) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_locator(mut self, locator: impl BuildToolsLocator + 'static) -> Self {
        self.locator = Box::new(locator);
        self
    }

    pub fn with_key_provider(mut self, provider: impl KeyProvider + 'static) -> Self {
        self.key_provider = Box::new(provider);
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn run(&self, binary: &str, args: &[String]) -> Result<String> {
        self.runner
            .run(binary, args, &self.locator.env(), self.timeout)
    }

    /// Aligns `from`, signs it with `key` (or a freshly generated one) and moves the result
    /// to `to`, replacing any file there.
    pub fn sign(&self, from: &Path, to: &Path, key: Option<&SigningKey>) -> Result<()> {
        let workspace = Workspace::create("APKSigner")?;

        let aligned = workspace.join("aligned.apk");
        log::info!("aligning {}", from.display());
        self.run(
            &self.tools.aligner,
            &args([
                "-v",
                "-p",
                "4",
                from.display().to_string().as_str(),
                aligned.display().to_string().as_str(),
            ]),
        )?;

        let generated;
        let key = match key {
            Some(key) => key,
            None => {
                log::info!("no signing key given, generating a throwaway key");
                generated = self
                    .key_provider
                    .generate(&self.runner, workspace.path())?;
                &generated
            }
        };

        let signed = workspace.join("signed.apk");
        log::info!("signing with `{}`", key.alias);
        let store_pass = format!("pass:{}", key.store_password);
        let key_pass = format!("pass:{}", key.key_password);
        self.run(
            &self.tools.signer,
            &args([
                "sign",
                "--ks",
                key.path.display().to_string().as_str(),
                "--ks-key-alias",
                key.alias.as_str(),
                "--ks-pass",
                store_pass.as_str(),
                "--key-pass",
                key_pass.as_str(),
                "--out",
                signed.display().to_string().as_str(),
                aligned.display().to_string().as_str(),
            ]),
        )?;

        deliver(&signed, to)?;
        log::info!("signed APK written to {}", to.display());
        Ok(())
    }

    pub fn verify_alignment(&self, apk: &Path) -> Result<()> {
        self.run(
            &self.tools.aligner,
            &args(["-c", "-v", "4", apk.display().to_string().as_str()]),
        )
        .map(|_| ())
    }

    pub fn verify_signature(&self, apk: &Path) -> Result<()> {
        self.run(
            &self.tools.signer,
            &args([
                "verify",
                "--verbose",
                "--print-certs",
                apk.display().to_string().as_str(),
            ]),
        )
        .map(|_| ())
    }
}

/// Moves `from` over `to`, copying through a temp file next to `to` when a plain rename
/// can't cross filesystems.
fn deliver(from: &Path, to: &Path) -> Result<()> {
    let parent = to.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent)
            .io_context(|| format!("Creating `{}`", parent.display()))?;
    }
    if to.exists() {
        fs::remove_file(to).io_context(|| format!("Removing `{}`", to.display()))?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    let dir = parent.unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .io_context(|| format!("Creating temp file in `{}`", dir.display()))?;
    let mut src = fs::File::open(from).io_context(|| format!("Opening `{}`", from.display()))?;
    std::io::copy(&mut src, tmp.as_file_mut())
        .io_context(|| format!("Copying `{}`", from.display()))?;
    tmp.persist(to)
        .map_err(|err| Error::io(format!("Moving APK to `{}`", to.display()), err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::process::RecordingRunner;
    use crate::core::testing::fake_android_tools;
    use tempfile::tempdir;

    fn signer(runner: RecordingRunner, sdk: &Path) -> ApkSigner<RecordingRunner> {
        ApkSigner::new(runner).with_locator(SdkBuildToolsLocator::new(sdk))
    }

    #[test]
    fn should_sign_then_verify() {
        let dir = tempdir().unwrap();
        let unsigned = dir.path().join("unsigned.apk");
        fs::write(&unsigned, "APK").unwrap();
        let to = dir.path().join("out").join("signed.apk");

        let signer = signer(
            RecordingRunner::new().with_side_effect(fake_android_tools),
            dir.path(),
        );
        signer.sign(&unsigned, &to, None).unwrap();
        signer.verify_alignment(&to).unwrap();
        signer.verify_signature(&to).unwrap();

        assert_eq!(fs::read_to_string(&to).unwrap(), "APKSIGNED");
        let commands = signer.runner().commands();
        let binaries: Vec<_> = commands.iter().map(|c| c.binary.as_str()).collect();
        assert_eq!(
            binaries,
            ["zipalign", "keytool", "apksigner", "zipalign", "apksigner"]
        );

        let align = &commands[0];
        assert_eq!(&align.args[..4], ["-v", "-p", "4", unsigned.to_str().unwrap()]);
        assert!(align.args[4].ends_with("aligned.apk"));

        let sign = &commands[2];
        assert_eq!(sign.args[0], "sign");
        let keystore = sign.arg_after("--ks").unwrap();
        assert_eq!(keystore, commands[1].arg_after("-keystore").unwrap());
        let alias = sign.arg_after("--ks-key-alias").unwrap();
        assert_eq!(alias, commands[1].arg_after("-alias").unwrap());
        let store_pass = sign.arg_after("--ks-pass").unwrap();
        assert_eq!(store_pass.len(), "pass:".len() + PASSWORD_LEN);
        assert!(sign.arg_after("--out").unwrap().ends_with("signed.apk"));
        assert!(sign.args.last().unwrap().ends_with("aligned.apk"));

        assert_eq!(commands[3].args, ["-c", "-v", "4", to.to_str().unwrap()]);
        assert_eq!(
            commands[4].args,
            ["verify", "--verbose", "--print-certs", to.to_str().unwrap()]
        );

        // the signer workspace is gone once signing returns
        let workspace = Path::new(keystore).parent().unwrap();
        assert!(!workspace.exists());
    }

    #[test]
    fn should_use_caller_key_and_replace_output() {
        let dir = tempdir().unwrap();
        let unsigned = dir.path().join("unsigned.apk");
        fs::write(&unsigned, "APK").unwrap();
        let to = dir.path().join("signed.apk");
        fs::write(&to, "stale").unwrap();
        let key = SigningKey {
            path: dir.path().join("release.keystore"),
            alias: "release".to_string(),
            key_password: "k".to_string(),
            store_password: "s".to_string(),
        };

        let signer = signer(
            RecordingRunner::new().with_side_effect(fake_android_tools),
            dir.path(),
        );
        signer.sign(&unsigned, &to, Some(&key)).unwrap();

        assert_eq!(fs::read_to_string(&to).unwrap(), "APKSIGNED");
        let commands = signer.runner().commands();
        assert_eq!(commands.len(), 2);
        let sign = &commands[1];
        assert_eq!(sign.arg_after("--ks-key-alias"), Some("release"));
        assert_eq!(sign.arg_after("--ks-pass"), Some("pass:s"));
        assert_eq!(sign.arg_after("--key-pass"), Some("pass:k"));
    }

    #[test]
    fn should_pass_build_tools_env() {
        let dir = tempdir().unwrap();
        let sdk = dir.path().join("sdk");
        fs::create_dir_all(sdk.join("build-tools").join("34.0.0")).unwrap();
        let signer = signer(RecordingRunner::new(), &sdk);
        signer.verify_alignment(&dir.path().join("a.apk")).unwrap();
        let env = &signer.runner().commands()[0].env;
        assert_eq!(env["ANDROID_HOME"], sdk.display().to_string());
        assert!(env["PATH"].starts_with(&sdk.join("build-tools").join("34.0.0").display().to_string()));
    }

    #[test]
    fn should_propagate_tool_failure() {
        let dir = tempdir().unwrap();
        let runner = RecordingRunner::new().with_side_effect(|command| {
            Err(Error::ExternalToolFailed {
                binary: command.binary.clone(),
                args: command.args.clone(),
                code: Some(1),
                output: "Verification FAILED".to_string(),
            })
        });
        let signer = signer(runner, dir.path());
        let err = signer.verify_alignment(&dir.path().join("a.apk")).unwrap_err();
        assert!(err.is_tool_failure());
        assert!(err.to_string().contains("Verification FAILED"));
    }

    #[test]
    fn should_report_key_generation_failure() {
        let dir = tempdir().unwrap();
        let runner = RecordingRunner::new().with_side_effect(|command| {
            if command.binary == "keytool" {
                return Err(Error::ToolNotFound {
                    binary: "keytool".to_string(),
                });
            }
            fake_android_tools(command)
        });
        let unsigned = dir.path().join("unsigned.apk");
        fs::write(&unsigned, "APK").unwrap();
        let signer = signer(runner, dir.path());
        let err = signer
            .sign(&unsigned, &dir.path().join("signed.apk"), None)
            .unwrap_err();
        assert!(matches!(err, Error::KeyGenerationFailed(_)));
        assert!(!dir.path().join("signed.apk").exists());
    }

    #[test]
    fn should_generate_passwords_from_alphabet() {
        let password = random_password();
        assert_eq!(password.len(), PASSWORD_LEN);
        assert!(password.bytes().all(|b| PASSWORD_CHARS.contains(&b)));
        assert_ne!(random_password(), password);
    }
}
