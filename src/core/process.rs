use crate::core::error::{Error, Result};
use std::collections::HashMap;
use std::ffi::OsString;
use std::io::{ErrorKind, Read};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[cfg(target_os = "macos")]
const DEFAULT_PATH_PREFIX: &str = "/opt/homebrew/bin:/usr/local/bin";
#[cfg(target_os = "linux")]
const DEFAULT_PATH_PREFIX: &str = "/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin";
#[cfg(not(any(target_os = "macos", target_os = "linux")))]
const DEFAULT_PATH_PREFIX: &str = "/usr/local/bin:/usr/bin:/bin";

/// Runs an external binary and returns its combined stdout and stderr.
///
/// `env` is overlaid on top of the inherited environment, after the default PATH prefix has
/// been applied, so callers can replace `PATH` entirely or add variables such as `ANDROID_HOME`.
pub trait CommandRunner {
    fn run(
        &self,
        binary: &str,
        args: &[String],
        env: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<String>;
}

/// Production runner backed by `std::process`.
#[derive(Clone, Debug, Default)]
pub struct ShellCommandRunner {
    pub log_output: bool,
}

impl ShellCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_output(mut self, log_output: bool) -> Self {
        self.log_output = log_output;
        self
    }
}

/// Inherited environment with the platform PATH prefix applied and `overlay` on top.
pub fn merged_env(overlay: &HashMap<String, String>) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = std::env::vars().collect();
    let inherited = env.get("PATH").cloned().unwrap_or_default();
    let path = if inherited.is_empty() {
        DEFAULT_PATH_PREFIX.to_string()
    } else {
        format!("{}:{}", DEFAULT_PATH_PREFIX, inherited)
    };
    env.insert("PATH".to_string(), path);
    for (key, value) in overlay {
        env.insert(key.clone(), value.clone());
    }
    env
}

/// A child pipe read to EOF on its own thread into a buffer shared with the caller.
struct Drain {
    name: &'static str,
    buf: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<()>,
}

impl Drain {
    fn spawn<R: Read + Send + 'static>(pipe: Option<R>, name: &'static str) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let (tx, done) = mpsc::channel();
        let shared = Arc::clone(&buf);
        thread::spawn(move || {
            if let Some(mut pipe) = pipe {
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => shared
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .extend_from_slice(&chunk[..n]),
                        Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                        Err(err) => {
                            log::warn!("failed reading child {}: {}", name, err);
                            break;
                        }
                    }
                }
            }
            let _ = tx.send(());
        });
        Self { name, buf, done }
    }

    /// Waits for EOF until `deadline`, then hands back everything read so far.
    ///
    /// A grandchild that inherited the pipe can keep it open long after the child exits.
    fn collect(self, binary: &str, deadline: Instant, log_output: bool) -> Vec<u8> {
        let grace = deadline.saturating_duration_since(Instant::now());
        if self.done.recv_timeout(grace).is_err() {
            log::warn!(
                "`{}` {} still open after exit, keeping the output read so far",
                binary,
                self.name
            );
        }
        let buf = std::mem::take(&mut *self.buf.lock().unwrap_or_else(PoisonError::into_inner));
        if log_output && !buf.is_empty() {
            log::info!("{}: {}", self.name, String::from_utf8_lossy(&buf).trim());
        }
        buf
    }
}

impl CommandRunner for ShellCommandRunner {
    fn run(
        &self,
        binary: &str,
        args: &[String],
        env: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<String> {
        let env = merged_env(env);
        let search_path = env.get("PATH").map(OsString::from);
        let cwd = std::env::current_dir().unwrap_or_default();
        let program = which::which_in(binary, search_path, cwd).map_err(|_| Error::ToolNotFound {
            binary: binary.to_string(),
        })?;

        log::debug!("$ {} {}", binary, args.join(" "));
        let mut child = Command::new(&program)
            .args(args)
            .env_clear()
            .envs(&env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| Error::io(format!("Spawning `{}`", binary), err))?;

        // Both pipes are drained concurrently so a chatty child never blocks on a full buffer.
        let stdout = Drain::spawn(child.stdout.take(), "stdout");
        let stderr = Drain::spawn(child.stderr.take(), "stderr");

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    // Readers are detached; a grandchild may still hold the pipes open.
                    log::warn!("`{}` timed out after {:?}", binary, timeout);
                    return Err(Error::ExternalToolTimeout {
                        binary: binary.to_string(),
                        args: args.to_vec(),
                        timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(err) => {
                    let _ = child.kill();
                    return Err(Error::io(format!("Waiting for `{}`", binary), err));
                }
            }
        };

        let deadline = Instant::now() + DRAIN_GRACE;
        let stdout = stdout.collect(binary, deadline, self.log_output);
        let stderr = stderr.collect(binary, deadline, self.log_output);
        let mut output = String::from_utf8_lossy(&stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&stderr));

        if status.success() {
            Ok(output)
        } else {
            log::warn!("`{}` exited with {}", binary, status);
            Err(Error::ExternalToolFailed {
                binary: binary.to_string(),
                args: args.to_vec(),
                code: status.code(),
                output,
            })
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCommand {
    pub binary: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl RecordedCommand {
    /// Value following `flag` in the argument vector.
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        let index = self.args.iter().position(|arg| arg == flag)?;
        self.args.get(index + 1).map(String::as_str)
    }
}

type SideEffect = Box<dyn Fn(&RecordedCommand) -> Result<String> + Send>;

/// Runner that records every invocation instead of spawning anything.
///
/// A side effect can synthesize what the real tool would have produced (e.g. create the
/// `--out` file) so that code downstream of the call keeps working.
#[derive(Default)]
pub struct RecordingRunner {
    commands: Mutex<Vec<RecordedCommand>>,
    side_effect: Option<SideEffect>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_side_effect<F>(mut self, f: F) -> Self
    where
        F: Fn(&RecordedCommand) -> Result<String> + Send + 'static,
    {
        self.side_effect = Some(Box::new(f));
        self
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.commands
            .lock()
            .map(|commands| commands.clone())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for RecordingRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("RecordingRunner")
            .field("commands", &self.commands)
            .finish_non_exhaustive()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(
        &self,
        binary: &str,
        args: &[String],
        env: &HashMap<String, String>,
        _timeout: Duration,
    ) -> Result<String> {
        let command = RecordedCommand {
            binary: binary.to_string(),
            args: args.to_vec(),
            env: env.clone(),
        };
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command.clone());
        }
        match &self.side_effect {
            Some(effect) => effect(&command),
            None => Ok(String::new()),
        }
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(
        &self,
        binary: &str,
        args: &[String],
        env: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<String> {
        (**self).run(binary, args, env, timeout)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for Box<R> {
    fn run(
        &self,
        binary: &str,
        args: &[String],
        env: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<String> {
        (**self).run(binary, args, env, timeout)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for std::sync::Arc<R> {
    fn run(
        &self,
        binary: &str,
        args: &[String],
        env: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<String> {
        (**self).run(binary, args, env, timeout)
    }
}
