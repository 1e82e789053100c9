use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_builder::Builder;
use mockall::automock;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tracing::debug;
use which::which_in;

#[derive(Clone, Default, Builder, Debug)]
#[builder(setter(into))]
pub struct OutputCapture {
    #[builder(default)]
    pub working_dir: PathBuf,
    #[builder(default)]
    pub stdout: String,
    #[builder(default)]
    pub stderr: String,
    #[builder(default)]
    pub exit_code: Option<i32>,
    #[builder(default)]
    pub start_time: DateTime<Utc>,
    #[builder(default)]
    pub end_time: DateTime<Utc>,
    #[builder(default)]
    pub command: String,
}

impl OutputCapture {
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Unable to run command. {error:?}")]
    IoError {
        #[from]
        error: std::io::Error,
    },
    #[error("Binary {name} was not found or it was not executable.")]
    MissingBinary { name: String },
    #[error("Unable to parse UTF-8 output. {error:?}")]
    FromUtf8Error {
        #[from]
        error: std::string::FromUtf8Error,
    },
}

pub struct CaptureOpts<'a> {
    pub working_dir: &'a Path,
    pub env_vars: BTreeMap<String, String>,
    pub path: &'a str,
    pub args: &'a [String],
}

impl CaptureOpts<'_> {
    fn command(&self) -> String {
        self.args.join(" ")
    }
}

#[automock]
#[async_trait]
pub trait ExecutionProvider: Send + Sync {
    async fn run_command<'a>(&self, opts: CaptureOpts<'a>) -> Result<OutputCapture, CaptureError>;
}

#[derive(Default, Debug)]
pub struct DefaultExecutionProvider {}

#[async_trait]
impl ExecutionProvider for DefaultExecutionProvider {
    async fn run_command<'a>(&self, opts: CaptureOpts<'a>) -> Result<OutputCapture, CaptureError> {
        OutputCapture::capture_output(opts).await
    }
}

impl OutputCapture {
    pub async fn capture_output(opts: CaptureOpts<'_>) -> Result<Self, CaptureError> {
        let binary = check_pre_exec(&opts)?;
        let args = opts.args[1..].to_vec();

        debug!("Executing {} {:?}", binary.display(), args);

        let start_time = Utc::now();
        let output = tokio::process::Command::new(binary)
            .args(args)
            .env("PATH", opts.path)
            .envs(&opts.env_vars)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .current_dir(opts.working_dir)
            .output()
            .await?;
        let end_time = Utc::now();

        Ok(Self {
            working_dir: opts.working_dir.to_path_buf(),
            stdout: String::from_utf8(output.stdout)?,
            stderr: String::from_utf8(output.stderr)?,
            exit_code: output.status.code(),
            start_time,
            end_time,
            command: opts.command(),
        })
    }
}

fn check_pre_exec(opts: &CaptureOpts) -> Result<PathBuf, CaptureError> {
    let binary = match opts.args.first() {
        None => {
            return Err(CaptureError::MissingBinary {
                name: opts.command(),
            });
        }
        Some(name) => name,
    };

    match which_in(binary, Some(OsString::from(opts.path)), opts.working_dir) {
        Ok(path) => Ok(path),
        Err(e) => {
            debug!("Unable to find binary {} because {:?}", binary, e);
            Err(CaptureError::MissingBinary {
                name: binary.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts<'a>(args: &'a [String], path: &'a str) -> CaptureOpts<'a> {
        CaptureOpts {
            working_dir: Path::new("/tmp"),
            env_vars: BTreeMap::new(),
            path,
            args,
        }
    }

    #[tokio::test]
    async fn capture_records_stdout_and_exit_code() {
        let args = vec!["echo".to_string(), "hello".to_string()];
        let capture = OutputCapture::capture_output(opts(&args, "/bin:/usr/bin"))
            .await
            .unwrap();

        assert_eq!(Some(0), capture.exit_code);
        assert!(capture.is_success());
        assert_eq!("hello\n", capture.stdout);
        assert_eq!("echo hello", capture.command);
    }

    #[tokio::test]
    async fn missing_binary_is_reported_before_spawning() {
        let args = vec!["definitely-not-a-binary".to_string()];
        let result = OutputCapture::capture_output(opts(&args, "/bin:/usr/bin")).await;

        match result {
            Err(CaptureError::MissingBinary { name }) => {
                assert_eq!("definitely-not-a-binary", name)
            }
            other => panic!("expected MissingBinary, got {:?}", other),
        }
    }
}
