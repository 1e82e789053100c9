use super::exec::{CaptureError, CaptureOpts, ExecutionProvider, OutputCapture};
use async_trait::async_trait;
use educe::Educe;
use mockall::automock;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum DockerError {
    #[error("Docker daemon was not reachable.")]
    Unavailable,
    #[error("`{command}` exited with code {exit_code}. {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },
    #[error("Docker query did not complete within {}s.", timeout.as_secs())]
    TimedOut { timeout: Duration },
    #[error("Unable to parse docker output. {error:?}")]
    MalformedOutput {
        #[from]
        error: serde_json::Error,
    },
    #[error(transparent)]
    CaptureError(#[from] CaptureError),
}

/// One running (or stopped) container, as reported by `docker ps`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContainerSummary {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Names")]
    pub name: String,
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(rename = "Ports", default)]
    pub ports: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageSummary {
    #[serde(rename = "Repository")]
    pub repository: String,
    #[serde(rename = "Tag")]
    pub tag: String,
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Size", default)]
    pub size: String,
}

impl ImageSummary {
    pub fn is_dangling(&self) -> bool {
        self.repository == "<none>" || self.tag == "<none>"
    }
}

/// One row of `docker system df`: images, containers, local volumes, or build cache.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiskUsageEntry {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "TotalCount", default)]
    pub total_count: String,
    #[serde(rename = "Size", default)]
    pub size: String,
    #[serde(rename = "Reclaimable", default)]
    pub reclaimable: String,
}

impl DiskUsageEntry {
    /// Best-effort conversion of docker's human readable size ("1.2GB") to bytes.
    pub fn size_bytes(&self) -> Option<u64> {
        parse_human_size(&self.size)
    }
}

fn parse_human_size(size: &str) -> Option<u64> {
    let size = size.trim();
    let split = size.find(|c: char| c.is_ascii_alphabetic())?;
    let (value, unit) = size.split_at(split);
    let value: f64 = value.trim().parse().ok()?;
    let multiplier: f64 = match unit.trim().to_ascii_uppercase().as_str() {
        "B" => 1.0,
        "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        _ => return None,
    };
    Some((value * multiplier) as u64)
}

/// Boundary to the Docker runtime. Every query can fail when the daemon is
/// unreachable; checks are expected to treat a failure as "no findings".
#[automock]
#[async_trait]
pub trait DockerRuntime: Send + Sync {
    /// Bounded-time daemon reachability probe.
    async fn ping(&self) -> Result<(), DockerError>;
    async fn containers(&self, all: bool) -> Result<Vec<ContainerSummary>, DockerError>;
    async fn images(&self) -> Result<Vec<ImageSummary>, DockerError>;
    async fn disk_usage(&self) -> Result<Vec<DiskUsageEntry>, DockerError>;
    async fn logs(&self, container: &str, tail: usize) -> Result<String, DockerError>;
    /// Escape hatch for checks that need exact tool output.
    async fn raw(&self, args: &[String]) -> Result<OutputCapture, DockerError>;
}

#[derive(Educe)]
#[educe(Debug)]
pub struct DefaultDockerRuntime {
    #[educe(Debug(ignore))]
    exec: Arc<dyn ExecutionProvider>,
    working_dir: PathBuf,
    path: String,
    timeout: Duration,
}

impl DefaultDockerRuntime {
    pub fn new(exec: Arc<dyn ExecutionProvider>, working_dir: PathBuf) -> Self {
        let path = std::env::var("PATH").unwrap_or_default();
        Self {
            exec,
            working_dir,
            path,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run_docker(&self, args: &[&str]) -> Result<OutputCapture, DockerError> {
        let mut full_args = vec!["docker".to_string()];
        full_args.extend(args.iter().map(|x| x.to_string()));

        let capture = tokio::time::timeout(
            self.timeout,
            self.exec.run_command(CaptureOpts {
                working_dir: &self.working_dir,
                env_vars: BTreeMap::new(),
                path: &self.path,
                args: &full_args,
            }),
        )
        .await
        .map_err(|_| DockerError::TimedOut {
            timeout: self.timeout,
        })?;

        let capture = match capture {
            Ok(capture) => capture,
            Err(CaptureError::MissingBinary { name }) => {
                debug!("Docker binary missing: {}", name);
                return Err(DockerError::Unavailable);
            }
            Err(e) => return Err(e.into()),
        };

        match capture.exit_code {
            Some(0) => Ok(capture),
            exit_code => Err(DockerError::CommandFailed {
                command: capture.command.clone(),
                exit_code: exit_code.unwrap_or(-1),
                stderr: capture.stderr.trim().to_string(),
            }),
        }
    }
}

#[async_trait]
impl DockerRuntime for DefaultDockerRuntime {
    async fn ping(&self) -> Result<(), DockerError> {
        self.run_docker(&["info", "--format", "{{.ServerVersion}}"])
            .await
            .map(|_| ())
    }

    async fn containers(&self, all: bool) -> Result<Vec<ContainerSummary>, DockerError> {
        let mut args = vec!["ps", "--no-trunc", "--format", "{{json .}}"];
        if all {
            args.push("--all");
        }
        let capture = self.run_docker(&args).await?;
        parse_json_lines(&capture.stdout)
    }

    async fn images(&self) -> Result<Vec<ImageSummary>, DockerError> {
        let capture = self
            .run_docker(&["images", "--format", "{{json .}}"])
            .await?;
        parse_json_lines(&capture.stdout)
    }

    async fn disk_usage(&self) -> Result<Vec<DiskUsageEntry>, DockerError> {
        let capture = self
            .run_docker(&["system", "df", "--format", "{{json .}}"])
            .await?;
        parse_json_lines(&capture.stdout)
    }

    async fn logs(&self, container: &str, tail: usize) -> Result<String, DockerError> {
        let tail = tail.to_string();
        let capture = self
            .run_docker(&["logs", "--tail", &tail, container])
            .await?;
        // docker writes container output to both streams, keep both
        Ok(format!("{}{}", capture.stdout, capture.stderr))
    }

    async fn raw(&self, args: &[String]) -> Result<OutputCapture, DockerError> {
        let args: Vec<&str> = args.iter().map(|x| x.as_str()).collect();
        self.run_docker(&args).await
    }
}

fn parse_json_lines<T>(stdout: &str) -> Result<Vec<T>, DockerError>
where
    T: for<'de> Deserialize<'de>,
{
    let mut parsed = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        parsed.push(serde_json::from_str(line)?);
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::prelude::{MockExecutionProvider, OutputCaptureBuilder};

    fn runtime_with_output(stdout: &'static str, exit_code: i32) -> DefaultDockerRuntime {
        let mut exec = MockExecutionProvider::new();
        exec.expect_run_command().returning(move |opts| {
            Ok(OutputCaptureBuilder::default()
                .command(opts.args.join(" "))
                .stdout(stdout)
                .exit_code(Some(exit_code))
                .build()
                .unwrap())
        });
        DefaultDockerRuntime::new(Arc::new(exec), PathBuf::from("/tmp"))
    }

    #[tokio::test]
    async fn containers_are_parsed_from_json_lines() {
        let runtime = runtime_with_output(
            r#"{"ID":"abc123","Names":"web","Image":"nginx:1.27","State":"running","Status":"Up 2 hours","Ports":"0.0.0.0:8080->80/tcp"}
{"ID":"def456","Names":"db","Image":"postgres:16","State":"exited","Status":"Exited (0) 3 days ago","Ports":""}"#,
            0,
        );

        let containers = runtime.containers(true).await.unwrap();
        assert_eq!(2, containers.len());
        assert_eq!("web", containers[0].name);
        assert_eq!("exited", containers[1].state);
    }

    #[tokio::test]
    async fn images_flag_dangling_entries() {
        let runtime = runtime_with_output(
            r#"{"Repository":"<none>","Tag":"<none>","ID":"sha1","Size":"120MB"}
{"Repository":"nginx","Tag":"1.27","ID":"sha2","Size":"190MB"}"#,
            0,
        );

        let images = runtime.images().await.unwrap();
        assert!(images[0].is_dangling());
        assert!(!images[1].is_dangling());
    }

    #[tokio::test]
    async fn logs_merge_stdout_and_stderr_in_order() {
        let mut exec = MockExecutionProvider::new();
        exec.expect_run_command().returning(|opts| {
            assert_eq!(
                vec!["docker", "logs", "--tail", "50", "web"],
                opts.args.iter().map(|a| a.as_str()).collect::<Vec<_>>()
            );
            Ok(OutputCaptureBuilder::default()
                .command(opts.args.join(" "))
                .stdout("app listening on :80\n")
                .stderr("deprecation warning\n")
                .exit_code(Some(0))
                .build()
                .unwrap())
        });
        let runtime = DefaultDockerRuntime::new(Arc::new(exec), PathBuf::from("/tmp"));

        let logs = runtime.logs("web", 50).await.unwrap();
        assert_eq!("app listening on :80\ndeprecation warning\n", logs);
    }

    #[tokio::test]
    async fn raw_prefixes_the_docker_binary() {
        let runtime = runtime_with_output("27.3.1\n", 0);

        let args = vec!["version".to_string(), "--format".to_string(), "{{.Server.Version}}".to_string()];
        let capture = runtime.raw(&args).await.unwrap();

        assert!(capture.is_success());
        assert_eq!("docker version --format {{.Server.Version}}", capture.command);
        assert_eq!("27.3.1\n", capture.stdout);
    }

    #[tokio::test]
    async fn non_zero_exit_surfaces_as_command_failed() {
        let runtime = runtime_with_output("", 1);

        match runtime.ping().await {
            Err(DockerError::CommandFailed { exit_code, .. }) => assert_eq!(1, exit_code),
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_docker_binary_maps_to_unavailable() {
        let mut exec = MockExecutionProvider::new();
        exec.expect_run_command().returning(|_| {
            Err(CaptureError::MissingBinary {
                name: "docker".to_string(),
            })
        });
        let runtime = DefaultDockerRuntime::new(Arc::new(exec), PathBuf::from("/tmp"));

        assert!(matches!(
            runtime.ping().await,
            Err(DockerError::Unavailable)
        ));
    }

    #[test]
    fn human_sizes_convert_to_bytes() {
        assert_eq!(Some(0), parse_human_size("0B"));
        assert_eq!(Some(1_500), parse_human_size("1.5kB"));
        assert_eq!(Some(120_000_000), parse_human_size("120MB"));
        assert_eq!(Some(2_300_000_000), parse_human_size("2.3GB"));
        assert_eq!(None, parse_human_size("garbage"));
    }
}
