use crate::compose::prelude::{ComposeModel, ComposeParseError};
use crate::dockerfile::prelude::DockerfileModel;
use crate::shared::prelude::{DefaultDockerRuntime, DefaultExecutionProvider, DockerRuntime};
use crate::{compose, dockerfile};
use educe::Educe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Conventional file names probed in priority order when no explicit path
/// is supplied.
const DOCKERFILE_NAMES: &[&str] = &["Dockerfile", "Containerfile"];
const COMPOSE_NAMES: &[&str] = &[
    "compose.yaml",
    "compose.yml",
    "docker-compose.yaml",
    "docker-compose.yml",
];

const DOCKER_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Dockerfile `{}` does not exist.", path.display())]
    MissingDockerfile { path: PathBuf },
    #[error("Compose file `{}` does not exist.", path.display())]
    MissingComposeFile { path: PathBuf },
    #[error(transparent)]
    ComposeParse(#[from] ComposeParseError),
    #[error("Unable to read `{}`. {error:?}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
}

/// Everything a check may look at. Built once per invocation and shared
/// read-only across all checks for the duration of the run.
#[derive(Educe, Clone)]
#[educe(Debug)]
pub struct Context {
    pub working_dir: PathBuf,
    pub dockerfile_path: Option<PathBuf>,
    pub compose_path: Option<PathBuf>,
    pub dockerignore_path: Option<PathBuf>,
    pub gitattributes_path: Option<PathBuf>,
    pub dockerfile: Option<DockerfileModel>,
    pub compose: Option<ComposeModel>,
    /// Result of the bounded daemon probe; gates Docker-requiring checks.
    pub docker_available: bool,
    #[educe(Debug(ignore))]
    pub docker: Arc<dyn DockerRuntime>,
}

pub struct ContextBuilder {
    working_dir: PathBuf,
    dockerfile: Option<PathBuf>,
    compose: Option<PathBuf>,
    docker: Option<Arc<dyn DockerRuntime>>,
    probe_timeout: Duration,
}

impl ContextBuilder {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            dockerfile: None,
            compose: None,
            docker: None,
            probe_timeout: DOCKER_PROBE_TIMEOUT,
        }
    }

    /// Explicitly supplied paths must exist; see [`ContextError`].
    pub fn with_dockerfile(mut self, path: impl Into<PathBuf>) -> Self {
        self.dockerfile = Some(path.into());
        self
    }

    pub fn with_compose(mut self, path: impl Into<PathBuf>) -> Self {
        self.compose = Some(path.into());
        self
    }

    pub fn with_docker_runtime(mut self, docker: Arc<dyn DockerRuntime>) -> Self {
        self.docker = Some(docker);
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub async fn build(self) -> Result<Context, ContextError> {
        let dockerfile_path = resolve_input(
            &self.working_dir,
            self.dockerfile,
            DOCKERFILE_NAMES,
            |path| ContextError::MissingDockerfile { path },
        )?;
        let compose_path = resolve_input(&self.working_dir, self.compose, COMPOSE_NAMES, |path| {
            ContextError::MissingComposeFile { path }
        })?;

        let dockerignore_path = probe_presence(&self.working_dir, ".dockerignore");
        let gitattributes_path = probe_presence(&self.working_dir, ".gitattributes");

        let dockerfile = match &dockerfile_path {
            Some(path) => Some(dockerfile::parse(path, &read(path).await?)),
            None => None,
        };
        let compose = match &compose_path {
            Some(path) => Some(compose::parse(path, &read(path).await?)?),
            None => None,
        };

        let docker = self.docker.unwrap_or_else(|| {
            Arc::new(DefaultDockerRuntime::new(
                Arc::new(DefaultExecutionProvider::default()),
                self.working_dir.clone(),
            ))
        });
        let docker_available = probe_docker(docker.as_ref(), self.probe_timeout).await;

        Ok(Context {
            working_dir: self.working_dir,
            dockerfile_path,
            compose_path,
            dockerignore_path,
            gitattributes_path,
            dockerfile,
            compose,
            docker_available,
            docker,
        })
    }
}

fn resolve_input(
    working_dir: &Path,
    explicit: Option<PathBuf>,
    conventional_names: &[&str],
    missing: impl FnOnce(PathBuf) -> ContextError,
) -> Result<Option<PathBuf>, ContextError> {
    if let Some(path) = explicit {
        let path = if path.is_absolute() {
            path
        } else {
            working_dir.join(path)
        };
        if !path.is_file() {
            return Err(missing(path));
        }
        return Ok(Some(path));
    }

    for name in conventional_names {
        let candidate = working_dir.join(name);
        if candidate.is_file() {
            debug!("Discovered {}", candidate.display());
            return Ok(Some(candidate));
        }
    }

    Ok(None)
}

fn probe_presence(working_dir: &Path, name: &str) -> Option<PathBuf> {
    let candidate = working_dir.join(name);
    candidate.is_file().then_some(candidate)
}

/// Any probe failure, daemon absent, socket unreachable, permission denied,
/// or timeout, degrades to "unavailable" and never raises.
async fn probe_docker(docker: &dyn DockerRuntime, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, docker.ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            info!("Docker daemon unavailable: {}", e);
            false
        }
        Err(_) => {
            info!("Docker daemon probe timed out after {:?}", timeout);
            false
        }
    }
}

async fn read(path: &Path) -> Result<String, ContextError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|error| ContextError::IoError {
            path: path.to_path_buf(),
            error,
        })
}
