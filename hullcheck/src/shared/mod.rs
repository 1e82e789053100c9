mod docker;
mod exec;
mod logging;

pub mod prelude {
    pub use super::docker::{
        ContainerSummary, DefaultDockerRuntime, DiskUsageEntry, DockerError, DockerRuntime,
        ImageSummary, MockDockerRuntime,
    };
    pub use super::exec::{
        CaptureError, CaptureOpts, DefaultExecutionProvider, ExecutionProvider,
        MockExecutionProvider, OutputCapture, OutputCaptureBuilder,
    };
    pub use super::logging::LoggingOpts;
}
