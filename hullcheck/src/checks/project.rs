use crate::engine::prelude::{
    Check, CheckCategory, Context, Finding, FindingBuilder, Fix, FixAction, FixError, Location,
    Severity,
};
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_DOCKERIGNORE: &str = "\
.git
.gitignore
Dockerfile
docker-compose*.yml
compose*.yaml
**/node_modules
target
";

/// Writes a minimal `.dockerignore`. Idempotent: an existing file is left
/// untouched and counts as success.
struct WriteDockerignore {
    path: PathBuf,
}

#[async_trait]
impl FixAction for WriteDockerignore {
    async fn apply(&self) -> Result<(), FixError> {
        if self.path.exists() {
            debug!("{} already exists, nothing to do", self.path.display());
            return Ok(());
        }
        tokio::fs::write(&self.path, DEFAULT_DOCKERIGNORE).await?;
        Ok(())
    }
}

/// Without `.dockerignore` the whole working tree ships to the daemon as
/// build context.
pub struct Dockerignore;

#[async_trait]
impl Check for Dockerignore {
    fn id(&self) -> &'static str {
        "project.dockerignore"
    }

    fn name(&self) -> &'static str {
        "Missing .dockerignore"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Project
    }

    async fn run(&self, ctx: &Context) -> Result<Vec<Finding>> {
        if ctx.dockerfile_path.is_none() || ctx.dockerignore_path.is_some() {
            return Ok(Vec::new());
        }

        let target = ctx.working_dir.join(".dockerignore");
        Ok(vec![
            FindingBuilder::default()
                .check(self.id())
                .title("Missing .dockerignore")
                .severity(Severity::Warning)
                .category(self.category())
                .message(
                    "No `.dockerignore` next to the Dockerfile; the entire working tree is sent as build context.",
                )
                .location(Location::file(ctx.working_dir.clone()))
                .fixes(vec![Fix::auto(
                    "Write a starter .dockerignore",
                    Arc::new(WriteDockerignore { path: target }),
                )])
                .build()
                .expect("all required finding fields set"),
        ])
    }
}

/// CRLF line endings inside a Dockerfile or scripts break builds on Linux;
/// a `.gitattributes` normalization policy prevents them at the source.
pub struct LineEndings;

#[async_trait]
impl Check for LineEndings {
    fn id(&self) -> &'static str {
        "project.line_endings"
    }

    fn name(&self) -> &'static str {
        "No line-ending policy"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Project
    }

    async fn run(&self, ctx: &Context) -> Result<Vec<Finding>> {
        if ctx.dockerfile_path.is_none() || ctx.gitattributes_path.is_some() {
            return Ok(Vec::new());
        }

        Ok(vec![
            FindingBuilder::default()
                .check(self.id())
                .title("No line-ending policy")
                .severity(Severity::Info)
                .category(self.category())
                .message(
                    "No `.gitattributes` declaring text normalization; checkouts on Windows can introduce CRLF into build inputs.",
                )
                .location(Location::file(ctx.working_dir.clone()))
                .fixes(vec![Fix::manual(
                    "Declare a line-ending policy",
                    "Add a `.gitattributes` with `* text=auto eol=lf` (and exceptions for binary files).",
                )])
                .build()
                .expect("all required finding fields set"),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::tests::{context_for_dir, empty_context};
    use std::fs;

    #[tokio::test]
    async fn missing_dockerignore_carries_an_auto_fix() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM alpine:3.20\n").unwrap();
        let ctx = context_for_dir(dir.path()).await;

        let findings = Dockerignore.run(&ctx).await.unwrap();
        assert_eq!(1, findings.len());
        assert!(findings[0].is_fixable());

        // applying the fix writes the file; applying again is a no-op
        findings[0].fixes[0].apply().await.unwrap();
        assert!(dir.path().join(".dockerignore").is_file());
        findings[0].fixes[0].apply().await.unwrap();
    }

    #[tokio::test]
    async fn present_dockerignore_passes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM alpine:3.20\n").unwrap();
        fs::write(dir.path().join(".dockerignore"), "target/\n").unwrap();
        let ctx = context_for_dir(dir.path()).await;

        assert!(Dockerignore.run(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn project_checks_need_a_dockerfile() {
        let ctx = empty_context().await;
        assert!(Dockerignore.run(&ctx).await.unwrap().is_empty());
        assert!(LineEndings.run(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_gitattributes_is_reported_with_manual_fix() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM alpine:3.20\n").unwrap();
        let ctx = context_for_dir(dir.path()).await;

        let findings = LineEndings.run(&ctx).await.unwrap();
        assert_eq!(1, findings.len());
        assert!(findings[0].fixes[0].instructions.is_some());
        assert!(matches!(
            findings[0].fixes[0].apply().await,
            Err(FixError::NotAutomatic)
        ));
    }
}
