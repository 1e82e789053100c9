use super::check::Check;
use super::context::Context;
use super::finding::{CheckCategory, Finding, FindingBuilder, Severity};
use super::registry::{CheckRegistry, SelectFilter};
use super::report::Report;
use std::collections::BTreeSet;
use tracing::{debug, error};

#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    /// When set, only checks in these categories run.
    pub categories: Option<BTreeSet<CheckCategory>>,
    /// Findings below this severity are dropped after collection.
    pub min_severity: Option<Severity>,
}

/// Dispatches eligible checks against a shared read-only context and
/// aggregates a report. One failing check never stops the others.
pub struct Runner<'a> {
    registry: &'a CheckRegistry,
}

impl<'a> Runner<'a> {
    pub fn new(registry: &'a CheckRegistry) -> Self {
        Self { registry }
    }

    pub async fn run(&self, ctx: &Context, opts: &RunOptions) -> Report {
        let eligible = self.registry.select(&SelectFilter {
            categories: opts.categories.clone(),
            docker_available: ctx.docker_available,
        });

        let mut findings = Vec::new();
        for check in &eligible {
            debug!("Running check {}", check.id());
            match check.run(ctx).await {
                Ok(mut produced) => {
                    debug!("Check {} produced {} findings", check.id(), produced.len());
                    findings.append(&mut produced);
                }
                Err(e) => {
                    error!("Check {} failed to execute: {:#}", check.id(), e);
                    findings.push(execution_failure(check.as_ref(), &e));
                }
            }
        }

        Report::assemble(findings, eligible.len(), opts.min_severity)
    }
}

/// Synthetic finding for a check whose run faulted. Tagged with the
/// internal category so it cannot be mistaken for a real diagnostic; the
/// check still counts toward the summary total.
fn execution_failure(check: &dyn Check, error: &anyhow::Error) -> Finding {
    FindingBuilder::default()
        .check(check.id())
        .title(format!("Check `{}` failed to execute", check.name()))
        .severity(Severity::Error)
        .category(CheckCategory::Internal)
        .message(format!("{:#}", error))
        .build()
        .expect("all required finding fields set")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::prelude::{ContextBuilder, MockCheck};
    use crate::shared::prelude::{DockerError, DockerRuntime, MockDockerRuntime};
    use anyhow::anyhow;
    use std::sync::Arc;

    fn make_check(
        id: &'static str,
        category: CheckCategory,
        requires_docker: bool,
        result: impl Fn() -> anyhow::Result<Vec<Finding>> + Send + Sync + 'static,
    ) -> Arc<dyn Check> {
        let mut check = MockCheck::new();
        check.expect_id().return_const(id);
        check.expect_name().return_const(id);
        check.expect_category().return_const(category);
        check.expect_requires_docker().return_const(requires_docker);
        check.expect_run().returning(move |_| result());
        Arc::new(check)
    }

    fn one_finding(id: &'static str, severity: Severity) -> Finding {
        FindingBuilder::default()
            .check(id)
            .title("finding")
            .severity(severity)
            .category(CheckCategory::Project)
            .message("message")
            .build()
            .unwrap()
    }

    async fn context(docker_available: bool) -> Context {
        let dir = tempfile::tempdir().unwrap();
        let mut docker = MockDockerRuntime::new();
        if docker_available {
            docker.expect_ping().returning(|| Ok(()));
        } else {
            docker
                .expect_ping()
                .returning(|| Err(DockerError::Unavailable));
        }
        let docker: Arc<dyn DockerRuntime> = Arc::new(docker);
        ContextBuilder::new(dir.path())
            .with_docker_runtime(docker)
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn docker_requiring_check_is_skipped_when_unavailable() {
        let mut registry = CheckRegistry::new();
        registry
            .register(make_check("runtime.docker", CheckCategory::Runtime, true, || {
                panic!("must not run without docker")
            }))
            .unwrap();
        registry
            .register(make_check("project.a", CheckCategory::Project, false, || {
                Ok(vec![one_finding("project.a", Severity::Info)])
            }))
            .unwrap();
        registry
            .register(make_check("project.b", CheckCategory::Project, false, || Ok(Vec::new())))
            .unwrap();

        let ctx = context(false).await;
        let report = Runner::new(&registry).run(&ctx, &RunOptions::default()).await;

        assert_eq!(2, report.summary.total);
        assert_eq!(1, report.findings.len());
    }

    #[tokio::test]
    async fn failing_check_is_isolated_and_counted() {
        let mut registry = CheckRegistry::new();
        registry
            .register(make_check("project.first", CheckCategory::Project, false, || {
                Ok(vec![one_finding("project.first", Severity::Warning)])
            }))
            .unwrap();
        registry
            .register(make_check("project.broken", CheckCategory::Project, false, || {
                Err(anyhow!("exploded"))
            }))
            .unwrap();
        registry
            .register(make_check("project.last", CheckCategory::Project, false, || {
                Ok(vec![one_finding("project.last", Severity::Info)])
            }))
            .unwrap();

        let ctx = context(false).await;
        let report = Runner::new(&registry).run(&ctx, &RunOptions::default()).await;

        // the faulting check still counts toward total and the others ran
        assert_eq!(3, report.summary.total);
        assert_eq!(3, report.findings.len());

        let synthetic = &report.findings[1];
        assert_eq!(CheckCategory::Internal, synthetic.category);
        assert_eq!(Severity::Error, synthetic.severity);
        assert_eq!("project.broken", synthetic.check);
        assert!(synthetic.message.contains("exploded"));
    }

    #[tokio::test]
    async fn min_severity_filters_after_collection() {
        let mut registry = CheckRegistry::new();
        registry
            .register(make_check("project.mixed", CheckCategory::Project, false, || {
                Ok(vec![
                    one_finding("project.mixed", Severity::Error),
                    one_finding("project.mixed", Severity::Warning),
                    one_finding("project.mixed", Severity::Info),
                ])
            }))
            .unwrap();

        let ctx = context(false).await;
        let report = Runner::new(&registry)
            .run(
                &ctx,
                &RunOptions {
                    categories: None,
                    min_severity: Some(Severity::Warning),
                },
            )
            .await;

        assert_eq!(2, report.findings.len());
        assert_eq!(1, report.summary.errors);
        assert_eq!(1, report.summary.warnings);
        assert_eq!(0, report.summary.info);
    }

    #[tokio::test]
    async fn category_filter_limits_execution() {
        let mut registry = CheckRegistry::new();
        registry
            .register(make_check("compose.a", CheckCategory::Compose, false, || {
                Ok(vec![one_finding("compose.a", Severity::Info)])
            }))
            .unwrap();
        registry
            .register(make_check("project.b", CheckCategory::Project, false, || {
                panic!("filtered out, must not run")
            }))
            .unwrap();

        let ctx = context(false).await;
        let report = Runner::new(&registry)
            .run(
                &ctx,
                &RunOptions {
                    categories: Some(BTreeSet::from([CheckCategory::Compose])),
                    min_severity: None,
                },
            )
            .await;

        assert_eq!(1, report.summary.total);
        assert_eq!("compose.a", report.findings[0].check);
    }

    #[tokio::test]
    async fn repeated_runs_produce_identical_reports() {
        let mut registry = CheckRegistry::new();
        registry
            .register(make_check("project.z", CheckCategory::Project, false, || {
                Ok(vec![one_finding("project.z", Severity::Warning)])
            }))
            .unwrap();
        registry
            .register(make_check("project.a", CheckCategory::Project, false, || {
                Ok(vec![one_finding("project.a", Severity::Error)])
            }))
            .unwrap();

        let ctx = context(false).await;
        let runner = Runner::new(&registry);

        let first = runner.run(&ctx, &RunOptions::default()).await;
        let second = runner.run(&ctx, &RunOptions::default()).await;

        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
        // registration order, not severity order
        assert_eq!("project.z", first.findings[0].check);
        assert_eq!("project.a", first.findings[1].check);
    }
}
