use crate::engine::prelude::{
    Check, CheckCategory, Context, Finding, FindingBuilder, Fix, Severity,
};
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

/// Build-cache share of disk usage above this is worth reclaiming.
const BUILD_CACHE_THRESHOLD_BYTES: u64 = 1_000_000_000;

fn finding(check: &dyn Check, severity: Severity, title: &str) -> FindingBuilder {
    let mut builder = FindingBuilder::default();
    builder
        .check(check.id())
        .title(title)
        .severity(severity)
        .category(check.category());
    builder
}

/// Dangling images hold disk with no tag pointing at them.
///
/// Every check in this module treats a runtime transport failure as "no
/// findings": the typed `Err` is matched and turned into an early return, so
/// a flaky daemon shrinks the report instead of aborting the scan.
pub struct DanglingImages;

#[async_trait]
impl Check for DanglingImages {
    fn id(&self) -> &'static str {
        "runtime.dangling_images"
    }

    fn name(&self) -> &'static str {
        "Dangling images"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Runtime
    }

    fn requires_docker(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &Context) -> Result<Vec<Finding>> {
        let Ok(images) = ctx.docker.images().await else {
            debug!("{}: docker query failed, returning no findings", self.id());
            return Ok(Vec::new());
        };

        let dangling: Vec<_> = images.iter().filter(|i| i.is_dangling()).collect();
        if dangling.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![
            finding(self, Severity::Warning, "Dangling images")
                .message(format!(
                    "{} dangling image(s) are holding disk space.",
                    dangling.len()
                ))
                .details(serde_json::json!({
                    "count": dangling.len(),
                    "ids": dangling.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
                }))
                .fixes(vec![Fix::manual(
                    "Prune dangling images",
                    "Run `docker image prune` to remove images no tag points at.",
                )])
                .build()
                .expect("all required finding fields set"),
        ])
    }
}

/// Exited containers linger until removed and keep their writable layers.
pub struct StoppedContainers;

#[async_trait]
impl Check for StoppedContainers {
    fn id(&self) -> &'static str {
        "runtime.stopped_containers"
    }

    fn name(&self) -> &'static str {
        "Stopped containers"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Runtime
    }

    fn requires_docker(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &Context) -> Result<Vec<Finding>> {
        let Ok(containers) = ctx.docker.containers(true).await else {
            debug!("{}: docker query failed, returning no findings", self.id());
            return Ok(Vec::new());
        };

        let stopped: Vec<_> = containers
            .iter()
            .filter(|c| c.state == "exited" || c.state == "dead")
            .collect();
        if stopped.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![
            finding(self, Severity::Info, "Stopped containers")
                .message(format!(
                    "{} stopped container(s): {}.",
                    stopped.len(),
                    stopped
                        .iter()
                        .map(|c| c.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
                .details(serde_json::json!({
                    "names": stopped.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                }))
                .fixes(vec![Fix::manual(
                    "Remove stopped containers",
                    "Run `docker container prune`, or `docker rm <name>` for individual containers.",
                )])
                .build()
                .expect("all required finding fields set"),
        ])
    }
}

/// Build cache grows without bound until pruned.
pub struct BuildCache;

#[async_trait]
impl Check for BuildCache {
    fn id(&self) -> &'static str {
        "runtime.build_cache"
    }

    fn name(&self) -> &'static str {
        "Large build cache"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Runtime
    }

    fn requires_docker(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &Context) -> Result<Vec<Finding>> {
        let Ok(usage) = ctx.docker.disk_usage().await else {
            debug!("{}: docker query failed, returning no findings", self.id());
            return Ok(Vec::new());
        };

        let Some(cache) = usage.iter().find(|entry| entry.kind == "Build Cache") else {
            return Ok(Vec::new());
        };
        let Some(bytes) = cache.size_bytes() else {
            return Ok(Vec::new());
        };
        if bytes < BUILD_CACHE_THRESHOLD_BYTES {
            return Ok(Vec::new());
        }

        Ok(vec![
            finding(self, Severity::Info, "Large build cache")
                .message(format!(
                    "Build cache holds {} ({} reclaimable).",
                    cache.size, cache.reclaimable
                ))
                .details(serde_json::json!({ "size": cache.size, "bytes": bytes }))
                .fixes(vec![Fix::manual(
                    "Prune the build cache",
                    "Run `docker builder prune` to drop unused cache entries.",
                )])
                .build()
                .expect("all required finding fields set"),
        ])
    }
}
