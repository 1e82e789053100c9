use crate::engine::prelude::{
    Check, CheckCategory, Context, Finding, FindingBuilder, Fix, Location, Severity,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

fn finding(check: &dyn Check, severity: Severity, title: &str) -> FindingBuilder {
    let mut builder = FindingBuilder::default();
    builder
        .check(check.id())
        .title(title)
        .severity(severity)
        .category(check.category());
    builder
}

/// `depends_on` naming a service the document does not declare.
pub struct MissingDependency;

#[async_trait]
impl Check for MissingDependency {
    fn id(&self) -> &'static str {
        "compose.missing_dependency"
    }

    fn name(&self) -> &'static str {
        "Dependency on undeclared service"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Compose
    }

    async fn run(&self, ctx: &Context) -> Result<Vec<Finding>> {
        let Some(model) = &ctx.compose else {
            return Ok(Vec::new());
        };
        let names = model.service_names();

        let mut findings = Vec::new();
        for service in &model.services {
            let Some(depends_on) = &service.depends_on else {
                continue;
            };
            for dependency in depends_on {
                if names.contains(&dependency.as_str()) {
                    continue;
                }
                findings.push(
                    finding(self, Severity::Error, "Dependency on undeclared service")
                        .message(format!(
                            "Service `{}` depends on `{}`, which is not declared in this document.",
                            service.name, dependency
                        ))
                        .location(Location::file(model.path.clone()))
                        .fixes(vec![Fix::manual(
                            "Declare the dependency or drop it",
                            format!(
                                "Add a `{}` service, or remove it from `depends_on` of `{}`.",
                                dependency, service.name
                            ),
                        )])
                        .build()
                        .expect("all required finding fields set"),
                );
            }
        }
        Ok(findings)
    }
}

/// Services without a healthcheck stay "up" even when broken, and
/// `depends_on: service_healthy` cannot wait on them.
pub struct NoHealthcheck;

#[async_trait]
impl Check for NoHealthcheck {
    fn id(&self) -> &'static str {
        "compose.no_healthcheck"
    }

    fn name(&self) -> &'static str {
        "Service without healthcheck"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Compose
    }

    async fn run(&self, ctx: &Context) -> Result<Vec<Finding>> {
        let Some(model) = &ctx.compose else {
            return Ok(Vec::new());
        };

        let mut findings = Vec::new();
        for service in model.services.iter().filter(|s| !s.has_healthcheck) {
            findings.push(
                finding(self, Severity::Info, "Service without healthcheck")
                    .message(format!(
                        "Service `{}` declares no healthcheck; orchestration cannot tell it is broken.",
                        service.name
                    ))
                    .location(Location::file(model.path.clone()))
                    .fixes(vec![Fix::manual(
                        "Add a healthcheck",
                        format!(
                            "Add a `healthcheck` block with a `test` command to service `{}`.",
                            service.name
                        ),
                    )])
                    .build()
                    .expect("all required finding fields set"),
            );
        }
        Ok(findings)
    }
}

/// Two services publishing the same host port cannot start together.
pub struct DuplicateHostPort;

#[async_trait]
impl Check for DuplicateHostPort {
    fn id(&self) -> &'static str {
        "compose.duplicate_host_port"
    }

    fn name(&self) -> &'static str {
        "Host port published twice"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Compose
    }

    async fn run(&self, ctx: &Context) -> Result<Vec<Finding>> {
        let Some(model) = &ctx.compose else {
            return Ok(Vec::new());
        };

        let mut by_host_port: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for service in &model.services {
            for port in &service.ports {
                if let Some(host_port) = host_port(port) {
                    by_host_port
                        .entry(host_port)
                        .or_default()
                        .push(service.name.as_str());
                }
            }
        }

        let mut findings = Vec::new();
        for (port, services) in by_host_port {
            if services.len() < 2 {
                continue;
            }
            findings.push(
                finding(self, Severity::Error, "Host port published twice")
                    .message(format!(
                        "Host port {} is published by more than one service: {}.",
                        port,
                        services.join(", ")
                    ))
                    .location(Location::file(model.path.clone()))
                    .details(serde_json::json!({ "port": port, "services": services }))
                    .fixes(vec![Fix::manual(
                        "Use distinct host ports",
                        "Change the published side of the mapping so every service gets its own host port.",
                    )])
                    .build()
                    .expect("all required finding fields set"),
            );
        }
        Ok(findings)
    }
}

/// Host side of a normalized port mapping. `"8080:80"` → 8080,
/// `"127.0.0.1:8080:80"` → 8080; a bare container port publishes an
/// ephemeral host port and cannot collide. Splitting from the right keeps
/// colon-bearing bind addresses (`"[::1]:8080:80"`) in the address slot.
fn host_port(mapping: &str) -> Option<String> {
    let mut parts: Vec<&str> = mapping.rsplitn(3, ':').collect();
    parts.reverse();
    match parts.len() {
        2 => Some(parts[0].to_string()),
        3 => Some(parts[1].to_string()),
        _ => None,
    }
}
