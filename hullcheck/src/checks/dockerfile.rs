use crate::dockerfile::prelude::{DockerfileModel, Instruction};
use crate::engine::prelude::{
    Check, CheckCategory, Context, Finding, FindingBuilder, Fix, Location, Severity,
};
use anyhow::Result;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PLATFORM_FLAG: Regex = Regex::new(r"--platform=(\S+)").unwrap();
    static ref APT_INSTALL: Regex = Regex::new(r"apt-get\s+(-\S+\s+)*install").unwrap();
}

fn finding(check: &dyn Check, severity: Severity, title: &str) -> FindingBuilder {
    let mut builder = FindingBuilder::default();
    builder
        .check(check.id())
        .title(title)
        .severity(severity)
        .category(check.category());
    builder
}

fn location(model: &DockerfileModel, instruction: &Instruction) -> Location {
    Location::line(model.path.clone(), instruction.lineno)
}

/// The image reference of a `FROM`: the first argument that is not a flag.
/// Stage naming (`AS build`) and anything after it is ignored.
fn base_image_ref(from: &Instruction) -> Option<&str> {
    from.args
        .split_whitespace()
        .find(|token| !token.starts_with("--"))
}

/// Stage names introduced with `AS` on a `FROM` line, lowercased. A later
/// `FROM <alias>` refers to the stage, not to a registry image.
fn stage_aliases(model: &DockerfileModel) -> Vec<String> {
    model
        .stages
        .iter()
        .filter_map(|stage| stage.base_image())
        .filter_map(|from| {
            let mut tokens = from.args.split_whitespace();
            while let Some(token) = tokens.next() {
                if token.eq_ignore_ascii_case("as") {
                    return tokens.next().map(|alias| alias.to_lowercase());
                }
            }
            None
        })
        .collect()
}

/// Base images without a tag, or tagged `:latest`, drift under rebuilds.
pub struct LatestTag;

#[async_trait]
impl Check for LatestTag {
    fn id(&self) -> &'static str {
        "dockerfile.latest_tag"
    }

    fn name(&self) -> &'static str {
        "Unpinned base image"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Dockerfile
    }

    async fn run(&self, ctx: &Context) -> Result<Vec<Finding>> {
        let Some(model) = &ctx.dockerfile else {
            return Ok(Vec::new());
        };

        let aliases = stage_aliases(model);
        let mut findings = Vec::new();
        for stage in &model.stages {
            let Some(from) = stage.base_image() else {
                continue;
            };
            let Some(image) = base_image_ref(from) else {
                continue;
            };

            // build-stage references (FROM build) and variables are out of reach
            if image.starts_with('$') || aliases.contains(&image.to_lowercase()) {
                continue;
            }
            if image.contains('@') {
                // digest-pinned
                continue;
            }

            let tag = image.rsplit('/').next().and_then(|last| last.split_once(':'));
            let unpinned = match tag {
                None => true,
                Some((_, tag)) => tag == "latest",
            };
            if unpinned {
                findings.push(
                    finding(self, Severity::Warning, "Unpinned base image")
                        .message(format!(
                            "Base image `{}` floats; rebuilds can silently change the image.",
                            image
                        ))
                        .location(location(model, from))
                        .fixes(vec![Fix::manual(
                            "Pin the base image",
                            format!("Replace `{}` with an explicit version tag, for example `{}:<version>`.",
                                image, image.split(':').next().unwrap_or(image)),
                        )])
                        .build()
                        .expect("all required finding fields set"),
                );
            }
        }
        Ok(findings)
    }
}

/// A hard-coded `--platform=` on FROM breaks multi-arch builds.
pub struct PlatformFlag;

#[async_trait]
impl Check for PlatformFlag {
    fn id(&self) -> &'static str {
        "dockerfile.platform_flag"
    }

    fn name(&self) -> &'static str {
        "Hard-coded platform"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Dockerfile
    }

    async fn run(&self, ctx: &Context) -> Result<Vec<Finding>> {
        let Some(model) = &ctx.dockerfile else {
            return Ok(Vec::new());
        };

        let mut findings = Vec::new();
        for from in model.all_instructions().filter(|i| i.is("FROM")) {
            let Some(capture) = PLATFORM_FLAG.captures(&from.args) else {
                continue;
            };
            let platform = &capture[1];
            // $BUILDPLATFORM / $TARGETPLATFORM are the supported way
            if platform.starts_with('$') {
                continue;
            }

            findings.push(
                finding(self, Severity::Warning, "Hard-coded platform")
                    .message(format!(
                        "`--platform={}` pins every build to one architecture.",
                        platform
                    ))
                    .location(location(model, from))
                    .fixes(vec![Fix::manual(
                        "Use a build-time platform variable",
                        "Replace the literal platform with `--platform=$BUILDPLATFORM`, or drop the flag and pass `--platform` to `docker build`.",
                    )])
                    .build()
                    .expect("all required finding fields set"),
            );
        }
        Ok(findings)
    }
}

/// Containers default to root unless the final stage sets a USER.
pub struct RootUser;

#[async_trait]
impl Check for RootUser {
    fn id(&self) -> &'static str {
        "dockerfile.root_user"
    }

    fn name(&self) -> &'static str {
        "Container runs as root"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Dockerfile
    }

    async fn run(&self, ctx: &Context) -> Result<Vec<Finding>> {
        let Some(model) = &ctx.dockerfile else {
            return Ok(Vec::new());
        };
        let Some(stage) = model.final_stage() else {
            return Ok(Vec::new());
        };

        let last_user = stage.instructions.iter().rev().find(|i| i.is("USER"));

        let (message, instruction) = match last_user {
            None => (
                "No `USER` instruction in the final stage; the container runs as root.".to_string(),
                stage.base_image(),
            ),
            Some(user) => {
                let name = user.args.split(':').next().unwrap_or("");
                if name != "root" && name != "0" {
                    return Ok(Vec::new());
                }
                (
                    format!("Final stage switches to `{}`.", user.args),
                    Some(user),
                )
            }
        };

        Ok(vec![
            finding(self, Severity::Warning, "Container runs as root")
                .message(message)
                .location(instruction.map(|i| location(model, i)).unwrap_or_else(|| Location::file(model.path.clone())))
                .fixes(vec![Fix::manual(
                    "Run as an unprivileged user",
                    "Create a dedicated user in the image and add `USER <name>` as the last user switch in the final stage.",
                )])
                .build()
                .expect("all required finding fields set"),
        ])
    }
}

/// `apt-get install` without clearing `/var/lib/apt/lists` bloats layers.
pub struct AptCache;

#[async_trait]
impl Check for AptCache {
    fn id(&self) -> &'static str {
        "dockerfile.apt_cache"
    }

    fn name(&self) -> &'static str {
        "Apt cache left in layer"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Dockerfile
    }

    async fn run(&self, ctx: &Context) -> Result<Vec<Finding>> {
        let Some(model) = &ctx.dockerfile else {
            return Ok(Vec::new());
        };

        let mut findings = Vec::new();
        for run in model.all_instructions().filter(|i| i.is("RUN")) {
            if APT_INSTALL.is_match(&run.args) && !run.args.contains("/var/lib/apt/lists") {
                findings.push(
                    finding(self, Severity::Info, "Apt cache left in layer")
                        .message(
                            "`apt-get install` without removing `/var/lib/apt/lists` leaves the package index in the layer.",
                        )
                        .location(location(model, run))
                        .fixes(vec![Fix::manual(
                            "Clean the apt lists in the same RUN",
                            "Append `&& rm -rf /var/lib/apt/lists/*` to the same RUN instruction.",
                        )])
                        .build()
                        .expect("all required finding fields set"),
                );
            }
        }
        Ok(findings)
    }
}

/// `ADD` has surprising extraction and URL semantics; plain file copies
/// belong to `COPY`.
pub struct AddOverCopy;

#[async_trait]
impl Check for AddOverCopy {
    fn id(&self) -> &'static str {
        "dockerfile.add_over_copy"
    }

    fn name(&self) -> &'static str {
        "ADD used for a plain copy"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Dockerfile
    }

    async fn run(&self, ctx: &Context) -> Result<Vec<Finding>> {
        let Some(model) = &ctx.dockerfile else {
            return Ok(Vec::new());
        };

        let archive_suffixes = [".tar", ".tar.gz", ".tgz", ".tar.bz2", ".tar.xz", ".zip"];
        let mut findings = Vec::new();
        for add in model.all_instructions().filter(|i| i.is("ADD")) {
            let justified = add.args.split_whitespace().any(|token| {
                token.starts_with("http://")
                    || token.starts_with("https://")
                    || archive_suffixes.iter().any(|suffix| token.ends_with(suffix))
            });
            if justified {
                continue;
            }

            findings.push(
                finding(self, Severity::Info, "ADD used for a plain copy")
                    .message("`ADD` of a local path that is neither a URL nor an archive; `COPY` is explicit and predictable.")
                    .location(location(model, add))
                    .fixes(vec![Fix::manual(
                        "Use COPY",
                        "Replace `ADD` with `COPY` for plain files and directories.",
                    )])
                    .build()
                    .expect("all required finding fields set"),
            );
        }
        Ok(findings)
    }
}
