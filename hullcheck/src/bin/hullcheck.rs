use anyhow::Result;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use human_panic::setup_panic;
use hullcheck::prelude::*;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{error, warn};

/// hullcheck
///
/// Scans a container project, its Dockerfile, compose manifest, and the
/// local Docker daemon, and reports misconfigurations before they reach a
/// build or a deploy.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(flatten)]
    logging: LoggingOpts,

    /// Directory to scan.
    #[arg(short = 'C', long, default_value = ".")]
    working_dir: PathBuf,

    /// Explicit Dockerfile path; must exist when given.
    #[arg(long)]
    dockerfile: Option<PathBuf>,

    /// Explicit compose file path; must exist when given.
    #[arg(long)]
    compose: Option<PathBuf>,

    /// Only run checks in these categories. Repeatable.
    #[arg(long, value_parser = parse_category)]
    category: Vec<CheckCategory>,

    /// Drop findings below this severity.
    #[arg(long, value_parser = parse_severity)]
    min_severity: Option<Severity>,

    /// Apply automatic fixes after reporting.
    #[arg(long)]
    fix: bool,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn parse_category(value: &str) -> Result<CheckCategory, strum::ParseError> {
    CheckCategory::from_str(value)
}

fn parse_severity(value: &str) -> Result<Severity, strum::ParseError> {
    Severity::from_str(value)
}

#[tokio::main]
async fn main() {
    setup_panic!();
    let opts = Cli::parse();
    opts.logging.configure_logging();

    let exit_code = run(opts).await.unwrap_or_else(|e| {
        error!("Fatal error. {:#}", e);
        2
    });
    std::process::exit(exit_code);
}

async fn run(opts: Cli) -> Result<i32> {
    let mut builder = ContextBuilder::new(&opts.working_dir);
    if let Some(path) = &opts.dockerfile {
        builder = builder.with_dockerfile(path);
    }
    if let Some(path) = &opts.compose {
        builder = builder.with_compose(path);
    }
    let ctx = builder.build().await?;

    let registry = builtin_registry()?;
    let run_opts = RunOptions {
        categories: if opts.category.is_empty() {
            None
        } else {
            Some(BTreeSet::from_iter(opts.category.iter().copied()))
        },
        min_severity: opts.min_severity,
    };

    let report = Runner::new(&registry).run(&ctx, &run_opts).await;

    match opts.format {
        Format::Text => render_text(&report),
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if opts.fix {
        apply_fixes(&report).await;
    }

    Ok(if report.has_errors() { 1 } else { 0 })
}

fn render_text(report: &Report) {
    for finding in &report.findings {
        let tag = match finding.severity {
            Severity::Error => "ERROR".red().bold(),
            Severity::Warning => "WARN".yellow().bold(),
            Severity::Info => "INFO".cyan(),
        };
        let location = finding
            .location
            .as_ref()
            .map(|l| match l.line {
                Some(line) => format!(" ({}:{})", l.path.display(), line),
                None => format!(" ({})", l.path.display()),
            })
            .unwrap_or_default();

        println!(
            "{:>5} {} {}{}",
            tag,
            finding.check.white().bold(),
            finding.title,
            location.dimmed()
        );
        println!("      {}", finding.message);
        for fix in &finding.fixes {
            match fix.kind {
                FixKind::Auto => {
                    println!("      {} {} (run with --fix)", "fix:".green(), fix.description);
                }
                FixKind::Manual => {
                    println!("      {} {}", "fix:".green(), fix.description);
                    if let Some(instructions) = &fix.instructions {
                        println!("           {}", instructions.dimmed());
                    }
                }
            }
        }
    }

    if !report.findings.is_empty() {
        println!();
    }
    println!(
        "{} check(s) run: {} error(s), {} warning(s), {} info, {} fixable",
        report.summary.total,
        report.summary.errors,
        report.summary.warnings,
        report.summary.info,
        report.summary.fixable
    );
}

async fn apply_fixes(report: &Report) {
    for finding in &report.findings {
        for fix in finding.fixes.iter().filter(|f| f.kind == FixKind::Auto) {
            match fix.apply().await {
                Ok(()) => println!("{} {}", "applied:".green().bold(), fix.description),
                Err(e) => warn!("Fix `{}` failed: {}", fix.description, e),
            }
        }
    }
}
