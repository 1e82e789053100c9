use async_trait::async_trait;
use derive_builder::Builder;
use educe::Educe;
use mockall::automock;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use strum::{Display, EnumString};
use thiserror::Error;

/// Totally ordered: info < warning < error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Closed enumeration of check categories. `Internal` is reserved for the
/// runner's synthetic findings when a check itself faults.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CheckCategory {
    Dockerfile,
    Compose,
    Project,
    Runtime,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Location {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            line: None,
        }
    }

    pub fn line(path: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            path: path.into(),
            line: Some(line),
        }
    }
}

#[derive(Error, Debug)]
pub enum FixError {
    #[error("Fix is manual and cannot be applied automatically.")]
    NotAutomatic,
    #[error("Unable to apply fix. {error:?}")]
    IoError {
        #[from]
        error: std::io::Error,
    },
    #[error("Fix failed. {reason}")]
    Failed { reason: String },
}

/// An executable remediation. Implementations must be idempotent: applying a
/// fix that already took effect succeeds without changing anything.
#[automock]
#[async_trait]
pub trait FixAction: Send + Sync {
    async fn apply(&self) -> Result<(), FixError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FixKind {
    Manual,
    Auto,
}

#[derive(Educe, Clone, Serialize)]
#[educe(Debug)]
pub struct Fix {
    pub description: String,
    pub kind: FixKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip)]
    #[educe(Debug(ignore))]
    action: Option<Arc<dyn FixAction>>,
}

impl Fix {
    pub fn manual(description: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            kind: FixKind::Manual,
            instructions: Some(instructions.into()),
            action: None,
        }
    }

    pub fn auto(description: impl Into<String>, action: Arc<dyn FixAction>) -> Self {
        Self {
            description: description.into(),
            kind: FixKind::Auto,
            instructions: None,
            action: Some(action),
        }
    }

    /// Apply an auto fix. Failure is reported to the caller and never
    /// retried here; a manual fix returns `FixError::NotAutomatic`.
    pub async fn apply(&self) -> Result<(), FixError> {
        match &self.action {
            Some(action) => action.apply().await,
            None => Err(FixError::NotAutomatic),
        }
    }
}

/// One diagnostic produced by a check.
#[derive(Debug, Clone, Serialize, Builder)]
#[builder(setter(into))]
pub struct Finding {
    /// Id of the check that produced this finding.
    pub check: String,
    pub title: String,
    pub severity: Severity,
    pub category: CheckCategory,
    pub message: String,
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[builder(default)]
    pub fixes: Vec<Fix>,
    /// Free-form structured payload for machine consumers.
    #[builder(default)]
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl Finding {
    pub fn is_fixable(&self) -> bool {
        !self.fixes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_info_below_warning_below_error() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn severity_round_trips_through_strings() {
        use std::str::FromStr;
        assert_eq!("warning", Severity::Warning.to_string());
        assert_eq!(Ok(Severity::Error), Severity::from_str("error"));
        assert_eq!(Ok(Severity::Info), Severity::from_str("INFO"));
    }

    #[tokio::test]
    async fn manual_fix_refuses_to_apply() {
        let fix = Fix::manual("pin the tag", "Replace `latest` with a version.");
        assert!(matches!(fix.apply().await, Err(FixError::NotAutomatic)));
    }

    #[tokio::test]
    async fn auto_fix_delegates_to_its_action() {
        let mut action = MockFixAction::new();
        action.expect_apply().times(1).returning(|| Ok(()));

        let fix = Fix::auto("write .dockerignore", Arc::new(action));
        assert_eq!(FixKind::Auto, fix.kind);
        assert!(fix.apply().await.is_ok());
    }

    #[test]
    fn builder_defaults_optional_fields() {
        let finding = FindingBuilder::default()
            .check("dockerfile.latest_tag")
            .title("Unpinned base image")
            .severity(Severity::Warning)
            .category(CheckCategory::Dockerfile)
            .message("FROM uses :latest")
            .build()
            .unwrap();

        assert!(finding.location.is_none());
        assert!(!finding.is_fixable());
        assert!(finding.details.is_null());
    }
}
