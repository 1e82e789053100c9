use std::collections::BTreeMap;
use std::path::PathBuf;

/// One service entry from a Compose document.
///
/// `networks` and `depends_on` may appear in the source as either a list or a
/// keyed mapping; the parser normalizes both into an ordered list of unique
/// names, `None` when the field is absent. Consumers never branch on the
/// source shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeService {
    pub name: String,
    pub image: Option<String>,
    pub has_build: bool,
    pub volumes: Vec<String>,
    pub ports: Vec<String>,
    pub networks: Option<Vec<String>>,
    pub depends_on: Option<Vec<String>>,
    pub has_healthcheck: bool,
    /// Fields the model does not recognize, passed through for checks.
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComposeModel {
    pub path: PathBuf,
    /// Services in document order. Names are unique within one document.
    pub services: Vec<ComposeService>,
}

impl ComposeModel {
    pub fn service(&self, name: &str) -> Option<&ComposeService> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name.as_str()).collect()
    }
}
