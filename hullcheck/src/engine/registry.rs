use super::check::Check;
use super::finding::CheckCategory;
use educe::Educe;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Check `{id}` is already registered.")]
    DuplicateCheckId { id: String },
}

/// Ordered collection of checks. Registration order is load-bearing: it is
/// the canonical order of a report's findings, so output stays comparable
/// across runs. The registry is an explicit value built once at a
/// composition root and passed by reference into the runner; there is no
/// process-wide mutable state.
#[derive(Educe, Default)]
#[educe(Debug)]
pub struct CheckRegistry {
    #[educe(Debug(ignore))]
    checks: Vec<Arc<dyn Check>>,
    ids: HashSet<&'static str>,
}

#[derive(Debug, Default, Clone)]
pub struct SelectFilter {
    /// When set, only checks in these categories are selected.
    pub categories: Option<BTreeSet<CheckCategory>>,
    /// Whether Docker-requiring checks may be selected.
    pub docker_available: bool,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-registering an id is a programming error in the composition root,
    /// rejected so it cannot silently shadow an existing check.
    pub fn register(&mut self, check: Arc<dyn Check>) -> Result<(), RegistryError> {
        if !self.ids.insert(check.id()) {
            return Err(RegistryError::DuplicateCheckId {
                id: check.id().to_string(),
            });
        }
        self.checks.push(check);
        Ok(())
    }

    /// Checks matching the filter, in registration order.
    pub fn select(&self, filter: &SelectFilter) -> Vec<Arc<dyn Check>> {
        self.checks
            .iter()
            .filter(|check| match &filter.categories {
                Some(categories) => categories.contains(&check.category()),
                None => true,
            })
            .filter(|check| !check.requires_docker() || filter.docker_available)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
