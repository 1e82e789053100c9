use super::context::Context;
use super::finding::{CheckCategory, Finding};
use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

/// An independent diagnostic rule unit.
///
/// A check reads the shared [`Context`] and returns findings. Returning an
/// empty list because a required input (say, a parsed Dockerfile) is absent
/// is the check's own concern; the runner does not second-guess it. A check
/// must not mutate shared state or observe another check's state.
#[automock]
#[async_trait]
pub trait Check: Send + Sync {
    /// Stable dotted id, `category.name`.
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn category(&self) -> CheckCategory;
    /// Checks that query the live Docker runtime are skipped when the
    /// daemon is unreachable.
    fn requires_docker(&self) -> bool {
        false
    }
    async fn run(&self, ctx: &Context) -> Result<Vec<Finding>>;
}
