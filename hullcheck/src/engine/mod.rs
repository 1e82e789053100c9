mod check;
mod context;
mod finding;
mod registry;
mod report;
mod runner;

pub mod prelude {
    pub use super::check::{Check, MockCheck};
    pub use super::context::{Context, ContextBuilder, ContextError};
    pub use super::finding::{
        CheckCategory, Finding, FindingBuilder, Fix, FixAction, FixError, FixKind, Location,
        MockFixAction, Severity,
    };
    pub use super::registry::{CheckRegistry, RegistryError, SelectFilter};
    pub use super::report::{Report, ReportSummary};
    pub use super::runner::{RunOptions, Runner};
}
