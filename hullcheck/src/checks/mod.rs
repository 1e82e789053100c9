//! Built-in checks, grouped by category. [`builtin_registry`] is the
//! canonical ordering: reports list findings in the order checks appear
//! here.

mod compose;
mod dockerfile;
mod project;
mod runtime;

use crate::engine::prelude::{CheckRegistry, RegistryError};
use std::sync::Arc;

pub fn builtin_registry() -> Result<CheckRegistry, RegistryError> {
    let mut registry = CheckRegistry::new();

    registry.register(Arc::new(dockerfile::LatestTag))?;
    registry.register(Arc::new(dockerfile::PlatformFlag))?;
    registry.register(Arc::new(dockerfile::RootUser))?;
    registry.register(Arc::new(dockerfile::AptCache))?;
    registry.register(Arc::new(dockerfile::AddOverCopy))?;

    registry.register(Arc::new(compose::MissingDependency))?;
    registry.register(Arc::new(compose::NoHealthcheck))?;
    registry.register(Arc::new(compose::DuplicateHostPort))?;

    registry.register(Arc::new(project::Dockerignore))?;
    registry.register(Arc::new(project::LineEndings))?;

    registry.register(Arc::new(runtime::DanglingImages))?;
    registry.register(Arc::new(runtime::StoppedContainers))?;
    registry.register(Arc::new(runtime::BuildCache))?;

    Ok(registry)
}

pub mod prelude {
    pub use super::builtin_registry;
}
