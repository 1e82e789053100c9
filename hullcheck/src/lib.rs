pub mod checks;
pub mod compose;
pub mod dockerfile;
pub mod engine;
pub mod shared;

pub mod prelude {
    pub use crate::checks::builtin_registry;
    pub use crate::compose::prelude::*;
    pub use crate::dockerfile::prelude::*;
    pub use crate::engine::prelude::*;
    pub use crate::shared::prelude::*;
}
