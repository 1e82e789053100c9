mod model;
mod parser;

pub use parser::parse;

pub mod prelude {
    pub use super::model::{DockerfileModel, Instruction, Stage};
}
