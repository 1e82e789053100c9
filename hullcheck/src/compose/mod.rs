mod model;
mod parser;

pub use parser::parse;

pub mod prelude {
    pub use super::model::{ComposeModel, ComposeService};
    pub use super::parser::ComposeParseError;
}
