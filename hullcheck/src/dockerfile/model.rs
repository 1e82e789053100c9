use std::path::PathBuf;

/// One logical Dockerfile directive, with continuation lines joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Directive name, normalized to uppercase (FROM, RUN, ARG, ...).
    pub name: String,
    /// Verbatim trailing text. Sub-grammars (flags, exec form) are the
    /// business of individual checks, not the parser.
    pub args: String,
    /// Original text, including joined continuation lines.
    pub raw: String,
    /// First physical line of the instruction, 1-based.
    pub lineno: usize,
}

impl Instruction {
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

/// A contiguous run of instructions starting at a top-level `FROM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub index: usize,
    pub instructions: Vec<Instruction>,
}

impl Stage {
    /// The stage's leading `FROM` instruction.
    pub fn base_image(&self) -> Option<&Instruction> {
        self.instructions.first().filter(|i| i.is("FROM"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerfileModel {
    pub path: PathBuf,
    /// Instructions preceding the first `FROM` (global ARGs, comments aside).
    /// They belong to no numbered stage.
    pub pre_stage: Vec<Instruction>,
    pub stages: Vec<Stage>,
}

impl DockerfileModel {
    /// Every instruction in document order: pre-stage bucket first, then each
    /// stage's instructions. Each instruction lives in exactly one bucket, so
    /// the flattened length equals the sum of the parts.
    pub fn all_instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.pre_stage
            .iter()
            .chain(self.stages.iter().flat_map(|s| s.instructions.iter()))
    }

    pub fn final_stage(&self) -> Option<&Stage> {
        self.stages.last()
    }
}
