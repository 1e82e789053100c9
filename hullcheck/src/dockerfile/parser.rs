use super::model::{DockerfileModel, Instruction, Stage};
use std::path::Path;

/// Parse Dockerfile text into a model. This never fails: malformed input,
/// a missing `FROM`, or an empty file all produce a valid (possibly
/// zero-stage) model. Deep validation belongs to the checks.
pub fn parse(path: &Path, text: &str) -> DockerfileModel {
    let mut pre_stage = Vec::new();
    let mut stages: Vec<Stage> = Vec::new();

    for instruction in logical_lines(text).into_iter().map(to_instruction) {
        if instruction.is("FROM") {
            stages.push(Stage {
                index: stages.len(),
                instructions: vec![instruction],
            });
        } else {
            match stages.last_mut() {
                Some(stage) => stage.instructions.push(instruction),
                None => pre_stage.push(instruction),
            }
        }
    }

    DockerfileModel {
        path: path.to_path_buf(),
        pre_stage,
        stages,
    }
}

struct LogicalLine {
    lineno: usize,
    raw: String,
}

/// Join physical lines into logical ones: comment lines are dropped, a line
/// ending in an unescaped `\` continues on the next physical line.
fn logical_lines(text: &str) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut current: Option<LogicalLine> = None;

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();

        if trimmed.starts_with('#') {
            continue;
        }
        if trimmed.is_empty() && current.is_none() {
            continue;
        }

        match current.as_mut() {
            None => {
                let open = has_open_continuation(trimmed);
                let logical = LogicalLine {
                    lineno: idx + 1,
                    raw: line.to_string(),
                };
                if open {
                    current = Some(logical);
                } else {
                    lines.push(logical);
                }
            }
            Some(logical) => {
                logical.raw.push('\n');
                logical.raw.push_str(line);
                if !trimmed.is_empty() && !has_open_continuation(trimmed) {
                    lines.push(current.take().unwrap());
                }
            }
        }
    }

    // trailing continuation with no next line still counts
    if let Some(logical) = current.take() {
        lines.push(logical);
    }

    lines
}

fn has_open_continuation(trimmed: &str) -> bool {
    let trailing_backslashes = trimmed.chars().rev().take_while(|c| *c == '\\').count();
    trailing_backslashes % 2 == 1
}

fn to_instruction(line: LogicalLine) -> Instruction {
    let flat = flatten(&line.raw);
    let trimmed = flat.trim();

    let (name, args) = match trimmed.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (trimmed, ""),
    };

    Instruction {
        name: name.to_uppercase(),
        args: args.to_string(),
        raw: line.raw,
        lineno: line.lineno,
    }
}

/// Collapse a joined logical line into a single line by replacing each
/// continuation marker and line break with one space.
fn flatten(raw: &str) -> String {
    raw.lines()
        .map(|line| {
            let trimmed = line.trim();
            if has_open_continuation(trimmed) {
                trimmed[..trimmed.len() - 1].trim_end()
            } else {
                trimmed
            }
        })
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse_text(text: &str) -> DockerfileModel {
        parse(&PathBuf::from("Dockerfile"), text)
    }

    #[test]
    fn empty_input_yields_zero_stage_model() {
        let model = parse_text("");
        assert!(model.stages.is_empty());
        assert!(model.pre_stage.is_empty());
        assert_eq!(0, model.all_instructions().count());
    }

    #[test]
    fn malformed_input_still_parses() {
        let model = parse_text("!!! not a dockerfile\n\x07garbage");
        assert_eq!(2, model.pre_stage.len());
        assert!(model.stages.is_empty());
    }

    #[test]
    fn comments_and_blank_lines_are_dropped() {
        let model = parse_text("# syntax=docker/dockerfile:1\n\nFROM alpine:3.20\n# comment\nRUN true\n");
        assert_eq!(1, model.stages.len());
        assert_eq!(2, model.stages[0].instructions.len());
    }

    #[test]
    fn name_is_uppercased_and_args_kept_verbatim() {
        let model = parse_text("from alpine:3.20 AS build\nrun echo 'Hello  World'\n");
        let instructions: Vec<_> = model.all_instructions().collect();
        assert_eq!("FROM", instructions[0].name);
        assert_eq!("alpine:3.20 AS build", instructions[0].args);
        assert_eq!("RUN", instructions[1].name);
        assert_eq!("echo 'Hello  World'", instructions[1].args);
    }

    #[test]
    fn continuation_collapses_to_one_instruction_with_first_lineno() {
        let text = "FROM debian:12\nRUN apt-get update && \\\n    apt-get install -y curl \\\n    jq\n";
        let model = parse_text(text);

        let run = &model.stages[0].instructions[1];
        assert_eq!("RUN", run.name);
        assert_eq!(2, run.lineno);
        assert_eq!("apt-get update && apt-get install -y curl jq", run.args);
        assert!(run.raw.contains('\\'));
    }

    #[test]
    fn escaped_backslash_does_not_continue() {
        let model = parse_text("RUN echo foo\\\\\nRUN echo bar\n");
        assert_eq!(2, model.pre_stage.len());
    }

    #[test]
    fn two_from_lines_yield_two_stages() {
        let text = "FROM rust:1.82 AS build\nRUN cargo build --release\nFROM debian:12\nCOPY --from=build /app /app\n";
        let model = parse_text(text);

        assert_eq!(2, model.stages.len());
        assert_eq!(
            vec!["FROM", "RUN"],
            model.stages[0]
                .instructions
                .iter()
                .map(|i| i.name.as_str())
                .collect::<Vec<_>>()
        );
        assert_eq!(
            vec!["FROM", "COPY"],
            model.stages[1]
                .instructions
                .iter()
                .map(|i| i.name.as_str())
                .collect::<Vec<_>>()
        );
        assert_eq!("rust:1.82 AS build", model.stages[0].base_image().unwrap().args);
    }

    #[test]
    fn pre_from_instructions_live_in_the_sentinel_bucket() {
        let model = parse_text("ARG BASE=alpine:3.20\nFROM ${BASE}\nRUN true\n");

        assert_eq!(1, model.pre_stage.len());
        assert_eq!("ARG", model.pre_stage[0].name);
        assert_eq!(1, model.stages.len());
        assert_eq!(2, model.stages[0].instructions.len());
    }

    #[test]
    fn all_instructions_equals_sum_of_buckets() {
        let text = "ARG VERSION=1\nFROM a AS build\nRUN one\nFROM b\nRUN two\nCMD [\"x\"]\n";
        let model = parse_text(text);

        let bucket_total: usize = model.pre_stage.len()
            + model
                .stages
                .iter()
                .map(|s| s.instructions.len())
                .sum::<usize>();
        assert_eq!(bucket_total, model.all_instructions().count());
        assert_eq!(6, bucket_total);
    }

    #[test]
    fn trailing_open_continuation_is_kept() {
        let model = parse_text("RUN echo unfinished \\");
        assert_eq!(1, model.pre_stage.len());
        assert_eq!("echo unfinished", model.pre_stage[0].args);
    }
}
