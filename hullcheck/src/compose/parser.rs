use super::model::{ComposeModel, ComposeService};
use itertools::Itertools;
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposeParseError {
    #[error("Unable to parse compose document. {error}")]
    InvalidDocument {
        #[from]
        error: serde_yaml::Error,
    },
    #[error("Compose document root must be a mapping.")]
    RootNotMapping,
    #[error("Service `{name}` must be a mapping.")]
    ServiceNotMapping { name: String },
    #[error("Service names must be strings.")]
    ServiceNameNotString,
}

/// Fields of a service the model recognizes; everything else flows into
/// `extra` untouched.
#[derive(Deserialize, Default)]
#[serde(default)]
struct RawService {
    image: Option<String>,
    build: Option<Value>,
    volumes: Vec<Value>,
    ports: Vec<Value>,
    networks: Option<ListOrMap>,
    depends_on: Option<ListOrMap>,
    healthcheck: Option<Value>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

/// The compose format allows a list (`- web`) or a keyed mapping
/// (`web: {condition: ...}`) in a few places. Both collapse to the names.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrMap {
    List(Vec<String>),
    Map(serde_yaml::Mapping),
}

impl ListOrMap {
    fn into_names(self) -> Vec<String> {
        match self {
            ListOrMap::List(items) => items.into_iter().unique().collect(),
            ListOrMap::Map(mapping) => mapping
                .keys()
                .filter_map(|k| k.as_str().map(|s| s.to_string()))
                .unique()
                .collect(),
        }
    }
}

/// Parse a Compose document. Unlike the Dockerfile parser this fails on a
/// structurally invalid document: partial recovery of a keyed document is
/// not reliable, so compose-dependent checks see all of it or none of it.
pub fn parse(path: &Path, text: &str) -> Result<ComposeModel, ComposeParseError> {
    let root: Value = serde_yaml::from_str(text)?;

    let root = match root {
        Value::Mapping(mapping) => mapping,
        Value::Null => {
            return Ok(ComposeModel {
                path: path.to_path_buf(),
                services: Vec::new(),
            });
        }
        _ => return Err(ComposeParseError::RootNotMapping),
    };

    let mut services = Vec::new();
    if let Some(Value::Mapping(raw_services)) = root.get("services") {
        for (key, value) in raw_services {
            let name = key
                .as_str()
                .ok_or(ComposeParseError::ServiceNameNotString)?
                .to_string();
            if !value.is_mapping() {
                return Err(ComposeParseError::ServiceNotMapping { name });
            }
            let raw: RawService = serde_yaml::from_value(value.clone())?;
            services.push(project_service(name, raw));
        }
    }

    Ok(ComposeModel {
        path: path.to_path_buf(),
        services,
    })
}

fn project_service(name: String, raw: RawService) -> ComposeService {
    ComposeService {
        name,
        image: raw.image,
        has_build: raw.build.is_some(),
        volumes: raw.volumes.iter().filter_map(render_mount).collect(),
        ports: raw.ports.iter().filter_map(render_port).collect(),
        networks: raw.networks.map(ListOrMap::into_names),
        depends_on: raw.depends_on.map(ListOrMap::into_names),
        has_healthcheck: raw.healthcheck.is_some(),
        extra: raw.extra,
    }
}

fn render_port(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        // long syntax: {published: 8080, target: 80, ...}
        Value::Mapping(mapping) => {
            let published = mapping.get("published").map(scalar_to_string);
            let target = mapping.get("target").map(scalar_to_string);
            match (published, target) {
                (Some(published), Some(target)) => Some(format!("{}:{}", published, target)),
                (None, Some(target)) => Some(target),
                _ => None,
            }
        }
        _ => None,
    }
}

fn render_mount(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        // long syntax: {type: bind, source: ./x, target: /x}
        Value::Mapping(mapping) => {
            let source = mapping.get("source").map(scalar_to_string);
            let target = mapping.get("target").map(scalar_to_string)?;
            match source {
                Some(source) => Some(format!("{}:{}", source, target)),
                None => Some(target),
            }
        }
        _ => None,
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
