//! Loader for the benchmark configuration document.
//!
//! The document is kept as an opaque nested mapping: sections are handed to the external
//! training program as-is and are not interpreted here.

use crate::errors::{util::read_document, LaunchError, LaunchResult};
use serde_yaml::{Mapping, Value};
use std::path::Path;

/// Top-level sections documented for the benchmark configuration
pub const KNOWN_SECTIONS: &[&str] = &[
    "training",
    "loader",
    "loader_validation",
    "models",
    "output",
    "loss",
    "evaluators",
    "tensorflow",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchmarkConfig {
    root: Mapping,
}

impl BenchmarkConfig {
    /// Parse a configuration document. Only well-formedness is checked.
    pub fn from_yaml(content: &str) -> LaunchResult<Self> {
        let value: Value = serde_yaml::from_str(content)?;
        let root = match value {
            Value::Null => Mapping::new(),
            Value::Mapping(mapping) => mapping,
            other => {
                return Err(LaunchError::ParseError(format!(
                    "expected a mapping of sections at the top level, got {}",
                    describe_kind(&other)
                )))
            }
        };

        let config = BenchmarkConfig { root };
        for name in config.section_names() {
            if !KNOWN_SECTIONS.contains(&name) {
                tracing::debug!(section = %name, "keeping undocumented section");
            }
        }
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> LaunchResult<Self> {
        let content = read_document(&path)?;
        let config = Self::from_yaml(&content)?;
        tracing::debug!(
            path = %path.as_ref().display(),
            sections = config.root.len(),
            "loaded benchmark configuration"
        );
        Ok(config)
    }

    pub fn section(&self, name: &str) -> Option<&Value> {
        self.root.get(name)
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.root.contains_key(name)
    }

    /// Sections in document order. Non-string keys are skipped.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.root
            .iter()
            .filter_map(|(key, value)| key.as_str().map(|k| (k, value)))
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections().map(|(name, _)| name).collect()
    }

    /// Documented sections absent from this document
    pub fn missing_sections(&self) -> Vec<&'static str> {
        KNOWN_SECTIONS
            .iter()
            .copied()
            .filter(|name| !self.has_section(name))
            .collect()
    }

    /// Look up a nested value by dotted path, e.g. `loader.patch_size` or `models.0.type`
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.root.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Mapping(mapping) => mapping.get(segment)?,
                Value::Sequence(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.root
    }

    pub fn into_mapping(self) -> Mapping {
        self.root
    }
}

/// Short name of a YAML value's kind, used in messages
pub fn describe_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
