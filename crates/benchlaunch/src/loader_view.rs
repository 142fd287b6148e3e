//! Typed, read-only view of a `loader` / `loader_validation` section.
//!
//! Only used for operator inspection; the training program reads the section itself.

use crate::bench_config::BenchmarkConfig;
use crate::errors::{LaunchError, LaunchResult};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::path::PathBuf;

/// A generated predictor appended to the loaded ones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraFeature {
    #[serde(rename = "type")]
    pub feature_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ExtraFeature {
    /// The feature's name, falling back to its type
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.feature_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderOptions {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub loader_type: Option<String>,
    pub filenames: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_range")]
    pub limit_leadtimes: Option<Vec<usize>>,
    #[serde(default)]
    pub limit_predictors: Option<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_range")]
    pub x_range: Option<Vec<usize>>,
    #[serde(default, deserialize_with = "deserialize_range")]
    pub y_range: Option<Vec<usize>>,
    #[serde(default)]
    pub probabilistic_target: bool,
    #[serde(default)]
    pub normalization: Option<PathBuf>,
    #[serde(default)]
    pub patch_size: Option<usize>,
    #[serde(default)]
    pub predict_diff: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub prefetch: Option<usize>,
    #[serde(default)]
    pub cache: bool,
    #[serde(default)]
    pub num_parallel_calls: Option<i64>,
    #[serde(default)]
    pub extra_features: Vec<ExtraFeature>,
    #[serde(default = "default_true")]
    pub quick_metadata: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub fake: bool,
    #[serde(default = "default_true")]
    pub to_gpu: bool,
}

fn default_batch_size() -> usize {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RangeSpec {
    Indices(Vec<usize>),
    Text(String),
}

/// Longest index list a range string may expand to
pub const MAX_RANGE_LEN: usize = 1 << 20;

/// Parse a half-open `start:end` range string into its indices
pub fn parse_range(text: &str) -> Result<Vec<usize>, String> {
    let (start, end) = text.split_once(':').ok_or_else(|| {
        format!(
            "Cannot interpret range string {}. Should be in the form start:end",
            text
        )
    })?;
    let bound = |s: &str| {
        s.trim()
            .parse::<usize>()
            .map_err(|_| format!("Invalid bound '{}' in range string {}", s, text))
    };
    let (start, end) = (bound(start)?, bound(end)?);
    let len = end.saturating_sub(start);
    if len > MAX_RANGE_LEN {
        return Err(format!(
            "Range string {} spans {} indices, more than the limit of {}",
            text, len, MAX_RANGE_LEN
        ));
    }
    Ok((start..end).collect())
}

fn deserialize_range<'de, D>(deserializer: D) -> Result<Option<Vec<usize>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RangeSpec>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RangeSpec::Indices(indices)) => Ok(Some(indices)),
        Some(RangeSpec::Text(text)) => parse_range(&text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl LoaderOptions {
    pub fn from_section(section: &Value) -> LaunchResult<Self> {
        Ok(serde_yaml::from_value(section.clone())?)
    }

    /// Typed view of the named section, or `None` when the document has no such section
    pub fn from_config(config: &BenchmarkConfig, section: &str) -> LaunchResult<Option<Self>> {
        config
            .section(section)
            .map(|value| {
                serde_yaml::from_value(value.clone()).map_err(|e| {
                    LaunchError::ParseError(format!("section '{}': {}", section, e))
                })
            })
            .transpose()
    }

    /// Names of the generated predictors, in declaration order
    pub fn feature_names(&self) -> Vec<&str> {
        self.extra_features
            .iter()
            .map(ExtraFeature::display_name)
            .collect()
    }

    /// Expand every filename pattern, in order. Patterns matching nothing contribute nothing.
    pub fn expand_filenames(&self) -> LaunchResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for pattern in &self.filenames {
            let matches = glob::glob(pattern).map_err(|e| {
                LaunchError::ParseError(format!("invalid filename pattern '{}': {}", pattern, e))
            })?;
            let before = files.len();
            for entry in matches {
                match entry {
                    Ok(path) => files.push(path),
                    Err(e) => tracing::warn!(pattern = %pattern, error = %e, "skipping unreadable path"),
                }
            }
            tracing::debug!(pattern = %pattern, matched = files.len() - before, "expanded filename pattern");
        }
        Ok(files)
    }
}
