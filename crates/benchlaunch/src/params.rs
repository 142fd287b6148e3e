use crate::errors::{LaunchError, LaunchResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Declared type of an entry point parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    #[serde(alias = "integer")]
    Int,
    Float,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterType::String => write!(f, "string"),
            ParameterType::Int => write!(f, "int"),
            ParameterType::Float => write!(f, "float"),
        }
    }
}

impl ParameterType {
    /// Coerce raw operator text into a value of this type
    pub fn coerce(&self, name: &str, raw: &str) -> LaunchResult<ParameterValue> {
        let mismatch = || LaunchError::TypeMismatch {
            name: name.to_string(),
            expected: self.to_string(),
            value: raw.to_string(),
        };
        match self {
            ParameterType::String => Ok(ParameterValue::String(raw.to_string())),
            ParameterType::Int => raw
                .trim()
                .parse::<i64>()
                .map(ParameterValue::Int)
                .map_err(|_| mismatch()),
            ParameterType::Float => match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(ParameterValue::Float(v)),
                _ => Err(mismatch()),
            },
        }
    }
}

/// A typed parameter value, rendered into command templates via `Display`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParameterValue {
    String(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::String(s) => write!(f, "{}", s),
            ParameterValue::Int(i) => write!(f, "{}", i),
            ParameterValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// A parameter declared by an entry point. No default means the parameter is required.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<ParameterValue>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            default: None,
        }
    }

    pub fn with_default(mut self, default: ParameterValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Final name-to-value bindings for a single run, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResolvedParameters {
    values: Vec<(String, ParameterValue)>,
}

impl ResolvedParameters {
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn insert(&mut self, name: String, value: ParameterValue) {
        match self.values.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.values.push((name, value)),
        }
    }
}

impl FromIterator<(String, ParameterValue)> for ResolvedParameters {
    fn from_iter<I: IntoIterator<Item = (String, ParameterValue)>>(iter: I) -> Self {
        let mut resolved = ResolvedParameters::default();
        for (name, value) in iter {
            resolved.insert(name, value);
        }
        resolved
    }
}

/// Split an operator override of the form `key=value` on the first '='
pub fn parse_override(raw: &str) -> LaunchResult<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(LaunchError::InvalidOverride(raw.to_string())),
    }
}

/// Resolve declared parameters against operator overrides.
///
/// Each declared parameter takes the override value when one is given, else its default.
/// When the same key is overridden more than once, the last value wins.
///
/// # Errors
///
/// - `UnknownParameter` if an override names a parameter that is not declared
/// - `TypeMismatch` if an override cannot be coerced to the declared type
/// - `MissingParameter` if a parameter has neither an override nor a default
pub fn resolve(
    declared: &[Parameter],
    overrides: &[(String, String)],
) -> LaunchResult<ResolvedParameters> {
    let declared_names: HashSet<&str> = declared.iter().map(|p| p.name.as_str()).collect();
    if let Some((key, _)) = overrides
        .iter()
        .find(|(key, _)| !declared_names.contains(key.as_str()))
    {
        return Err(LaunchError::UnknownParameter(key.clone()));
    }

    let mut resolved = ResolvedParameters::default();
    for param in declared {
        let raw_override = overrides
            .iter()
            .rev()
            .find(|(key, _)| *key == param.name)
            .map(|(_, value)| value);

        let value = match (raw_override, &param.default) {
            (Some(raw), _) => param.param_type.coerce(&param.name, raw)?,
            (None, Some(default)) => default.clone(),
            (None, None) => return Err(LaunchError::MissingParameter(param.name.clone())),
        };
        tracing::debug!(parameter = %param.name, value = %value, overridden = raw_override.is_some(), "resolved parameter");
        resolved.insert(param.name.clone(), value);
    }
    Ok(resolved)
}
