use crate::errors::{util::read_document, LaunchError, LaunchResult};
use crate::params::{self, Parameter, ParameterType, ParameterValue, ResolvedParameters};
use crate::render::{self, Quoting};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::Path;

pub const DEFAULT_ENTRY_POINT: &str = "main";

/// A named, parameterized command template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryPoint {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub command: String,
}

/// The run manifest: a set of entry points for invoking the external program
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunManifest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub entry_points: Vec<EntryPoint>,
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    entry_points: Mapping,
}

#[derive(Deserialize)]
struct RawEntryPoint {
    #[serde(default)]
    parameters: Mapping,
    command: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawParameterSpec {
    #[serde(rename = "type", default = "default_parameter_type")]
    param_type: ParameterType,
    #[serde(default)]
    default: Value,
}

fn default_parameter_type() -> ParameterType {
    ParameterType::String
}

fn key_as_string(key: &Value, what: &str) -> LaunchResult<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(LaunchError::ParseError(format!(
            "{} name must be a string, got {:?}",
            what, other
        ))),
    }
}

/// Convert a default declared in the manifest to a value of the declared type
fn default_value(name: &str, ty: ParameterType, value: &Value) -> LaunchResult<Option<ParameterValue>> {
    let invalid = || {
        LaunchError::ParseError(format!(
            "default for parameter '{}' is not a valid {}: {:?}",
            name, ty, value
        ))
    };
    let converted = match (ty, value) {
        (_, Value::Null) => return Ok(None),
        (ParameterType::String, Value::String(s)) => ParameterValue::String(s.clone()),
        (ParameterType::String, Value::Number(n)) => ParameterValue::String(n.to_string()),
        (ParameterType::String, Value::Bool(b)) => ParameterValue::String(b.to_string()),
        (ParameterType::Int, Value::Number(n)) => ParameterValue::Int(n.as_i64().ok_or_else(invalid)?),
        (ParameterType::Float, Value::Number(n)) => match n.as_f64() {
            Some(v) if v.is_finite() => ParameterValue::Float(v),
            _ => return Err(invalid()),
        },
        (ParameterType::Int | ParameterType::Float, Value::String(s)) => {
            ty.coerce(name, s).map_err(|_| invalid())?
        }
        _ => return Err(invalid()),
    };
    Ok(Some(converted))
}

fn parse_parameter(name: String, spec: &Value) -> LaunchResult<Parameter> {
    let (param_type, default) = match spec {
        Value::String(_) => (serde_yaml::from_value(spec.clone())?, Value::Null),
        Value::Mapping(_) => {
            let raw: RawParameterSpec = serde_yaml::from_value(spec.clone())?;
            (raw.param_type, raw.default)
        }
        other => {
            return Err(LaunchError::ParseError(format!(
                "parameter '{}' must be a type name or a mapping, got {:?}",
                name, other
            )))
        }
    };
    let default = default_value(&name, param_type, &default)?;
    Ok(Parameter {
        name,
        param_type,
        default,
    })
}

impl EntryPoint {
    fn from_raw(name: String, raw: RawEntryPoint) -> LaunchResult<Self> {
        let parameters = raw
            .parameters
            .iter()
            .map(|(key, spec)| parse_parameter(key_as_string(key, "parameter")?, spec))
            .collect::<LaunchResult<Vec<_>>>()?;
        let entry_point = EntryPoint {
            name,
            parameters,
            command: raw.command,
        };
        entry_point.validate()?;
        Ok(entry_point)
    }

    /// Check the command template against the declared parameters.
    ///
    /// Placeholders without a declaration are an error; declarations the template never
    /// uses are only logged.
    pub fn validate(&self) -> LaunchResult<()> {
        let referenced = render::placeholders(&self.command);
        if let Some(missing) = referenced
            .iter()
            .find(|name| self.parameter(name).is_none())
        {
            return Err(LaunchError::UnresolvedPlaceholder(missing.clone()));
        }
        for param in &self.parameters {
            if !referenced.contains(&param.name) {
                tracing::warn!(
                    entry_point = %self.name,
                    parameter = %param.name,
                    "parameter is declared but never used by the command"
                );
            }
        }
        Ok(())
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Resolve operator overrides against this entry point's parameters
    pub fn resolve(&self, overrides: &[(String, String)]) -> LaunchResult<ResolvedParameters> {
        params::resolve(&self.parameters, overrides)
    }

    /// Render this entry point's command with already-resolved parameters
    pub fn render(&self, resolved: &ResolvedParameters, quoting: Quoting) -> LaunchResult<String> {
        render::render_command(&self.command, resolved, quoting)
    }
}

impl RunManifest {
    /// Parse a manifest from YAML text
    pub fn from_yaml(content: &str) -> LaunchResult<Self> {
        let raw: RawManifest = serde_yaml::from_str(content)?;
        let entry_points = raw
            .entry_points
            .into_iter()
            .map(|(key, value)| {
                let name = key_as_string(&key, "entry point")?;
                let raw_entry: RawEntryPoint = serde_yaml::from_value(value).map_err(|e| {
                    LaunchError::ParseError(format!("entry point '{}': {}", name, e))
                })?;
                EntryPoint::from_raw(name, raw_entry)
            })
            .collect::<LaunchResult<Vec<_>>>()?;

        if entry_points.is_empty() {
            return Err(LaunchError::ParseError(
                "manifest declares no entry points".to_string(),
            ));
        }
        Ok(RunManifest {
            name: raw.name,
            entry_points,
        })
    }

    /// Load and validate a manifest from disk
    pub fn load<P: AsRef<Path>>(path: P) -> LaunchResult<Self> {
        let content = read_document(&path)?;
        let manifest = Self::from_yaml(&content)?;
        tracing::debug!(
            path = %path.as_ref().display(),
            entry_points = manifest.entry_points.len(),
            "loaded run manifest"
        );
        Ok(manifest)
    }

    pub fn entry_point(&self, name: &str) -> LaunchResult<&EntryPoint> {
        self.entry_points
            .iter()
            .find(|ep| ep.name == name)
            .ok_or_else(|| LaunchError::UnknownEntryPoint(name.to_string()))
    }

    pub fn entry_point_names(&self) -> Vec<&str> {
        self.entry_points.iter().map(|ep| ep.name.as_str()).collect()
    }
}
