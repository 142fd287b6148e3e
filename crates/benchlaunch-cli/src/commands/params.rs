use anyhow::{bail, Context, Result};
use benchlaunch::{EntryPoint, RunManifest};
use console::style;
use std::path::PathBuf;

use crate::settings::Settings;

fn format_entry_point(entry: &EntryPoint) -> String {
    let mut out = format!("{} {}\n", style("Entry point:").green().bold(), style(&entry.name).green());
    out.push_str(&format!("{} {}\n", style("Command:").dim(), entry.command));
    if entry.parameters.is_empty() {
        out.push_str(&format!("{}\n", style("No parameters").dim()));
        return out;
    }

    let width = entry
        .parameters
        .iter()
        .map(|p| p.name.len())
        .max()
        .unwrap_or(0);
    out.push_str(&format!("{}\n", style("Parameters:").dim()));
    for param in &entry.parameters {
        let default = match &param.default {
            Some(value) => format!("default: {}", value),
            None => style("required").yellow().to_string(),
        };
        out.push_str(&format!(
            "  {:<width$}  {:<6}  {}\n",
            param.name,
            param.param_type.to_string(),
            default,
            width = width
        ));
    }
    out
}

/// Render the selected entry points in the requested format
pub fn format_entry_points(entries: &[&EntryPoint], format: &str) -> Result<String> {
    match format {
        "json" => Ok(serde_json::to_string_pretty(entries)?),
        "text" => Ok(entries
            .iter()
            .map(|entry| format_entry_point(entry))
            .collect::<Vec<_>>()
            .join("\n")),
        other => bail!("Unsupported output format '{}' (expected text or json)", other),
    }
}

pub fn handle_params(
    settings: &Settings,
    manifest: Option<PathBuf>,
    entry_point: Option<String>,
    format: &str,
) -> Result<()> {
    let manifest_path = manifest.unwrap_or_else(|| settings.manifest.clone());
    let manifest = RunManifest::load(&manifest_path).with_context(|| {
        format!("Failed to load run manifest {}", manifest_path.display())
    })?;

    let entries: Vec<&EntryPoint> = match entry_point {
        Some(name) => vec![manifest.entry_point(&name)?],
        None => manifest.entry_points.iter().collect(),
    };
    print!("{}", format_entry_points(&entries, format)?);
    if format == "json" {
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> RunManifest {
        RunManifest::from_yaml(
            r#"
entry_points:
  main:
    parameters:
      batch_size: {type: int, default: 36}
      jobid: string
    command: "python benchmark.py -b {batch_size} --jobid {jobid}"
  describe:
    command: "python benchmark.py --describe"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_text_listing() {
        console::set_colors_enabled(false);
        let manifest = manifest();
        let entries: Vec<&EntryPoint> = manifest.entry_points.iter().collect();
        let text = format_entry_points(&entries, "text").unwrap();
        assert!(text.contains("Entry point: main"));
        assert!(text.contains("  batch_size  int     default: 36"));
        assert!(text.contains("  jobid       string  required"));
        assert!(text.contains("Entry point: describe"));
        assert!(text.contains("No parameters"));
    }

    #[test]
    fn test_json_listing() {
        let manifest = manifest();
        let entries = vec![manifest.entry_point("main").unwrap()];
        let json = format_entry_points(&entries, "json").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["name"], "main");
        assert_eq!(value[0]["parameters"][0]["type"], "int");
        assert_eq!(value[0]["parameters"][0]["default"], 36);
        assert!(value[0]["parameters"][1].get("default").is_none());
    }

    #[test]
    fn test_unknown_format() {
        let manifest = manifest();
        let entries: Vec<&EntryPoint> = manifest.entry_points.iter().collect();
        let err = format_entry_points(&entries, "yaml").unwrap_err();
        assert!(err.to_string().contains("Unsupported output format 'yaml'"));
    }
}
