use anyhow::{anyhow, Context, Result};
use benchlaunch::bench_config::{describe_kind, KNOWN_SECTIONS};
use benchlaunch::loader_view::LoaderOptions;
use benchlaunch::BenchmarkConfig;
use console::style;
use std::path::Path;

fn load(path: &Path) -> Result<BenchmarkConfig> {
    BenchmarkConfig::load(path)
        .with_context(|| format!("Failed to load benchmark configuration {}", path.display()))
}

pub fn check_report(path: &Path, config: &BenchmarkConfig) -> String {
    let mut out = format!(
        "{} {} is well-formed\n",
        style("✓").green().bold(),
        path.display()
    );
    out.push_str(&format!("{}\n", style("Sections:").dim()));
    for (name, value) in config.sections() {
        let note = if KNOWN_SECTIONS.contains(&name) {
            String::new()
        } else {
            format!(" {}", style("(undocumented)").yellow())
        };
        out.push_str(&format!("  {} ({}){}\n", name, describe_kind(value), note));
    }
    let missing = config.missing_sections();
    if !missing.is_empty() {
        out.push_str(&format!(
            "{} {}\n",
            style("Not present:").dim(),
            missing.join(", ")
        ));
    }
    out
}

pub fn handle_check(path: &Path) -> Result<()> {
    let config = load(path)?;
    print!("{}", check_report(path, &config));
    Ok(())
}

fn join_or_dash<T: ToString>(items: Option<&[T]>) -> String {
    match items {
        Some(items) if !items.is_empty() => items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
        Some(_) => "none".to_string(),
        None => "-".to_string(),
    }
}

/// Key/value description of a loader section, with the number of files its patterns match
pub fn describe_loader(options: &LoaderOptions, num_files: usize) -> Vec<(&'static str, String)> {
    let optional = |value: Option<usize>| value.map_or("-".to_string(), |v| v.to_string());
    vec![
        ("Filename patterns", options.filenames.join(", ")),
        ("Num files", num_files.to_string()),
        ("Leadtimes", join_or_dash(options.limit_leadtimes.as_deref())),
        ("Predictors", join_or_dash(options.limit_predictors.as_deref())),
        ("X range", join_or_dash(options.x_range.as_deref())),
        ("Y range", join_or_dash(options.y_range.as_deref())),
        ("Patch size", optional(options.patch_size)),
        ("Batch size", options.batch_size.to_string()),
        ("Prefetch", optional(options.prefetch)),
        ("Extra features", join_or_dash(Some(options.feature_names().as_slice()))),
        (
            "Normalization",
            options
                .normalization
                .as_ref()
                .map_or("-".to_string(), |p| p.display().to_string()),
        ),
        ("Predict diff", options.predict_diff.to_string()),
        ("Cache", options.cache.to_string()),
    ]
}

pub fn handle_describe(path: &Path, section: &str) -> Result<()> {
    let config = load(path)?;
    let options = LoaderOptions::from_config(&config, section)?
        .ok_or_else(|| anyhow!("Section '{}' not found in {}", section, path.display()))?;
    let files = options.expand_filenames()?;

    println!(
        "{} {}",
        style("Section:").green().bold(),
        style(section).green()
    );
    let rows = describe_loader(&options, files.len());
    let width = rows.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    for (key, value) in rows {
        println!("  {:<width$}  {}", style(key).dim(), value, width = width);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
training:
  num_epochs: 1
loader:
  filenames: ["/data/*.nc"]
  limit_leadtimes: "0:3"
  patch_size: 16
  extra_features:
    - type: x
    - type: leadtime
      name: lt
extra:
  - 1
"#;

    #[test]
    fn test_check_report() {
        console::set_colors_enabled(false);
        let config = BenchmarkConfig::from_yaml(DOCUMENT).unwrap();
        let report = check_report(Path::new("benchmark.yml"), &config);
        assert!(report.contains("benchmark.yml is well-formed"));
        assert!(report.contains("  training (a mapping)\n"));
        assert!(report.contains("  extra (a sequence) (undocumented)\n"));
        assert!(report.contains("Not present: loader_validation, models, output"));
    }

    #[test]
    fn test_describe_loader_rows() {
        let config = BenchmarkConfig::from_yaml(DOCUMENT).unwrap();
        let options = LoaderOptions::from_config(&config, "loader").unwrap().unwrap();
        let rows = describe_loader(&options, 7);
        let get = |key: &str| {
            rows.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("Num files"), "7");
        assert_eq!(get("Leadtimes"), "0, 1, 2");
        assert_eq!(get("X range"), "-");
        assert_eq!(get("Patch size"), "16");
        assert_eq!(get("Batch size"), "1");
        assert_eq!(get("Extra features"), "x, lt");
        assert_eq!(get("Normalization"), "-");
    }

    #[test]
    fn test_describe_missing_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("benchmark.yml");
        std::fs::write(&path, DOCUMENT).unwrap();
        let err = handle_describe(&path, "loader_validation").unwrap_err();
        assert!(err.to_string().contains("Section 'loader_validation' not found"));
    }

    #[test]
    fn test_check_malformed_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("benchmark.yml");
        std::fs::write(&path, "training: [1, 2\nloader: {").unwrap();
        let err = handle_check(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse document"));
    }
}
