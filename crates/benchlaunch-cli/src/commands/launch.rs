use anyhow::{Context, Result};
use benchlaunch::{DryRunLauncher, LaunchPlan, Launcher, ProcessLauncher, Quoting, RunManifest};
use console::style;
use std::path::PathBuf;

use crate::cli::LaunchArgs;
use crate::settings::Settings;

/// Load the manifest and build a plan from CLI arguments layered over settings
pub fn prepare_plan(settings: &Settings, args: &LaunchArgs) -> Result<LaunchPlan> {
    let manifest_path = args.manifest.as_ref().unwrap_or(&settings.manifest);
    let entry_point = args.entry_point.as_deref().unwrap_or(&settings.entry_point);
    let quoting = if args.quote || settings.quote {
        Quoting::Shell
    } else {
        Quoting::None
    };

    let manifest = RunManifest::load(manifest_path).with_context(|| {
        format!("Failed to load run manifest {}", manifest_path.display())
    })?;
    let plan = LaunchPlan::prepare_from_args(&manifest, entry_point, args.params.as_slice(), quoting)?;
    Ok(plan)
}

pub fn handle_render(settings: &Settings, args: &LaunchArgs) -> Result<()> {
    let plan = prepare_plan(settings, args)?;
    // stdout carries only the command so it can be captured by a job script
    println!("{}", plan.command);
    Ok(())
}

fn print_plan(plan: &LaunchPlan) {
    eprintln!(
        "{} {}",
        style("Entry point:").green().bold(),
        style(&plan.entry_point).green()
    );
    if !plan.parameters.is_empty() {
        eprintln!("{}", style("Parameters:").dim());
        for (name, value) in plan.parameters.iter() {
            eprintln!("  {}: {}", name, value);
        }
    }
    if let Some(dir) = &plan.working_dir {
        eprintln!("{} {}", style("Working directory:").dim(), dir.display());
    }
    eprintln!("{} {}", style("Command:").dim(), style(&plan.command).cyan());
    eprintln!();
}

pub fn handle_run(
    settings: &Settings,
    args: &LaunchArgs,
    cwd: Option<PathBuf>,
    env_file: Option<PathBuf>,
    dry_run: bool,
) -> Result<()> {
    let mut plan = prepare_plan(settings, args)?;
    if let Some(dir) = cwd {
        plan = plan.with_working_dir(dir);
    }
    if let Some(path) = env_file {
        plan = plan.with_env_file(&path)?;
    }

    print_plan(&plan);

    let report = if dry_run {
        DryRunLauncher::default().launch(&plan)?
    } else {
        ProcessLauncher.launch(&plan)?
    };

    if !dry_run {
        eprintln!(
            "{} exit code {} after {:.1}s (started {})",
            style("Finished:").dim(),
            report.code,
            report.elapsed.as_secs_f64(),
            report.started_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    report.into_result()?;
    Ok(())
}
