use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;

use crate::commands::config_doc::{handle_check, handle_describe};
use crate::commands::launch::{handle_render, handle_run};
use crate::commands::params::handle_params;
use crate::logging::setup_logging;
use crate::settings::Settings;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file layered over the user settings
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "Settings file (TOML) layered over ~/.config/benchlaunch/settings.toml"
    )]
    settings: Option<PathBuf>,

    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase log verbosity (-v debug, -vv trace)"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Which entry point of which manifest, and how to bind its parameters
#[derive(Args, Debug, Clone, Default)]
pub struct LaunchArgs {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to the run manifest (defaults to ./MLproject)"
    )]
    pub manifest: Option<PathBuf>,

    #[arg(
        short,
        long,
        value_name = "NAME",
        help = "Entry point to use (defaults to 'main')"
    )]
    pub entry_point: Option<String>,

    #[arg(
        short = 'P',
        long = "param",
        value_name = "KEY=VALUE",
        help = "Override a declared parameter (can be specified multiple times)",
        long_help = "Override a parameter declared by the entry point, e.g. -P batch_size=64. Can be specified multiple times; the last value for a key wins.",
        action = clap::ArgAction::Append
    )]
    pub params: Vec<String>,

    #[arg(
        long,
        help = "Shell-quote substituted values",
        long_help = "Quote every substituted value with POSIX shell rules. By default values are substituted verbatim so glob patterns reach the program untouched."
    )]
    pub quote: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the rendered command for an entry point
    #[command(about = "Resolve parameters and print the rendered command")]
    Render {
        #[command(flatten)]
        launch: LaunchArgs,
    },

    /// Render and launch the command
    #[command(about = "Resolve parameters, render the command and launch it")]
    Run {
        #[command(flatten)]
        launch: LaunchArgs,

        #[arg(long, value_name = "DIR", help = "Working directory for the launched process")]
        cwd: Option<PathBuf>,

        #[arg(
            long = "env-file",
            value_name = "FILE",
            help = "File of KEY=value lines added to the process environment"
        )]
        env_file: Option<PathBuf>,

        #[arg(long, help = "Show what would be launched without starting it")]
        dry_run: bool,
    },

    /// List the parameters declared by the manifest
    #[command(about = "List entry points and their declared parameters")]
    Params {
        #[arg(short, long, value_name = "FILE", help = "Path to the run manifest")]
        manifest: Option<PathBuf>,

        #[arg(
            short,
            long,
            value_name = "NAME",
            help = "Only show this entry point"
        )]
        entry_point: Option<String>,

        #[arg(
            short,
            long,
            help = "Output format (text, json)",
            default_value = "text"
        )]
        format: String,
    },

    /// Check that a benchmark configuration document is well-formed
    #[command(about = "Check that a benchmark configuration document is well-formed")]
    Check {
        #[arg(help = "Path to the benchmark configuration document")]
        config: PathBuf,
    },

    /// Describe a loader section of a benchmark configuration document
    #[command(about = "Show a typed view of a loader section")]
    Describe {
        #[arg(help = "Path to the benchmark configuration document")]
        config: PathBuf,

        #[arg(
            short,
            long,
            default_value = "loader",
            help = "Section to describe (loader, loader_validation)"
        )]
        section: String,
    },
}

/// Load settings, then install logging so the settings themselves can be logged
fn init(cli: &Cli) -> Result<(Settings, Option<WorkerGuard>)> {
    let settings = Settings::new(cli.settings.as_deref())?;
    let guard = setup_logging(&settings.log, cli.verbose)?;
    tracing::debug!(?settings, "loaded settings");
    Ok((settings, guard))
}

pub fn cli() -> Result<()> {
    let cli = Cli::parse();
    let (settings, _guard) = init(&cli)?;

    match cli.command {
        Command::Render { launch } => handle_render(&settings, &launch),
        Command::Run {
            launch,
            cwd,
            env_file,
            dry_run,
        } => handle_run(&settings, &launch, cwd, env_file, dry_run),
        Command::Params {
            manifest,
            entry_point,
            format,
        } => handle_params(&settings, manifest, entry_point, &format),
        Command::Check { config } => handle_check(&config),
        Command::Describe { config, section } => handle_describe(&config, &section),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "benchlaunch",
            "-v",
            "run",
            "-m",
            "jobs/MLproject",
            "-P",
            "batch_size=64",
            "--param",
            "nepochs=3",
            "--cwd",
            "/scratch",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Run {
                launch,
                cwd,
                env_file,
                dry_run,
            } => {
                assert_eq!(launch.manifest, Some(PathBuf::from("jobs/MLproject")));
                assert_eq!(launch.params, vec!["batch_size=64", "nepochs=3"]);
                assert_eq!(cwd, Some(PathBuf::from("/scratch")));
                assert!(env_file.is_none());
                assert!(dry_run);
                assert!(!launch.quote);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_parse_describe_default_section() {
        let cli = Cli::try_parse_from(["benchlaunch", "describe", "benchmark.yml"]).unwrap();
        match cli.command {
            Command::Describe { config, section } => {
                assert_eq!(config, PathBuf::from("benchmark.yml"));
                assert_eq!(section, "loader");
            }
            _ => panic!("expected describe command"),
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_settings_logged_once_logging_is_installed() {
        let home = tempfile::tempdir().unwrap();
        let logs = home.path().join("logs");
        let settings_path = home.path().join("settings.toml");
        std::fs::write(
            &settings_path,
            format!(
                "[log]\nlevel = \"debug\"\ndirectory = \"{}\"\n",
                logs.display()
            ),
        )
        .unwrap();
        let cli = Cli::try_parse_from([
            "benchlaunch",
            "--settings",
            settings_path.to_str().unwrap(),
            "check",
            "benchmark.yml",
        ])
        .unwrap();

        temp_env::with_vars(
            [
                ("HOME", Some(home.path().to_str().unwrap())),
                ("XDG_CONFIG_HOME", Some(home.path().to_str().unwrap())),
                ("RUST_LOG", None),
                ("BENCHLAUNCH_LOG__LEVEL", None),
                ("BENCHLAUNCH_LOG__DIRECTORY", None),
                ("BENCHLAUNCH_LOG__JSON", None),
            ],
            || {
                let (settings, guard) = init(&cli).unwrap();
                assert_eq!(settings.log.level, "debug");
                drop(guard);
            },
        );

        let contents: String = std::fs::read_dir(&logs)
            .unwrap()
            .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
            .collect();
        assert!(contents.contains("loaded settings"));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["benchlaunch"]).is_err());
    }
}
