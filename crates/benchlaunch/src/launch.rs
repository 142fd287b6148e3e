use crate::errors::{util::ensure_file_exists, LaunchError, LaunchResult};
use crate::manifest::RunManifest;
use crate::params::{parse_override, ResolvedParameters};
use crate::render::Quoting;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{Duration, Instant};

/// Everything needed to start one run, produced before anything is launched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaunchPlan {
    pub entry_point: String,
    pub parameters: ResolvedParameters,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<(String, String)>,
}

impl LaunchPlan {
    /// Resolve overrides and render the entry point's command. Either fully succeeds or
    /// fails before any process is started.
    pub fn prepare(
        manifest: &RunManifest,
        entry_point: &str,
        overrides: &[(String, String)],
        quoting: Quoting,
    ) -> LaunchResult<Self> {
        let entry = manifest.entry_point(entry_point)?;
        let parameters = entry.resolve(overrides)?;
        let command = entry.render(&parameters, quoting)?;
        tracing::debug!(entry_point = %entry.name, command = %command, "prepared launch plan");
        Ok(LaunchPlan {
            entry_point: entry.name.clone(),
            parameters,
            command,
            working_dir: None,
            envs: Vec::new(),
        })
    }

    /// Same as `prepare`, taking raw `key=value` override strings
    pub fn prepare_from_args<S: AsRef<str>>(
        manifest: &RunManifest,
        entry_point: &str,
        raw_overrides: &[S],
        quoting: Quoting,
    ) -> LaunchResult<Self> {
        let overrides = raw_overrides
            .iter()
            .map(|raw| parse_override(raw.as_ref()))
            .collect::<LaunchResult<Vec<_>>>()?;
        Self::prepare(manifest, entry_point, &overrides, quoting)
    }

    pub fn with_working_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Add the variables of a dotenv-style file to the child's environment
    pub fn with_env_file<P: AsRef<Path>>(mut self, path: P) -> LaunchResult<Self> {
        let path = path.as_ref();
        ensure_file_exists(path)?;
        let iter = dotenvy::from_path_iter(path).map_err(|e| env_file_error(path, e))?;
        for item in iter {
            let (key, value) = item.map_err(|e| env_file_error(path, e))?;
            self.envs.push((key, value));
        }
        Ok(self)
    }

    /// Split the rendered command into program and arguments using shell word rules
    pub fn argv(&self) -> LaunchResult<Vec<String>> {
        let words = shlex::split(&self.command).ok_or_else(|| {
            LaunchError::ParseError(format!(
                "rendered command has unbalanced quotes: {}",
                self.command
            ))
        })?;
        if words.is_empty() {
            return Err(LaunchError::ParseError("rendered command is empty".to_string()));
        }
        Ok(words)
    }
}

fn env_file_error(path: &Path, err: dotenvy::Error) -> LaunchError {
    LaunchError::ParseError(format!("env file {}: {}", path.display(), err))
}

/// Outcome of a launched run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExitReport {
    pub code: i32,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Map a non-zero exit to `SubprocessFailed`
    pub fn into_result(self) -> LaunchResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(LaunchError::SubprocessFailed(self.code))
        }
    }
}

/// Exit code of a finished child. A child killed by a signal reports 128 + signal.
#[cfg(unix)]
fn exit_code(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Hands a prepared plan to something that runs it
pub trait Launcher {
    fn launch(&mut self, plan: &LaunchPlan) -> LaunchResult<ExitReport>;
}

/// Spawns the command directly, without a shell, and waits for it to exit
#[derive(Debug, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn launch(&mut self, plan: &LaunchPlan) -> LaunchResult<ExitReport> {
        let argv = plan.argv()?;
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        if let Some(dir) = &plan.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &plan.envs {
            cmd.env(key, value);
        }

        let started_at = Local::now();
        let start = Instant::now();
        tracing::info!(entry_point = %plan.entry_point, program = %argv[0], "launching run");
        let status = cmd.status()?;
        let elapsed = start.elapsed();

        let code = exit_code(&status);
        tracing::info!(code, elapsed_secs = elapsed.as_secs_f64(), "run exited");
        Ok(ExitReport {
            code,
            started_at,
            elapsed,
        })
    }
}

/// Records plans instead of running them
#[derive(Debug, Default)]
pub struct DryRunLauncher {
    pub launched: Vec<LaunchPlan>,
}

impl Launcher for DryRunLauncher {
    fn launch(&mut self, plan: &LaunchPlan) -> LaunchResult<ExitReport> {
        plan.argv()?;
        tracing::info!(entry_point = %plan.entry_point, command = %plan.command, "dry run, not launching");
        self.launched.push(plan.clone());
        Ok(ExitReport {
            code: 0,
            started_at: Local::now(),
            elapsed: Duration::ZERO,
        })
    }
}
