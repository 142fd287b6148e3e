pub mod bench_config;
pub mod errors;
pub mod launch;
pub mod loader_view;
pub mod manifest;
pub mod params;
pub mod render;

// Re-export main components for easier use
pub use bench_config::BenchmarkConfig;
pub use errors::{LaunchError, LaunchResult};
pub use launch::{DryRunLauncher, ExitReport, LaunchPlan, Launcher, ProcessLauncher};
pub use manifest::{EntryPoint, RunManifest, DEFAULT_ENTRY_POINT};
pub use params::{Parameter, ParameterType, ParameterValue, ResolvedParameters};
pub use render::Quoting;
