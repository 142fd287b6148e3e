use benchlaunch::LaunchError;
use console::style;

mod cli;
mod commands;
mod logging;
mod settings;

fn main() {
    if let Err(err) = cli::cli() {
        let code = match err.downcast_ref::<LaunchError>() {
            Some(LaunchError::SubprocessFailed(code)) => *code,
            _ => 1,
        };
        eprintln!("{} {:#}", style("Error:").red().bold(), err);
        std::process::exit(code);
    }
}
