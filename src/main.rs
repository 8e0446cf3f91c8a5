use colored::Colorize;
use tracing_subscriber::EnvFilter;

use argform::cli;

fn main() {
    let command_line_interface = cli::CommandLineInterface::load();
    init_tracing(command_line_interface.verbose());
    if let Err(error) = command_line_interface.run() {
        eprintln!("{} {:#}", "error:".red().bold(), error);
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout stays clean for JSON/YAML output.
fn init_tracing(verbose: bool) {
    let default = if verbose { "argform=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
