use tracing_subscriber::EnvFilter;

/// Installs a stderr subscriber when `RUST_LOG` is set; stays silent otherwise.
fn init_tracing() {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Entry point for the `license-header` binary.
///
/// Delegates to the CLI entry function and exits the process with the
/// returned exit code. If an error occurs, exits with status code 1.
fn main() {
    init_tracing();
    match license_header::cli::entry() {
        Ok(code) => std::process::exit(code),
        Err(_) => std::process::exit(1),
    }
}
