use log::error;
use tracing_subscriber::EnvFilter;

fn main() {
    // stdout carries the native messaging protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("focusguard=info,focusguard_lib=info")),
        )
        .init();

    if let Err(e) = focusguard_lib::run() {
        error!("Failed to start: {e}");
        std::process::exit(1);
    }
}
