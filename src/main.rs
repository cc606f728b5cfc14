use clap::Parser;
use edge_agent_client::cli::Args;
use edge_agent_client::{client, ClientConfig};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Edge agent client started");

    let cancel = Arc::new(AtomicBool::new(false));
    if let Err(err) = ctrlc::set_handler({
        let cancel = cancel.clone();
        move || cancel.store(true, Ordering::SeqCst)
    }) {
        warn!("Failed to install Ctrl+C handler: {err}");
    }

    let config = ClientConfig::from(args);
    let mut stdout = std::io::stdout().lock();

    match client::run(&config, &cancel, &mut stdout) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
