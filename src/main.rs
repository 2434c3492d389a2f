//! dbadmin - command-line client for a REST database administration backend.

use clap::CommandFactory;
use db_admin_client::cli;
use db_admin_client::config::Config;
use db_admin_client::context::AppContext;
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so command output stays pipeable.
    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() {
    let mut config = Config::parse_args();

    if config.enable_logs {
        init_tracing(&config);
    }

    let Some(command) = config.command.take() else {
        if let Err(e) = Config::command().print_help() {
            eprintln!("Error: {e}");
        }
        std::process::exit(2);
    };

    debug!(
        api_url = %config.api_url,
        "Starting dbadmin v{}",
        env!("CARGO_PKG_VERSION")
    );

    let ctx = match AppContext::from_config(&config) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    match cli::run(&ctx, command, config.format).await {
        Ok(output) => print!("{output}"),
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
