use clap::Parser;
use pdb_refresh::app::{handle_fatal_error, init_logging, AppConfig};
use pdb_refresh::cli::{execute_command, Cli};
use tracing::trace;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let app = AppConfig::new(cli.verbose);

    if let Err(e) = init_logging(&app) {
        eprintln!("Warning: {}", e);
    }
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = execute_command(cli.command, &app).await {
        handle_fatal_error(e, app.verbose);
    }
}
