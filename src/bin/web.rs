#![cfg(not(tarpaulin_include))]

use clap::Parser;
use pkm2pred::app;
use pkm2pred::config::ServerConfig;

#[derive(Parser)]
#[command(name = "pkm2pred-web", version, about = "Serve the PKM2Pred prediction API")]
struct Cli {
    #[command(flatten)]
    server: ServerConfig,
}

/// Main entry point for the web application
///
/// Loads `.env`, initializes logging (`RUST_LOG`, default `info`) and runs the
/// server until it is stopped.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    app::run(cli.server).await
}
