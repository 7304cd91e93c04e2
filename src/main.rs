mod app;
mod cli;
mod config;
mod extraction;
mod models;
mod services;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use app::App;
use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut app = App::open(&cli).await?;
    app.run(cli.command).await
}
