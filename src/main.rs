use anyhow::Result;
use clap::Parser;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use gforms_provider::cli::{self, Cli};
use gforms_provider::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "gforms_provider=debug,gforms=debug"
    } else {
        "gforms_provider=info,gforms=info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();

    let config = Config::load(cli.config.as_deref())?;
    debug!("Loaded config: {:?}", config.endpoints);

    // Ctrl-C stops retry sleeps and pending calls; creates already in flight finish
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling outstanding requests");
            on_interrupt.cancel();
        }
    });

    cli::run(cli, config, cancel).await
}
