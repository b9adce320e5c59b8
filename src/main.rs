use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use quotes::config::Config;
use quotes::store::QuoteStore;
use quotes::{api, Error, Outcome, Server, SharedStore, SqliteStore};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();
    config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default()
        .init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(version = env!("CARGO_PKG_VERSION"), "quotes starting");

    match run(config).await {
        Ok(Outcome::Terminated) => {
            info!("quotes stopped");
            ExitCode::SUCCESS
        }
        // A handler may be parked in a blocking storage call the runtime
        // would wait on during teardown; leave without unwinding.
        Ok(Outcome::ForcedExit) => std::process::exit(1),
        Err(e) => {
            error!(error = %e, "quotes failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<Outcome, Error> {
    let store = SqliteStore::open(&config.database_url)?;
    store.ping().await?;
    let store: SharedStore = Arc::new(store);

    let server = Server::bind(config.listen_addr())
        .await?
        .grace_period(config.grace_period)
        .rate_limit(config.rate_limit);

    // The store lives exactly as long as serving; dropping the router on
    // return closes the connection.
    server.serve(api::routes(store)).await
}
