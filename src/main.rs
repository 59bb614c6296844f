use std::sync::Arc;

use ari_bridge::app::App;
use ari_bridge::config::Config;
use ari_bridge::handler::NoopHandler;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let config = match Config::load("ari-bridge.toml") {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    config.init_logging();
    info!("ari-bridge starting");

    if let Err(e) = App::run(config, Arc::new(NoopHandler)).await {
        error!(error = %e, "Fatal error");
        std::process::exit(1);
    }
}
