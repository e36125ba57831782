//! Ingestion relay server binary.
//!
//! Usage: `server [config-file]`. Configuration also comes from
//! `BEACON_`-prefixed environment variables.

use beacon_relay::web::state::AppState;
use beacon_relay::{logging, RelayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_structured_logging();

    let config_path = std::env::args().nth(1);
    let config = RelayConfig::load(config_path.as_deref())?;

    let state = AppState::from_config(config)?;
    beacon_relay::web::serve(state).await?;

    Ok(())
}
