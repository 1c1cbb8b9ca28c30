use anyhow::Result;

use crate::config::Config;
use crate::server;
use crate::state::AppState;

pub async fn run(config: Config, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.port);
    let state = AppState::new(config)?;
    server::serve(state, port).await
}
