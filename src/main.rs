use dotenvy::dotenv;
use log::{error, info};
use std::sync::Arc;

use orgserver::core::config::AppConfig;
use orgserver::main_module::run_server;
use orgserver::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();

    info!("Starting orgserver {}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;
    let state = match AppState::from_config(config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(e);
        }
    };

    run_server(state).await?;
    info!("orgserver stopped");
    Ok(())
}
