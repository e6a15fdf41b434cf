use log::*;
use service::{config::Config, logging::Logger, AppState};

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting realtime hub [{}] on port {}",
        config.runtime_env, config.port
    );

    if config.jwt_secret().is_none() {
        warn!("JWT_SECRET is not set; every authenticated request will be rejected");
    }

    let hub = service::init_hub(&config);
    let app_state = AppState::new(config, hub);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server stopped with an error: {e}");
        std::process::exit(1);
    }

    info!("Server stopped");
}
