use actix_web::{middleware::Logger, App, HttpServer};

use tasktracker::{app, AppState, Config};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;

    let state = AppState::connect(config.clone()).await.map_err(|e| {
        log::error!("Failed to initialise storage: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    log::info!("Starting tasktracker server at {}", config.server_url());

    HttpServer::new(move || {
        App::new()
            .wrap(app::cors(&state.config))
            .wrap(Logger::default())
            .configure(|cfg| app::configure(cfg, &state))
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
