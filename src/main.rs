use actix_web::web;
use std::net::TcpListener;
use rotating_auth::cleanup::spawn_expired_token_cleanup;
use rotating_auth::configuration::get_configuration;
use rotating_auth::startup::{build_auth_service, run};
use rotating_auth::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let service = build_auth_service(&configuration).await.map_err(|e| {
        tracing::error!("Failed to initialise auth service: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Startup error")
    })?;
    let service = web::Data::new(service);

    if let Some(every) = configuration.storage.cleanup_interval() {
        tracing::info!(interval_secs = every.as_secs(), "Scheduling expired token cleanup");
        spawn_expired_token_cleanup(service.clone().into_inner(), every);
    }

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, service)?;
    server.await
}
