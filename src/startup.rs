use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{AuthService, BcryptHasher};
use crate::clock::SystemClock;
use crate::configuration::{Settings, StorageBackend};
use crate::error::{AppError, ConfigError, ValidationErrors};
use crate::middleware::{JwtMiddleware, LoggerMiddleware};
use crate::routes::{get_current_user, health_check, login, logout, refresh, register};
use crate::store::{
    IdentityRepository, InMemoryIdentityRepository, InMemoryTokenStore, PgIdentityRepository,
    PgTokenStore, TokenStore,
};

const MAX_JSON_BODY_BYTES: usize = 4096;

/// Wire the configured store backend, hasher and clock into an `AuthService`
pub async fn build_auth_service(settings: &Settings) -> Result<AuthService, AppError> {
    let identities: Arc<dyn IdentityRepository>;
    let store: Arc<dyn TokenStore>;

    match settings.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; sessions are lost on restart");
            identities = Arc::new(InMemoryIdentityRepository::new());
            store = Arc::new(InMemoryTokenStore::new());
        }
        StorageBackend::Postgres => {
            let database = settings
                .database
                .as_ref()
                .ok_or_else(|| ConfigError::MissingRequired("database".to_string()))?;

            tracing::info!(host = %database.host, "Connecting to database");
            let pool = PgPoolOptions::new()
                .max_connections(database.max_connections)
                .acquire_timeout(settings.storage.lookup_timeout())
                .connect(&database.connection_string())
                .await?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))?;
            tracing::info!("Database migrated");

            identities = Arc::new(PgIdentityRepository::new(pool.clone()));
            store = Arc::new(PgTokenStore::new(pool));
        }
    }

    let hasher = Arc::new(BcryptHasher::new(settings.password.hash_cost)?);

    Ok(AuthService::new(
        identities,
        store,
        hasher,
        Arc::new(SystemClock),
        settings.jwt.clone(),
        settings.storage.lookup_timeout(),
    ))
}

pub fn run(listener: TcpListener, service: web::Data<AuthService>) -> Result<Server, std::io::Error> {
    let jwt_config = service.jwt_settings().clone();

    let server = HttpServer::new(move || {
        let json_config = web::JsonConfig::default()
            .limit(MAX_JSON_BODY_BYTES)
            .error_handler(|err, _req| {
                let mut errors = ValidationErrors::new();
                errors.push("body", err.to_string());
                AppError::from(errors).into()
            });

        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(service.clone())
            .app_data(json_config)

            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::put().to(refresh))
            .route("/auth/register", web::post().to(register))

            // Protected routes (require access token)
            .service(
                web::scope("/auth")
                    .wrap(JwtMiddleware::new(jwt_config.clone()))
                    .route("/logout", web::post().to(logout))
                    .route("/me", web::get().to(get_current_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
