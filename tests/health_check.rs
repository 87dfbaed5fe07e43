//! Integration tests for the health endpoint

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use rotating_auth::auth::{AuthService, BcryptHasher};
use rotating_auth::clock::SystemClock;
use rotating_auth::configuration::JwtSettings;
use rotating_auth::startup::run;
use rotating_auth::store::{InMemoryIdentityRepository, InMemoryTokenStore};

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let service = AuthService::new(
        Arc::new(InMemoryIdentityRepository::new()),
        Arc::new(InMemoryTokenStore::new()),
        Arc::new(BcryptHasher::new(4).expect("Failed to build hasher")),
        Arc::new(SystemClock),
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        },
        Duration::from_secs(2),
    );
    let server = run(listener, web::Data::new(service))
        .expect("Failed to create server");

    let _ = tokio::spawn(async move {
        let _ = server.await;
    });

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn health_check_needs_no_token() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .header("Authorization", "Bearer garbage")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(200, response.status().as_u16());
}
