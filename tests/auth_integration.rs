use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use rotating_auth::auth::{generate_access_token, AuthService, BcryptHasher, Claims};
use rotating_auth::clock::SystemClock;
use rotating_auth::configuration::JwtSettings;
use rotating_auth::identity::{NewIdentity, Role};
use rotating_auth::startup::run;
use rotating_auth::store::{InMemoryIdentityRepository, InMemoryTokenStore};
use serde_json::{json, Value};

const EMAIL: &str = "testing@email.com";
const PASSWORD: &str = "mypass123";

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

impl TestApp {
    async fn register(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(&format!("{}/auth/register", &self.address))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn login(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}/auth/login", &self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn refresh(&self, body: &Value) -> reqwest::Response {
        self.client
            .put(&format!("{}/auth/refresh", &self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Register the default identity and log it in
    async fn logged_in(&self) -> Value {
        assert_eq!(201, self.register(EMAIL, PASSWORD).await.status().as_u16());
        let response = self
            .login(&json!({ "email": EMAIL, "password": PASSWORD }))
            .await;
        assert_eq!(200, response.status().as_u16());
        response.json().await.expect("Failed to parse response")
    }
}

fn jwt_settings() -> JwtSettings {
    JwtSettings {
        secret: "test-secret-key-at-least-32-characters-long".to_string(),
        access_token_expiry: 3600,
        refresh_token_expiry: 604800,
        issuer: "test".to_string(),
    }
}

fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let jwt_config = jwt_settings();
    let service = AuthService::new(
        Arc::new(InMemoryIdentityRepository::new()),
        Arc::new(InMemoryTokenStore::new()),
        Arc::new(BcryptHasher::new(4).expect("Failed to build hasher")),
        Arc::new(SystemClock),
        jwt_config,
        Duration::from_secs(2),
    );

    let server = run(listener, web::Data::new(service)).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        client: reqwest::Client::new(),
    }
}

// --- Registration Tests ---

#[tokio::test]
async fn register_returns_201_for_valid_input() {
    let app = spawn_app();

    let response = app.register(EMAIL, PASSWORD).await;

    assert_eq!(201, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["email"], EMAIL);
    assert_eq!(body["roles"], json!(["COMMON"]));
    assert!(body.get("passwordHash").is_none());
}

#[tokio::test]
async fn register_returns_409_for_duplicate_email() {
    let app = spawn_app();

    assert_eq!(201, app.register(EMAIL, PASSWORD).await.status().as_u16());
    let response = app.register(EMAIL, PASSWORD).await;

    assert_eq!(409, response.status().as_u16());
}

#[tokio::test]
async fn register_returns_400_with_every_field_problem() {
    let app = spawn_app();

    let response = app.register("notanemail", "short").await;

    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .expect("details should be a list")
        .iter()
        .filter_map(|d| d["field"].as_str())
        .collect();
    assert_eq!(fields, vec!["email", "password"]);
}

#[tokio::test]
async fn register_ignores_client_supplied_roles() {
    let app = spawn_app();

    let response = app
        .client
        .post(&format!("{}/auth/register", &app.address))
        .json(&json!({ "email": EMAIL, "password": PASSWORD, "roles": ["admin"] }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(201, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["roles"], json!(["COMMON"]));

    let tokens: Value = app
        .login(&json!({ "email": EMAIL, "password": PASSWORD }))
        .await
        .json()
        .await
        .expect("Failed to parse response");
    let me: Value = app
        .client
        .get(&format!("{}/auth/me", &app.address))
        .bearer_auth(tokens["accessToken"].as_str().unwrap())
        .send()
        .await
        .expect("Failed to execute request.")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(me["roles"], json!(["COMMON"]));
}

// --- Login Tests ---

#[tokio::test]
async fn login_returns_200_with_token_pair() {
    let app = spawn_app();

    let body = app.logged_in().await;

    assert_eq!(body["email"], EMAIL);
    assert_eq!(body["authenticated"], true);
    let access = body["accessToken"].as_str().expect("No access token");
    let refresh = body["refreshToken"].as_str().expect("No refresh token");
    assert!(!access.is_empty());
    assert!(!refresh.is_empty());
    assert_ne!(access, refresh);

    let creation = chrono::DateTime::parse_from_rfc3339(body["creation"].as_str().unwrap())
        .expect("creation should be RFC 3339");
    let expiration = chrono::DateTime::parse_from_rfc3339(body["expiration"].as_str().unwrap())
        .expect("expiration should be RFC 3339");
    assert!(expiration > creation);
}

#[tokio::test]
async fn login_returns_401_for_bad_credentials() {
    let app = spawn_app();
    app.register(EMAIL, PASSWORD).await;

    let test_cases = vec![
        (json!({ "email": EMAIL, "password": "wrongpass1" }), "wrong password"),
        (json!({ "email": "nobody@email.com", "password": PASSWORD }), "unknown email"),
    ];

    let mut bodies = Vec::new();
    for (body, reason) in test_cases {
        let response = app.login(&body).await;
        assert_eq!(401, response.status().as_u16(), "Should reject: {}", reason);
        let body: Value = response.json().await.expect("Failed to parse response");
        bodies.push((body["code"].clone(), body["message"].clone()));
    }

    // No hint about which half was wrong
    assert_eq!(bodies[0], bodies[1]);
}

#[tokio::test]
async fn login_returns_400_for_missing_fields() {
    let app = spawn_app();

    let test_cases = vec![
        (json!({ "email": EMAIL }), "missing password"),
        (json!({ "password": PASSWORD }), "missing email"),
        (json!({}), "missing all fields"),
    ];

    for (body, reason) in test_cases {
        let response = app.login(&body).await;
        assert_eq!(400, response.status().as_u16(), "Should reject request: {}", reason);
    }
}

// --- Token Refresh Tests ---

#[tokio::test]
async fn refresh_rotates_token_and_rejects_replay() {
    let app = spawn_app();
    let a = app.logged_in().await;
    let a_refresh = a["refreshToken"].as_str().unwrap();

    let response = app
        .refresh(&json!({ "email": EMAIL, "refreshToken": a_refresh }))
        .await;
    assert_eq!(200, response.status().as_u16());
    let b: Value = response.json().await.expect("Failed to parse response");
    let b_refresh = b["refreshToken"].as_str().unwrap();
    assert_ne!(a_refresh, b_refresh, "Refresh token should be rotated on each refresh");
    assert_eq!(b["authenticated"], true);

    let replay = app
        .refresh(&json!({ "email": EMAIL, "refreshToken": a_refresh }))
        .await;
    assert_eq!(401, replay.status().as_u16());
    let body: Value = replay.json().await.expect("Failed to parse response");
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn refresh_returns_401_for_unknown_token() {
    let app = spawn_app();
    app.logged_in().await;

    let response = app
        .refresh(&json!({ "email": EMAIL, "refreshToken": "definitely_not_a_valid_token" }))
        .await;

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn refresh_returns_400_for_missing_fields() {
    let app = spawn_app();

    let test_cases = vec![
        (json!({ "email": EMAIL }), "missing token"),
        (json!({ "refreshToken": "abc" }), "missing email"),
        (json!({ "email": EMAIL, "refreshToken": "" }), "empty token"),
    ];

    for (body, reason) in test_cases {
        let response = app.refresh(&body).await;
        assert_eq!(400, response.status().as_u16(), "Should reject request: {}", reason);
    }
}

#[tokio::test]
async fn refresh_rejects_post() {
    let app = spawn_app();

    let response = app
        .client
        .post(&format!("{}/auth/refresh", &app.address))
        .json(&json!({ "email": EMAIL, "refreshToken": "abc" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert!(response.status().is_client_error());
    assert_ne!(200, response.status().as_u16());
}

// --- Protected Routes Tests ---

#[tokio::test]
async fn me_returns_identity_for_valid_access_token() {
    let app = spawn_app();
    let tokens = app.logged_in().await;

    let response = app
        .client
        .get(&format!("{}/auth/me", &app.address))
        .bearer_auth(tokens["accessToken"].as_str().unwrap())
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["email"], EMAIL);
}

#[tokio::test]
async fn protected_routes_reject_missing_or_malformed_authorization() {
    let app = spawn_app();

    let malformed_headers = vec![
        "Bearer",
        "Basic dXNlcjpwYXNz",
        "BearerToken",
        "Bearer invalid.token.here",
    ];

    for header in malformed_headers {
        let response = app
            .client
            .get(&format!("{}/auth/me", &app.address))
            .header("Authorization", header)
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(401, response.status().as_u16(), "Should reject header: {}", header);
    }

    let response = app
        .client
        .post(&format!("{}/auth/logout", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"], "MISSING_TOKEN");
}

#[tokio::test]
async fn protected_routes_report_expired_access_token() {
    let app = spawn_app();
    let config = jwt_settings();
    let identity = NewIdentity {
        email: EMAIL.to_string(),
        password_hash: "hash".to_string(),
        roles: vec![Role::Common],
    }
    .into_identity(chrono::Utc::now());
    let claims = Claims::new(
        &identity,
        chrono::Utc::now() - chrono::Duration::hours(2),
        3600,
        config.issuer.clone(),
    );
    let token = generate_access_token(&claims, &config).expect("Failed to generate token");

    let response = app
        .client
        .get(&format!("{}/auth/me", &app.address))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn logout_revokes_refresh_token() {
    let app = spawn_app();
    let tokens = app.logged_in().await;

    let response = app
        .client
        .post(&format!("{}/auth/logout", &app.address))
        .bearer_auth(tokens["accessToken"].as_str().unwrap())
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(204, response.status().as_u16());

    let refresh = app
        .refresh(&json!({ "email": EMAIL, "refreshToken": tokens["refreshToken"] }))
        .await;
    assert_eq!(401, refresh.status().as_u16());
}
