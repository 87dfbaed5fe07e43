pub mod auth;
pub mod cleanup;
pub mod clock;
pub mod configuration;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod routes;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod validators;
