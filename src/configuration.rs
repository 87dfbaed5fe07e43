use std::time::Duration;

use crate::error::ConfigError;

/// Work-factor bounds accepted by bcrypt
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub password: PasswordSettings,
    pub database: Option<DatabaseSettings>,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// JWT authentication settings
#[derive(serde::Deserialize, Clone, Debug)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,   // seconds (e.g., 3600 for 1 hour)
    pub refresh_token_expiry: i64,  // seconds (e.g., 604800 for 7 days)
    pub issuer: String,
}

impl JwtSettings {
    const MIN_SECRET_LENGTH: usize = 32;

    /// Reject settings that would break the token lifetime invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.len() < Self::MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.secret must be at least {} characters",
                Self::MIN_SECRET_LENGTH
            )));
        }
        if self.access_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt.access_token_expiry must be positive".to_string(),
            ));
        }
        if self.refresh_token_expiry <= self.access_token_expiry {
            return Err(ConfigError::InvalidValue(
                "jwt.refresh_token_expiry must exceed jwt.access_token_expiry".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(serde::Deserialize, Clone, Debug)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Upper bound on a single store call
    pub lookup_timeout_millis: u64,
    /// 0 disables the background purge of expired refresh records
    pub cleanup_interval_seconds: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            lookup_timeout_millis: 2000,
            cleanup_interval_seconds: 300,
        }
    }
}

impl StorageSettings {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_millis)
    }

    pub fn cleanup_interval(&self) -> Option<Duration> {
        match self.cleanup_interval_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
#[serde(default)]
pub struct PasswordSettings {
    /// bcrypt work factor
    pub hash_cost: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.jwt.validate()?;

        if self.storage.backend == StorageBackend::Postgres && self.database.is_none() {
            return Err(ConfigError::MissingRequired(
                "database settings are required for the postgres backend".to_string(),
            ));
        }
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.password.hash_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "password.hash_cost must be between {} and {}",
                MIN_BCRYPT_COST, MAX_BCRYPT_COST
            )));
        }
        Ok(())
    }
}

/// Load settings from `configuration.yaml` (optional) overlaid with
/// `APP_`-prefixed environment variables, e.g. `APP_JWT__SECRET`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    let settings = settings
        .try_deserialize::<Settings>()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        }
    }

    #[test]
    fn test_valid_jwt_settings() {
        assert!(jwt().validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = jwt();
        config.secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_refresh_must_outlive_access() {
        let mut config = jwt();
        config.refresh_token_expiry = config.access_token_expiry;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_postgres_requires_database() {
        let settings = Settings {
            application: ApplicationSettings {
                host: default_host(),
                port: 0,
            },
            jwt: jwt(),
            storage: StorageSettings {
                backend: StorageBackend::Postgres,
                ..StorageSettings::default()
            },
            password: PasswordSettings::default(),
            database: None,
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_hash_cost_must_be_in_bcrypt_range() {
        let mut settings = Settings {
            application: ApplicationSettings {
                host: default_host(),
                port: 0,
            },
            jwt: jwt(),
            storage: StorageSettings::default(),
            password: PasswordSettings::default(),
            database: None,
        };
        assert!(settings.validate().is_ok());

        for cost in [MIN_BCRYPT_COST - 1, MAX_BCRYPT_COST + 1] {
            settings.password.hash_cost = cost;
            assert!(settings.validate().is_err(), "cost {} should be rejected", cost);
        }
    }

    #[test]
    fn test_zero_interval_disables_cleanup() {
        let storage = StorageSettings {
            cleanup_interval_seconds: 0,
            ..StorageSettings::default()
        };
        assert!(storage.cleanup_interval().is_none());
    }
}
