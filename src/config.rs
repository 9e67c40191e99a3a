//! Environment-driven server configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set")]
    MissingJwtSecret,
    #[error("PORT is not a valid port number: {0}")]
    InvalidPort(String),
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
}

impl Config {
    /// Reads configuration from the environment.
    ///
    /// `PORT` defaults to 3000 and `DATABASE_URL` to a local SQLite file;
    /// `JWT_SECRET` has no safe default and must be provided.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidPort(raw))?,
            Err(_) => 3000,
        };

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://palaver.db".to_string());

        let jwt_secret = std::env::var("JWT_SECRET").map_err(|_| ConfigError::MissingJwtSecret)?;

        Ok(Self {
            port,
            database_url,
            jwt_secret,
        })
    }
}
