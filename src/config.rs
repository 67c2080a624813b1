// src/config.rs

use std::env;
use dotenvy::dotenv;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string. Without it the service keeps data in memory.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub rust_log: String,
    /// Attemptor type recorded on every execution (the polymorphic owner kind).
    pub executable_type: String,
    pub port: u16,
    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::InternalServerError("JWT_SECRET must be set".to_string()))?;

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let executable_type = env::var("EXECUTABLE_TYPE")
            .unwrap_or_else(|_| "users".to_string());

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| AppError::InternalServerError(format!("PORT is not a valid port: {}", raw)))?,
            Err(_) => 3000,
        };

        let log_dir = env::var("LOG_DIR")
            .unwrap_or_else(|_| "logs".to_string());

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            executable_type,
            port,
            log_dir,
        })
    }
}
