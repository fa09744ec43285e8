use std::time::Duration;

/// Centralized environment configuration.
/// All env vars and defaults are defined here.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL. Required.
    pub database_url: String,

    /// Address the HTTP server binds to.
    /// Default: 0.0.0.0:3000
    pub bind_addr: String,

    /// Upper bound on one import transaction, in seconds.
    /// Default: 30
    pub import_timeout_secs: u64,

    /// Pool size.
    /// Default: 5
    pub db_max_connections: u32,
}

impl Config {
    /// Build config from environment variables.
    /// Returns an error if required vars are missing.
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL must be set in .env")?;

        let bind_addr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let import_timeout_secs = std::env::var("IMPORT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .map_err(|_| "IMPORT_TIMEOUT_SECS must be a whole number of seconds")?;

        let db_max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MAX_CONNECTIONS must be a positive integer")?;

        Ok(Self {
            database_url,
            bind_addr,
            import_timeout_secs,
            db_max_connections,
        })
    }

    pub fn import_timeout(&self) -> Duration {
        Duration::from_secs(self.import_timeout_secs)
    }

    /// Config for tests. Uses in-memory database URL and a short import timeout.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            import_timeout_secs: 5,
            db_max_connections: 1,
        }
    }
}
