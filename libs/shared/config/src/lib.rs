use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use tracing::warn;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Which persistence adapter the API process wires into the cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgrest,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            "postgrest" | "rest" => Ok(StorageBackend::Postgrest),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Postgrest => write!(f, "postgrest"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_rest_url: String,
    pub database_api_key: String,
    pub jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub bind_address: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            database_rest_url: env::var("DATABASE_REST_URL")
                .unwrap_or_else(|_| {
                    warn!("DATABASE_REST_URL not set, using empty value");
                    String::new()
                }),
            database_api_key: env::var("DATABASE_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("DATABASE_API_KEY not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            storage_backend: env::var("STORAGE_BACKEND")
                .ok()
                .and_then(|raw| {
                    raw.parse()
                        .map_err(|e| warn!("{}, falling back to memory", e))
                        .ok()
                })
                .unwrap_or(StorageBackend::Memory),
            bind_address: env::var("BIND_ADDRESS")
                .ok()
                .and_then(|raw| {
                    raw.parse()
                        .map_err(|_| warn!("BIND_ADDRESS '{}' is not a socket address, using default", raw))
                        .ok()
                })
                .unwrap_or_else(default_bind_address),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    /// JWT validation needs a secret; the REST backend additionally needs an endpoint.
    pub fn is_configured(&self) -> bool {
        let storage_ready = match self.storage_backend {
            StorageBackend::Memory => true,
            StorageBackend::Postgrest => !self.database_rest_url.is_empty(),
        };

        storage_ready && !self.jwt_secret.is_empty()
    }
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}
