use anyhow::Result;
use envconfig::Envconfig;
use tracing::warn;

#[derive(Debug, Clone, Envconfig)]
pub struct AppConfig {
    // Worker/host identity
    #[envconfig(from = "WORKER", default = "worker0")]
    pub worker: String,

    #[envconfig(from = "HOST_INDEX", default = "host0")]
    pub host: String,

    // Platform router the fire calls go to
    #[envconfig(from = "ROUTER_HOST", default = "localhost")]
    pub router_host: String,

    // Optional `uuid:key` pair protecting the diagnostic endpoints
    #[envconfig(from = "ENDPOINT_AUTH")]
    pub endpoint_auth: Option<String>,

    // Server configuration
    #[envconfig(from = "SERVER_PORT", default = "8080")]
    pub server_port: u16,

    // Storage configuration
    #[envconfig(from = "STORAGE_TYPE", default = "memory")]
    pub storage_type: String,

    #[envconfig(from = "DB_URL", default = "http://localhost:5984")]
    pub db_url: String,

    #[envconfig(from = "DB_NAME", default = "costrigger")]
    pub db_name: String,

    #[envconfig(from = "DB_TIMEOUT", default = "30")]
    pub db_timeout_seconds: u64,

    // Coordination configuration; no REDIS_URL means single-host mode
    #[envconfig(from = "REDIS_URL")]
    pub redis_url: Option<String>,

    #[envconfig(from = "REDIS_KEY_PREFIX")]
    pub redis_key_prefix: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables only
    pub fn load_from_env() -> Result<Self> {
        Ok(Self::init_from_env()?)
    }

    // Helper methods to get derived configurations
    pub fn server(&self) -> ServerConfig {
        ServerConfig {
            port: self.server_port,
        }
    }

    pub fn storage(&self) -> StorageConfig {
        let storage_type = match self.storage_type.to_lowercase().as_str() {
            "couch" => StorageType::Couch,
            "memory" => StorageType::Memory,
            other => {
                warn!(
                    "Unrecognized storage type '{}', falling back to 'memory'.",
                    other
                );
                StorageType::Memory
            }
        };

        StorageConfig {
            storage_type: storage_type.clone(),
            couch: if matches!(storage_type, StorageType::Couch) {
                Some(CouchConfig {
                    url: self.db_url.clone(),
                    db_name: self.db_name.clone(),
                    timeout_seconds: self.db_timeout_seconds,
                })
            } else {
                None
            },
        }
    }

    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            worker: self.worker.clone(),
            host: self.host.clone(),
            key_prefix: self
                .redis_key_prefix
                .clone()
                .unwrap_or_else(|| self.db_name.clone()),
            redis_url: self.redis_url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone)]
pub enum StorageType {
    Memory,
    Couch,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub storage_type: StorageType,
    pub couch: Option<CouchConfig>,
}

#[derive(Debug, Clone)]
pub struct CouchConfig {
    pub url: String,
    pub db_name: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub worker: String,
    pub host: String,
    pub key_prefix: String,
    pub redis_url: Option<String>,
}
