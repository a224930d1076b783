use std::net::IpAddr;
use tracing_subscriber::EnvFilter;

fn default_log_level() -> String {
    "info".to_string()
}
fn default_download_dir() -> String {
    "downloads".to_string()
}
fn default_api_host() -> String {
    "127.0.0.1".to_string()
}
fn default_api_port() -> u16 {
    8090
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidBindHost(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBindHost(host) => write!(f, "invalid API bind host '{host}'"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub general: GeneralConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone)]
pub struct GeneralConfig {
    pub log_level: String,
    pub download_dir: String,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            download_dir: default_download_dir(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(level) = std::env::var("DATAHAUL_LOG") {
            config.general.log_level = level;
        }
        if let Ok(dir) = std::env::var("DATAHAUL_DOWNLOAD_DIR") {
            config.general.download_dir = dir;
        }
        if let Ok(host) = std::env::var("DATAHAUL_API_HOST") {
            config.api.host = host;
        }
        if let Ok(port) = std::env::var("DATAHAUL_API_PORT")
            && let Ok(port) = port.parse()
        {
            config.api.port = port;
        }
        config
    }
}

pub fn parse_api_bind_host(host: &str) -> Result<IpAddr, ConfigError> {
    host.parse::<IpAddr>()
        .map_err(|_| ConfigError::InvalidBindHost(host.to_string()))
}

pub fn init_tracing(config: &Config) {
    // Priority order:
    // 1) RUST_LOG (standard in Rust ecosystem)
    // 2) DATAHAUL_LOG via config
    // 3) default (info)
    let env_filter = std::env::var("RUST_LOG")
        .ok()
        .unwrap_or_else(|| config.general.log_level.clone());

    let filter = EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .compact()
        .init();
}
