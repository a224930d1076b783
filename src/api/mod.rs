//! JSON-over-HTTP surface of the orchestrator.

use std::net::SocketAddr;

use crate::config::ApiConfig;
use crate::transfer::DataTransferService;

pub(crate) mod error;
mod handlers;
mod router;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    Config(crate::config::ConfigError),
    Bind(std::io::Error),
    Serve(std::io::Error),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(source) => write!(f, "{source}"),
            Self::Bind(source) => write!(f, "failed to bind API listener: {source}"),
            Self::Serve(source) => write!(f, "API server failed: {source}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(source) => Some(source),
            Self::Bind(source) => Some(source),
            Self::Serve(source) => Some(source),
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub(crate) service: DataTransferService,
}

pub async fn serve(cfg: &ApiConfig, service: DataTransferService) -> ApiResult<()> {
    let bind_ip = crate::config::parse_api_bind_host(&cfg.host).map_err(ApiError::Config)?;
    let addr = SocketAddr::new(bind_ip, cfg.port);

    let state = ApiState { service };
    let app = router::build_app(state);

    tracing::info!(addr = %addr, "api server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(ApiError::Bind)?;
    axum::serve(listener, app).await.map_err(ApiError::Serve)?;
    Ok(())
}
