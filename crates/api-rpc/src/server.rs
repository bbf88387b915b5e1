//! JSON-RPC Server
//!
//! Serves the method table over HTTP on localhost.

use crate::handler::RpcHandler;
use crate::rate_limiter::RateLimitConfig;
use crate::types::{AttemptsRequest, StartRequest, StatusRequest, StopRequest};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use provisio_core::application::JobController;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9627;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to register method: {0}")]
    Register(#[from] jsonrpsee::core::RegisterMethodError),
}

/// RPC Server Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
    pub rate_limit: RateLimitConfig,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, controller: Arc<JobController>) -> Self {
        let handler = Arc::new(RpcHandler::new(controller, config.rate_limit));
        Self { config, handler }
    }

    /// Method table backed by the handler
    pub fn module(&self) -> Result<RpcModule<()>, ServerError> {
        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module.register_async_method("vm.start.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req: Option<StartRequest> = params.parse()?;
                handler.start(req.unwrap_or_default()).await
            }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("vm.status.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req: Option<StatusRequest> = params.parse()?;
                handler.status(req.unwrap_or_default()).await
            }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("vm.stop.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req: StopRequest = params.parse()?;
                handler.stop(req).await
            }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("vm.attempts.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req: AttemptsRequest = params.parse()?;
                handler.attempts(req).await
            }
        })?;

        let handler = self.handler.clone();
        module.register_method("regions.list.v1", move |_, _, _| {
            Ok::<_, jsonrpsee::types::ErrorObjectOwned>(handler.regions())
        })?;

        let handler = self.handler.clone();
        module.register_async_method("admin.stats.v1", move |_, _, _| {
            let handler = handler.clone();
            async move { handler.stats().await }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("admin.health.v1", move |_, _, _| {
            let handler = handler.clone();
            async move { handler.health().await }
        })?;

        Ok(module)
    }

    /// Bind and start serving; returns the bound address and a stop handle
    ///
    /// Only binds where configured (localhost by default).
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let module = self.module()?;

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = server.local_addr().map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

        info!(
            addr = %local_addr,
            burst = self.config.rate_limit.burst,
            per_second = self.config.rate_limit.per_second,
            "JSON-RPC server started"
        );

        Ok((local_addr, server.start(module)))
    }
}
