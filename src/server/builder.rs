//! Server builder for the greeting service
//!
//! Collects configuration and routes, validates them once, and hands an
//! immutable configuration to the reactor.

use crate::Result;
use greeting_config::{ReactorConfig, ServerConfig};
use greeting_core::GreetingError;
use greeting_network::{ReactorHandle, TcpReactor};
use greeting_router::{RequestHandler, Router};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

/// Server builder
///
/// Starts with the `/greeting` route installed.
///
/// # Example
///
/// ```rust,no_run
/// use greeting::Server;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> greeting::Result<()> {
///     Server::bind("0.0.0.0:3000")
///         .workers(8)
///         .run()
///         .await
/// }
/// ```
#[derive(Debug)]
pub struct ServerBuilder {
    /// Server configuration
    config: ServerConfig,
    /// Reactor configuration
    reactor: ReactorConfig,
    /// Request router (not wrapped in Arc during building)
    router: Router,
    /// First error raised while adding routes
    route_error: Option<GreetingError>,
}

impl ServerBuilder {
    /// Create a new server builder with default configuration
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            reactor: ReactorConfig::default(),
            router: Router::greeting(),
            route_error: None,
        }
    }

    /// Bind to a specific address
    ///
    /// # Arguments
    ///
    /// * `addr` - Address to bind to (e.g., "127.0.0.1:3000" or "0.0.0.0:9000")
    pub fn bind(addr: impl Into<String>) -> Self {
        let (bind_address, port) = parse_addr(&addr.into());
        Self::new().config(ServerConfig {
            bind_address,
            port,
            ..Default::default()
        })
    }

    /// Set custom server configuration
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set custom reactor configuration
    pub fn reactor_config(mut self, reactor: ReactorConfig) -> Self {
        self.reactor = reactor;
        self
    }

    /// Set the number of worker threads
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.worker_threads = Some(workers);
        self
    }

    /// Wait up to `millis` for in-flight sessions on shutdown
    pub fn drain_timeout_ms(mut self, millis: u64) -> Self {
        self.reactor.drain_timeout_ms = millis;
        self
    }

    /// Add a request handler for `path`
    ///
    /// An invalid or duplicate path is reported when the server starts.
    pub fn route<H: RequestHandler>(mut self, path: &str, handler: H) -> Self {
        if let Err(e) = self.router.add_route(path, handler) {
            self.route_error.get_or_insert(e);
        }
        self
    }

    /// Validate the configuration and start accepting connections
    pub async fn start(self) -> Result<ReactorHandle> {
        if let Some(e) = self.route_error {
            return Err(e.into());
        }
        self.config.validate()?;
        self.reactor.validate()?;

        info!("{}", self.config.summary());

        let handle = TcpReactor::new(self.config, self.reactor)
            .with_router(Arc::new(self.router))
            .start()
            .await?;
        info!(addr = %handle.local_addr(), "Greeting 服务器已启动");
        Ok(handle)
    }

    /// Run until `signal` completes, then shut down
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?.wait_for(signal).await?;
        Ok(())
    }

    /// Run until SIGINT or SIGTERM
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Type alias for convenience
pub type Server = ServerBuilder;

/// Resolves on Ctrl+C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "无法监听 Ctrl+C 信号");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "无法安装 SIGTERM 信号处理器");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("收到 Ctrl+C 信号"),
        _ = terminate => info!("收到 SIGTERM 信号"),
    }
}

/// Parse address string into (host, port) tuple
///
/// A missing or unparsable port falls back to the default port.
fn parse_addr(addr: &str) -> (String, u16) {
    let default_port = ServerConfig::default().port;
    match addr.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().unwrap_or(default_port)),
        None => (addr.to_string(), default_port),
    }
}
