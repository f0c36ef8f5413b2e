//! TCP Reactor 实现
//!
//! Reactor 模式的主入口：启动 Worker 池，打开 Acceptor，
//! 并在关闭信号到来时按顺序停止两者。

use crate::connection::ReactorMetrics;
use crate::reactor::acceptor::Acceptor;
use crate::reactor::pool::WorkerPool;
use greeting_config::{MAX_WORKER_THREADS, ReactorConfig, ServerConfig};
use greeting_core::{GreetingError, Result};
use greeting_router::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// TCP Reactor
///
/// 基于 Reactor 模式的 TCP 服务器
#[derive(Debug)]
pub struct TcpReactor {
    /// 服务器配置
    server_config: ServerConfig,
    /// Reactor 配置
    reactor_config: ReactorConfig,
    /// 请求路由
    router: Arc<Router>,
}

impl TcpReactor {
    /// 创建新的 TCP Reactor
    pub fn new(server_config: ServerConfig, reactor_config: ReactorConfig) -> Self {
        Self {
            server_config,
            reactor_config,
            router: Arc::new(Router::greeting()),
        }
    }

    /// 使用默认配置创建
    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default(), ReactorConfig::default())
    }

    /// 替换请求路由
    pub fn with_router(mut self, router: Arc<Router>) -> Self {
        self.router = router;
        self
    }

    /// 获取服务器配置
    pub fn server_config(&self) -> &ServerConfig {
        &self.server_config
    }

    /// 获取 Reactor 配置
    pub fn reactor_config(&self) -> &ReactorConfig {
        &self.reactor_config
    }

    /// 实际使用的 worker 数量
    pub fn worker_count(&self) -> usize {
        self.server_config.worker_threads.unwrap_or_else(num_cpus::get)
    }

    /// 启动 Reactor
    ///
    /// 先启动 Worker 池再打开监听套接字，任何一步失败都返回错误。
    /// 返回时已经开始接受连接。
    pub async fn start(self) -> Result<ReactorHandle> {
        self.reactor_config
            .validate()
            .map_err(|e| GreetingError::config(e.to_string()))?;

        let worker_count = self.worker_count();
        if worker_count == 0 || worker_count > MAX_WORKER_THREADS {
            return Err(GreetingError::config(format!(
                "worker 数量必须在 1 到 {} 之间，当前为 {}",
                MAX_WORKER_THREADS, worker_count
            )));
        }

        let bind_addr = self.server_config.bind_addr();
        let addr = resolve(&bind_addr).await?;

        info!(
            addr = %addr,
            workers = worker_count,
            backlog = self.reactor_config.backlog,
            drain_timeout_ms = self.reactor_config.drain_timeout_ms,
            "Greeting Reactor 启动"
        );

        let metrics = Arc::new(ReactorMetrics::new());
        let pool = Arc::new(WorkerPool::start(
            worker_count,
            self.router.clone(),
            metrics.clone(),
            &self.reactor_config,
        )?);

        let acceptor = Acceptor::open(
            addr,
            self.reactor_config.backlog,
            pool.clone(),
            metrics.clone(),
        )?;
        let local_addr = acceptor.local_addr()?;

        let shutdown = CancellationToken::new();
        let acceptor = tokio::spawn(acceptor.run(shutdown.clone()));

        Ok(ReactorHandle {
            local_addr,
            metrics,
            pool,
            shutdown,
            acceptor,
        })
    }

    /// 启动并运行直到 `signal` 完成，然后关闭
    pub async fn run<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?.wait_for(signal).await
    }
}

/// 运行中的 Reactor 句柄
#[derive(Debug)]
pub struct ReactorHandle {
    local_addr: SocketAddr,
    metrics: Arc<ReactorMetrics>,
    pool: Arc<WorkerPool>,
    shutdown: CancellationToken,
    acceptor: JoinHandle<()>,
}

impl ReactorHandle {
    /// 实际监听地址（端口为 0 时返回分配到的端口）
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Reactor 指标
    pub fn metrics(&self) -> Arc<ReactorMetrics> {
        self.metrics.clone()
    }

    /// Worker 池
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// 关闭令牌，取消后 `wait_for` 立即开始关闭
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 关闭 Reactor
    ///
    /// 先停止 acceptor（不再接受新连接），再停止 Worker 池。
    pub async fn shutdown(self) -> Result<()> {
        info!("停止接受新连接");
        self.shutdown.cancel();
        if let Err(e) = self.acceptor.await {
            warn!(error = %e, "acceptor 任务异常结束");
        }

        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || pool.stop())
            .await
            .map_err(|e| GreetingError::network(format!("停止 worker 池失败: {}", e)))?;

        info!("{}", self.metrics.summary());
        Ok(())
    }

    /// 等待 `signal` 完成或关闭令牌被取消，然后关闭
    pub async fn wait_for<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let token = self.shutdown.clone();
        tokio::select! {
            _ = signal => info!("收到关闭信号"),
            _ = token.cancelled() => {}
        }
        self.shutdown().await
    }
}

async fn resolve(bind_addr: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(bind_addr)
        .await
        .map_err(|e| {
            GreetingError::network(format!("解析地址失败: {}", e))
                .with_context(("bind_addr", bind_addr))
        })?
        .next()
        .ok_or_else(|| {
            GreetingError::network("地址没有可用的解析结果").with_context(("bind_addr", bind_addr))
        })
}
