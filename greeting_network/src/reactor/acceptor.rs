//! 连接接受器
//!
//! 独占监听套接字，逐个接受新连接并投递给 Worker 池。

use crate::connection::{ConnectionIdGenerator, ReactorMetrics};
use crate::reactor::pool::WorkerPool;
use crate::reactor::worker::NewConnection;
use greeting_core::{GreetingError, Result};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 连接接受器
///
/// 同一时刻只有一个未完成的 accept。
#[derive(Debug)]
pub struct Acceptor {
    /// TCP 监听器
    listener: TcpListener,
    /// Worker 池
    pool: Arc<WorkerPool>,
    /// 连接 ID 生成器
    ids: ConnectionIdGenerator,
    /// 指标
    metrics: Arc<ReactorMetrics>,
}

impl Acceptor {
    /// 打开监听套接字
    ///
    /// 依次创建套接字、开启地址复用、绑定、监听。任何一步失败都会记录日志
    /// 并返回错误，不会留下无法工作的 acceptor。
    pub fn open(
        addr: SocketAddr,
        backlog: u32,
        pool: Arc<WorkerPool>,
        metrics: Arc<ReactorMetrics>,
    ) -> Result<Self> {
        let listener = listen(addr, backlog).map_err(|(step, e)| {
            error!(addr = %addr, error = %e, "{}失败", step);
            GreetingError::network(format!("{}失败: {}", step, e))
                .with_context(("bind_addr", addr.to_string()))
        })?;

        info!(addr = %addr, backlog, "开始监听");

        Ok(Self {
            listener,
            pool,
            ids: ConnectionIdGenerator::new(),
            metrics,
        })
    }

    /// 实际监听的地址
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// 运行 accept 循环，直到 `shutdown` 被取消
    ///
    /// 取消时正在进行的 accept 被放弃，监听套接字随 acceptor 一起关闭。
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = self.listener.accept() => self.on_accept(result),
            }
        }
        info!("acceptor 已停止");
    }

    /// 处理一次 accept 的结果
    ///
    /// 错误只记录日志，调用方随后继续 accept。持续性的错误（例如文件描述符
    /// 耗尽）会导致紧密的重试循环。
    pub(crate) fn on_accept(&self, result: io::Result<(TcpStream, SocketAddr)>) {
        let (stream, peer) = match result {
            Ok(accepted) => accepted,
            Err(e) => {
                self.metrics.record_accept_error();
                warn!(error = %e, "accept 失败");
                return;
            }
        };

        self.metrics.record_accepted();
        let id = self.ids.next();

        let stream = match stream.into_std() {
            Ok(stream) => stream,
            Err(e) => {
                warn!(conn = %id, peer = %peer, error = %e, "无法移交连接");
                return;
            }
        };

        let worker = self.pool.next_worker();
        debug!(conn = %id, peer = %peer, worker = worker.id(), "接受新连接");

        let conn = NewConnection {
            id,
            stream,
            remote_addr: peer,
        };
        if let Err(e) = self.pool.submit(conn, worker) {
            warn!(conn = %id, error = %e, "投递连接失败");
        }
    }
}

fn listen(addr: SocketAddr, backlog: u32) -> std::result::Result<TcpListener, (&'static str, io::Error)> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(|e| ("创建套接字", e))?;

    socket
        .set_reuseaddr(true)
        .map_err(|e| ("设置地址复用", e))?;
    socket.bind(addr).map_err(|e| ("绑定地址", e))?;
    socket.listen(backlog).map_err(|e| ("监听", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use greeting_config::ReactorConfig;
    use greeting_router::Router;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn pool(n: usize, metrics: Arc<ReactorMetrics>) -> Arc<WorkerPool> {
        Arc::new(
            WorkerPool::start(
                n,
                Arc::new(Router::greeting()),
                metrics,
                &ReactorConfig::default(),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_acceptor_open_fails_on_used_port() {
        let metrics = Arc::new(ReactorMetrics::new());
        let pool = pool(1, metrics.clone());

        let first = Acceptor::open("127.0.0.1:0".parse().unwrap(), 16, pool.clone(), metrics.clone())
            .unwrap();
        let addr = first.local_addr().unwrap();

        // 已有监听者时 SO_REUSEADDR 不允许再次监听同一地址
        let err = Acceptor::open(addr, 16, pool.clone(), metrics).unwrap_err();
        assert_eq!(err.kind(), greeting_core::GreetingErrorKind::Network);
        assert!(err.to_string().contains("bind_addr"));

        drop(first);
        tokio::task::spawn_blocking(move || pool.stop()).await.unwrap();
    }

    #[tokio::test]
    async fn test_transient_accept_error_does_not_stop_loop() {
        let metrics = Arc::new(ReactorMetrics::new());
        let pool = pool(2, metrics.clone());
        let acceptor =
            Acceptor::open("127.0.0.1:0".parse().unwrap(), 16, pool.clone(), metrics.clone())
                .unwrap();
        let addr = acceptor.local_addr().unwrap();

        acceptor.on_accept(Err(io::Error::new(io::ErrorKind::ConnectionAborted, "模拟")));
        assert_eq!(metrics.accept_errors(), 1);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(acceptor.run(shutdown.clone()));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /greeting?name=World HTTP/1.1\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.ends_with("Hello World"));
        assert_eq!(metrics.accepted(), 1);

        shutdown.cancel();
        task.await.unwrap();
        tokio::task::spawn_blocking(move || pool.stop()).await.unwrap();
    }
}
