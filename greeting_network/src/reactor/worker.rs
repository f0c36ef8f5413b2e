//! 事件循环 Worker
//!
//! 每个 worker 是一个名为 `network_{i}` 的 OS 线程，线程内运行一个
//! tokio 单线程运行时。新连接经由无界信箱投递，会话在 worker 自己的
//! 运行时上生成并一直绑定在该 worker 上。

use crate::connection::{ConnectionId, ReactorMetrics, SessionRegistry};
use crate::session::Session;
use greeting_config::ReactorConfig;
use greeting_core::{ErrorContext, GreetingError, Result};
use greeting_router::Router;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// 新连接消息
///
/// 套接字以标准库形式跨线程传递，由目标 worker 注册到自己的运行时。
#[derive(Debug)]
pub struct NewConnection {
    /// 连接 ID
    pub id: ConnectionId,
    /// TCP 流
    pub stream: std::net::TcpStream,
    /// 远程地址
    pub remote_addr: SocketAddr,
}

/// Worker 共享上下文
///
/// 由 worker 持有，并复制给它生成的每个会话。
#[derive(Debug, Clone)]
pub struct WorkerContext {
    /// Worker 序号
    pub id: usize,
    /// 请求路由
    pub router: Arc<Router>,
    /// 本 worker 的会话登记表
    pub registry: SessionRegistry,
    /// 全局指标
    pub metrics: Arc<ReactorMetrics>,
    /// 本 worker 的关闭令牌
    pub shutdown: CancellationToken,
    /// Reactor 配置
    pub config: ReactorConfig,
}

impl WorkerContext {
    /// 创建新的上下文
    pub fn new(
        id: usize,
        router: Arc<Router>,
        metrics: Arc<ReactorMetrics>,
        config: ReactorConfig,
    ) -> Self {
        Self {
            id,
            router,
            registry: SessionRegistry::new(),
            metrics,
            shutdown: CancellationToken::new(),
            config,
        }
    }
}

/// Work Guard
///
/// 存在期间事件循环不会因为没有待处理 IO 而退出。
/// 释放一次后失效；被丢弃时自动释放。
#[derive(Debug)]
pub struct WorkGuard {
    release: Option<oneshot::Sender<()>>,
}

impl WorkGuard {
    fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { release: Some(tx) }, rx)
    }

    /// 释放 guard，允许事件循环退出
    pub fn release(&mut self) {
        if let Some(tx) = self.release.take() {
            // 循环已经退出时接收端不存在
            let _ = tx.send(());
        }
    }

    /// 是否已释放
    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// 事件循环 Worker
#[derive(Debug)]
pub struct EventLoopWorker {
    id: usize,
    sender: mpsc::UnboundedSender<NewConnection>,
    guard: Mutex<Option<WorkGuard>>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
    submitted: AtomicU64,
    registry: SessionRegistry,
}

impl EventLoopWorker {
    /// 启动 worker 线程
    ///
    /// 运行时在调用线程上构建，构建失败或线程创建失败都作为启动错误返回。
    pub fn start(ctx: WorkerContext) -> Result<Self> {
        let id = ctx.id;
        let registry = ctx.registry.clone();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                GreetingError::network(format!("创建运行时失败: {}", e))
                    .with_context(ErrorContext::Worker(id))
            })?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let (guard, released) = WorkGuard::new();

        let thread = thread::Builder::new()
            .name(format!("network_{}", id))
            .spawn(move || {
                runtime.block_on(event_loop(ctx, receiver, released));
                // 运行时在此处被丢弃，仍未结束的会话随之放弃
            })
            .map_err(|e| {
                GreetingError::network(format!("创建线程失败: {}", e))
                    .with_context(ErrorContext::Worker(id))
            })?;

        Ok(Self {
            id,
            sender,
            guard: Mutex::new(Some(guard)),
            thread: Mutex::new(Some(thread)),
            submitted: AtomicU64::new(0),
            registry,
        })
    }

    /// Worker 序号
    pub fn id(&self) -> usize {
        self.id
    }

    /// 投递一个新连接
    ///
    /// 不阻塞，也不等待会话结束。worker 已停止时返回错误，连接随之关闭。
    pub fn submit(&self, conn: NewConnection) -> Result<()> {
        let conn_id = conn.id;
        self.sender.send(conn).map_err(|_| {
            GreetingError::connection("worker 已停止")
                .with_context(ErrorContext::Worker(self.id))
                .with_context(conn_id)
        })?;
        self.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// 已投递的连接数
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// 存活会话数
    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }

    /// 本 worker 的会话登记表
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// 释放 Work Guard
    pub fn release_guard(&self) {
        if let Some(mut guard) = self.guard.lock().unwrap_or_else(PoisonError::into_inner).take() {
            guard.release();
        }
    }

    /// 等待线程退出
    ///
    /// 只有第一次调用会真正 join。
    pub fn join(&self) {
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!(worker = self.id, "worker 线程异常退出");
            }
        }
    }
}

async fn event_loop(
    ctx: WorkerContext,
    mut receiver: mpsc::UnboundedReceiver<NewConnection>,
    mut released: oneshot::Receiver<()>,
) {
    info!(worker = ctx.id, "worker 启动");
    let tracker = TaskTracker::new();

    loop {
        tokio::select! {
            biased;
            _ = &mut released => break,
            conn = receiver.recv() => match conn {
                Some(conn) => spawn_session(&ctx, &tracker, conn),
                None => break,
            },
        }
    }

    // 信箱中尚未取出的连接直接关闭
    receiver.close();
    tracker.close();
    ctx.shutdown.cancel();

    let drain = ctx.config.drain_timeout();
    if !drain.is_zero() && !tracker.is_empty() {
        info!(worker = ctx.id, sessions = tracker.len(), "等待在途会话结束");
        if tokio::time::timeout(drain, tracker.wait()).await.is_err() {
            warn!(
                worker = ctx.id,
                sessions = tracker.len(),
                "等待超时，放弃剩余会话"
            );
        }
    } else if !tracker.is_empty() {
        debug!(worker = ctx.id, sessions = tracker.len(), "放弃在途会话");
    }

    info!(worker = ctx.id, "worker 停止");
}

fn spawn_session(ctx: &WorkerContext, tracker: &TaskTracker, conn: NewConnection) {
    let NewConnection {
        id,
        stream,
        remote_addr,
    } = conn;

    let stream = match stream
        .set_nonblocking(true)
        .and_then(|()| TcpStream::from_std(stream))
    {
        Ok(stream) => stream,
        Err(e) => {
            warn!(worker = ctx.id, conn = %id, peer = %remote_addr, error = %e, "注册连接失败");
            ctx.metrics.record_session_error();
            return;
        }
    };

    let span = info_span!("session", worker = ctx.id, conn = %id, peer = %remote_addr);
    let session = Session::new(id, remote_addr, stream, ctx);
    tracker.spawn(session.run().instrument(span));
}
