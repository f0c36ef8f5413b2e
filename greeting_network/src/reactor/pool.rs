//! Worker 池
//!
//! 持有固定数量的事件循环 Worker，按轮询选择目标并投递新连接。

use crate::connection::ReactorMetrics;
use crate::reactor::balancer::ConnectionBalancer;
use crate::reactor::worker::{EventLoopWorker, NewConnection, WorkerContext};
use greeting_config::ReactorConfig;
use greeting_core::{GreetingError, Result};
use greeting_router::Router;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Worker 池
///
/// 池大小在创建后固定不变。
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<EventLoopWorker>,
    balancer: ConnectionBalancer,
    stopped: AtomicBool,
}

impl WorkerPool {
    /// 启动 `n` 个 worker
    pub fn start(
        n: usize,
        router: Arc<Router>,
        metrics: Arc<ReactorMetrics>,
        config: &ReactorConfig,
    ) -> Result<Self> {
        if n == 0 {
            return Err(GreetingError::config("worker 数量必须大于 0"));
        }

        let workers = (0..n)
            .map(|id| {
                let ctx = WorkerContext::new(id, router.clone(), metrics.clone(), config.clone());
                EventLoopWorker::start(ctx)
            })
            .collect::<Result<Vec<_>>>()?;

        info!(workers = n, "worker 池已启动");

        Ok(Self {
            workers,
            balancer: ConnectionBalancer::new(n),
            stopped: AtomicBool::new(false),
        })
    }

    /// 轮询选择下一个 worker
    pub fn next_worker(&self) -> &EventLoopWorker {
        &self.workers[self.balancer.next_worker()]
    }

    /// 将连接投递给指定 worker
    ///
    /// 立即返回，不等待会话结束。
    pub fn submit(&self, conn: NewConnection, worker: &EventLoopWorker) -> Result<()> {
        worker.submit(conn)
    }

    /// 按序号获取 worker
    pub fn worker(&self, id: usize) -> Option<&EventLoopWorker> {
        self.workers.get(id)
    }

    /// 所有 worker
    pub fn workers(&self) -> &[EventLoopWorker] {
        &self.workers
    }

    /// Worker 数量
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// 是否为空（启动成功的池永远不为空）
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// 所有 worker 上的存活会话数
    pub fn active_sessions(&self) -> usize {
        self.workers.iter().map(EventLoopWorker::active_sessions).sum()
    }

    /// 是否已停止
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// 停止所有 worker
    ///
    /// 释放全部 Work Guard 并 join 所有线程，重复调用无效果。
    /// 调用前 acceptor 必须已经停止投递。会阻塞调用线程。
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        info!(workers = self.workers.len(), "停止 worker 池");
        for worker in &self.workers {
            worker.release_guard();
        }
        for worker in &self.workers {
            worker.join();
        }
        info!("worker 池已停止");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}
