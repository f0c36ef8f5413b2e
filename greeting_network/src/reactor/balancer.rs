//! 连接均衡器
//!
//! 负责将新连接分配给不同的 Worker。

use std::sync::atomic::{AtomicUsize, Ordering};

/// 连接均衡器
///
/// 使用轮询算法将连接分配给 Worker。游标以原子方式推进，
/// 多个调用方并发选择时依然按 0..n-1 循环。
#[derive(Debug)]
pub struct ConnectionBalancer {
    /// Worker 数量
    worker_count: usize,
    /// 当前游标，始终小于 worker_count
    current: AtomicUsize,
}

impl ConnectionBalancer {
    /// 创建新的连接均衡器
    pub fn new(worker_count: usize) -> Self {
        assert!(worker_count > 0, "Worker count must be greater than 0");
        Self {
            worker_count,
            current: AtomicUsize::new(0),
        }
    }

    /// 获取下一个 Worker ID
    ///
    /// 返回当前游标，然后将游标推进一位（模 worker_count）。
    pub fn next_worker(&self) -> usize {
        let n = self.worker_count;
        match self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % n))
        {
            Ok(current) | Err(current) => current,
        }
    }

    /// 获取 Worker 数量
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}
