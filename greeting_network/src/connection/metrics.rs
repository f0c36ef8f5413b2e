//! Reactor 指标
//!
//! 收集 acceptor 与会话的计数，全部为单调递增或成对增减的原子计数器。

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Reactor 指标
#[derive(Debug, Default)]
pub struct ReactorMetrics {
    /// 已接受的连接数
    accepted: AtomicU64,
    /// accept 失败次数
    accept_errors: AtomicU64,
    /// 当前会话数
    current_sessions: AtomicUsize,
    /// 总会话数（累计）
    total_sessions: AtomicU64,
    /// 已响应的请求数
    requests: AtomicU64,
    /// 400 响应数
    bad_requests: AtomicU64,
    /// 因 IO 或协议错误关闭的会话数
    session_errors: AtomicU64,
}

impl ReactorMetrics {
    /// 创建新的指标
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次成功 accept
    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录一次 accept 失败
    pub fn record_accept_error(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// 会话开始
    pub fn session_opened(&self) {
        self.current_sessions.fetch_add(1, Ordering::Relaxed);
        self.total_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// 会话结束
    pub fn session_closed(&self) {
        self.current_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    /// 记录一次响应
    pub fn record_response(&self, success: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.bad_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// 记录一次会话错误
    pub fn record_session_error(&self) {
        self.session_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn accept_errors(&self) -> u64 {
        self.accept_errors.load(Ordering::Relaxed)
    }

    pub fn current_sessions(&self) -> usize {
        self.current_sessions.load(Ordering::Relaxed)
    }

    pub fn total_sessions(&self) -> u64 {
        self.total_sessions.load(Ordering::Relaxed)
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn bad_requests(&self) -> u64 {
        self.bad_requests.load(Ordering::Relaxed)
    }

    pub fn session_errors(&self) -> u64 {
        self.session_errors.load(Ordering::Relaxed)
    }

    /// 生成摘要报告
    pub fn summary(&self) -> String {
        format!(
            "Reactor 指标:\n\
             - 已接受连接: {}\n\
             - accept 失败: {}\n\
             - 当前会话: {}\n\
             - 总会话数: {}\n\
             - 请求数: {}\n\
             - 400 响应: {}\n\
             - 会话错误: {}",
            self.accepted(),
            self.accept_errors(),
            self.current_sessions(),
            self.total_sessions(),
            self.requests(),
            self.bad_requests(),
            self.session_errors()
        )
    }
}
