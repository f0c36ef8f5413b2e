//! 连接 ID、会话状态与连接信息
//!
//! 定义供 acceptor、worker 与会话共享的连接标识和状态类型。

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 连接唯一标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// 创建新的连接 ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// 获取内部值
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 连接 ID 生成器
///
/// 从 1 开始单调递增，可被多个线程同时调用。
#[derive(Debug)]
pub struct ConnectionIdGenerator {
    next_id: AtomicU64,
}

impl ConnectionIdGenerator {
    /// 创建新的生成器
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// 生成下一个 ID
    pub fn next(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// 会话状态
///
/// `Idle → Reading → Dispatching → Writing → (Reading | Closed)`，
/// 任何非终止状态都可以直接进入 `Closed`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// 已创建，尚未发起读取
    Idle,
    /// 等待一个完整请求
    Reading,
    /// 请求已解析，正在生成响应
    Dispatching,
    /// 正在写出响应
    Writing,
    /// 连接已关闭
    Closed,
}

impl SessionState {
    /// 检查状态迁移是否合法
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Reading)
                | (Reading, Dispatching)
                | (Dispatching, Writing)
                | (Writing, Reading)
                | (Idle | Reading | Dispatching | Writing, Closed)
        )
    }

    /// 是否为终止状态
    pub fn is_closed(self) -> bool {
        self == SessionState::Closed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Reading => "reading",
            SessionState::Dispatching => "dispatching",
            SessionState::Writing => "writing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// 连接信息
///
/// 会话登记表中保存的每连接元数据，不持有套接字本身。
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// 连接 ID
    pub id: ConnectionId,
    /// 远程地址
    pub remote_addr: SocketAddr,
    /// 所属 worker 序号
    pub worker: usize,
    /// 会话状态
    pub state: SessionState,
    /// 已处理的请求数
    pub requests: u64,
    /// 创建时间
    pub created_at: Instant,
    /// 最后活跃时间
    pub last_active: Instant,
}

impl ConnectionInfo {
    /// 创建新的连接信息
    pub fn new(id: ConnectionId, remote_addr: SocketAddr, worker: usize) -> Self {
        let now = Instant::now();
        Self {
            id,
            remote_addr,
            worker,
            state: SessionState::Idle,
            requests: 0,
            created_at: now,
            last_active: now,
        }
    }

    /// 更新状态与活跃时间
    pub fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.last_active = Instant::now();
    }

    /// 获取连接存活时间
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// 获取空闲时间
    pub fn idle_time(&self) -> Duration {
        self.last_active.elapsed()
    }
}
