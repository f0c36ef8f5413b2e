//! Reactor 模式实现
//!
//! 一个 acceptor 加上固定数量的事件循环 worker。

pub mod acceptor;
pub mod balancer;
pub mod pool;
pub mod reactor;
pub mod worker;

// 重新导出主要类型
pub use acceptor::Acceptor;
pub use balancer::ConnectionBalancer;
pub use pool::WorkerPool;
pub use reactor::{ReactorHandle, TcpReactor};
pub use worker::{EventLoopWorker, NewConnection, WorkGuard, WorkerContext};
