//! Greeting 网络层
//!
//! Acceptor、Worker 池、会话状态机与 HTTP/1.x 编解码。

pub mod connection;
pub mod protocol;
pub mod reactor;
pub mod session;

// 导出主要类型到 crate root
pub use crate::connection::{ReactorMetrics, SessionRegistry};
pub use crate::protocol::{HttpCodec, HttpError, HttpRequest, HttpResponse, Version};
pub use crate::reactor::{
    Acceptor, ConnectionBalancer, EventLoopWorker, ReactorHandle, TcpReactor, WorkGuard,
    WorkerPool,
};
pub use crate::session::Session;
// 重新导出 greeting_core 的错误类型
pub use greeting_core::{GreetingError, Result};

// 预导出
pub mod prelude {
    pub use crate::reactor::{ReactorHandle, TcpReactor};
    pub use crate::connection::ReactorMetrics;
    pub use greeting_core::{GreetingError, Result};
}
