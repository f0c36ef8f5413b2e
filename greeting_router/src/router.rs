//! 路由系统
//!
//! 请求路径到处理器的映射，只接受 GET 请求。

use crate::context::{Context, Method};
use crate::handler::{GreetingHandler, HandlerOutcome, Reply, RequestHandler};
use crate::query::split_target;
use greeting_core::{ConnectionId, GreetingError, Result};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

/// 问候服务唯一的路由
pub const GREETING_PATH: &str = "/greeting";

/// 路由器
///
/// 构建完成后只读，由所有 worker 通过 `Arc` 共享。
#[derive(Default)]
pub struct Router {
    /// 路由表: path -> handler
    routes: HashMap<String, Arc<dyn RequestHandler>>,
}

impl Router {
    /// 创建空路由器
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// 只包含 `/greeting` 路由的路由器
    pub fn greeting() -> Self {
        let mut router = Self::new();
        router
            .routes
            .insert(GREETING_PATH.to_string(), Arc::new(GreetingHandler));
        router
    }

    /// 添加路由
    pub fn add_route<H: RequestHandler>(&mut self, path: &str, handler: H) -> Result<()> {
        if !path.starts_with('/') || path.contains('?') {
            return Err(GreetingError::router(format!("非法路由路径: {}", path)));
        }
        if self.routes.contains_key(path) {
            return Err(GreetingError::router(format!("路由已存在: {}", path)));
        }
        self.routes.insert(path.to_string(), Arc::new(handler));
        Ok(())
    }

    /// 查找路由
    pub fn get_route(&self, path: &str) -> Option<&Arc<dyn RequestHandler>> {
        self.routes.get(path)
    }

    /// 路由数量
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// 是否没有任何路由
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// 分发一个请求
    ///
    /// 以下情况直接返回 400，不调用处理器：
    /// - 方法不是 GET
    /// - 请求目标不是恰好一个 `<path>?<query>`
    /// - 路径没有注册
    ///
    /// 处理器返回 [`HandlerOutcome::Malformed`] 时同样返回 400。
    pub fn dispatch(
        &self,
        connection_id: ConnectionId,
        peer_addr: SocketAddr,
        method: &Method,
        target: &str,
    ) -> Reply {
        if *method != Method::Get {
            return Reply::bad_request();
        }

        let Some((path, query)) = split_target(target) else {
            return Reply::bad_request();
        };

        let Some(handler) = self.routes.get(path) else {
            return Reply::bad_request();
        };

        let ctx = Context::new(connection_id, peer_addr, method.clone(), path, query);
        match handler.handle(&ctx) {
            HandlerOutcome::Reply(reply) => reply,
            HandlerOutcome::Malformed => Reply::bad_request(),
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut paths: Vec<_> = self.routes.keys().collect();
        paths.sort();
        f.debug_struct("Router").field("routes", &paths).finish()
    }
}
