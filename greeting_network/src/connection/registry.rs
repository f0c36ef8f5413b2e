//! 会话登记表
//!
//! 每个 worker 一张表，以连接 ID 为键记录存活的会话。
//! 表项由 [`Registration`] 持有，会话进入 `Closed` 并被释放时自动移除。

use crate::connection::metrics::ReactorMetrics;
use greeting_core::{ConnectionId, ConnectionInfo, SessionState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

/// 会话登记表
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<ConnectionId, ConnectionInfo>>>,
}

impl SessionRegistry {
    /// 创建新的登记表
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个会话
    ///
    /// 返回的 [`Registration`] 被丢弃时表项移除，同时更新会话计数。
    pub fn register(
        &self,
        id: ConnectionId,
        remote_addr: SocketAddr,
        worker: usize,
        metrics: Arc<ReactorMetrics>,
    ) -> Registration {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, ConnectionInfo::new(id, remote_addr, worker));
        metrics.session_opened();

        Registration {
            registry: self.clone(),
            id,
            metrics,
        }
    }

    /// 获取会话信息
    pub fn get(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// 是否登记了该会话
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// 存活会话数量
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 所有会话信息的快照，按连接 ID 排序
    pub fn snapshot(&self) -> Vec<ConnectionInfo> {
        let mut sessions: Vec<_> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        sessions.sort_by_key(|info| info.id);
        sessions
    }

    fn update(&self, id: ConnectionId, f: impl FnOnce(&mut ConnectionInfo)) {
        if let Some(info) = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&id)
        {
            f(info);
        }
    }

    fn remove(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }
}

/// 会话在登记表中的表项
///
/// 只能由会话独占持有。
#[derive(Debug)]
pub struct Registration {
    registry: SessionRegistry,
    id: ConnectionId,
    metrics: Arc<ReactorMetrics>,
}

impl Registration {
    /// 连接 ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// 同步会话状态
    pub fn set_state(&self, state: SessionState) {
        self.registry.update(self.id, |info| info.set_state(state));
    }

    /// 记录一次已完成的请求
    pub fn record_request(&self) {
        self.registry.update(self.id, |info| info.requests += 1);
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.registry.remove(self.id).is_some() {
            self.metrics.session_closed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn test_registry_register_and_drop() {
        let registry = SessionRegistry::new();
        let metrics = Arc::new(ReactorMetrics::new());

        let registration = registry.register(ConnectionId::new(1), addr(), 0, metrics.clone());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(ConnectionId::new(1)));
        assert_eq!(metrics.current_sessions(), 1);

        drop(registration);
        assert!(registry.is_empty());
        assert_eq!(metrics.current_sessions(), 0);
        assert_eq!(metrics.total_sessions(), 1);
    }

    #[test]
    fn test_registration_updates_state() {
        let registry = SessionRegistry::new();
        let metrics = Arc::new(ReactorMetrics::new());
        let registration = registry.register(ConnectionId::new(7), addr(), 3, metrics);

        registration.set_state(SessionState::Reading);
        registration.record_request();

        let info = registry.get(ConnectionId::new(7)).unwrap();
        assert_eq!(info.state, SessionState::Reading);
        assert_eq!(info.requests, 1);
        assert_eq!(info.worker, 3);
    }

    #[test]
    fn test_registry_snapshot_sorted() {
        let registry = SessionRegistry::new();
        let metrics = Arc::new(ReactorMetrics::new());

        let _b = registry.register(ConnectionId::new(2), addr(), 0, metrics.clone());
        let _a = registry.register(ConnectionId::new(1), addr(), 0, metrics.clone());

        let ids: Vec<_> = registry.snapshot().iter().map(|info| info.id.value()).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
