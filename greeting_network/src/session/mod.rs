//! 会话状态机
//!
//! 每个连接一个会话，绑定在接收它的 worker 上，循环执行
//! 读取 → 分发 → 写出，直到连接结束或出错。
//!
//! 状态迁移：`Idle → Reading → Dispatching → Writing → (Reading | Closed)`，
//! 任何非终止状态都可以直接进入 `Closed`。

use crate::connection::{ConnectionId, ReactorMetrics, Registration, SessionState};
use crate::protocol::{HttpCodec, HttpError, HttpRequest, HttpResponse};
use crate::reactor::worker::WorkerContext;
use futures_util::{SinkExt, StreamExt};
use greeting_core::{GreetingError, GreetingErrorKind};
use greeting_router::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// 一次读取的结果
#[derive(Debug)]
enum ReadOutcome {
    /// 读到一个完整请求
    Request(HttpRequest),
    /// 对端关闭
    Eof,
    /// 读取或解析失败
    Failed(HttpError),
    /// worker 正在关闭
    Shutdown,
}

/// 连接会话
///
/// 独占持有连接。`run` 消费会话本身，会话随任务结束而释放，
/// 登记表中的表项同时移除。
pub struct Session<S> {
    id: ConnectionId,
    peer: SocketAddr,
    worker: usize,
    framed: Framed<S, HttpCodec>,
    router: Arc<Router>,
    state: SessionState,
    request: Option<HttpRequest>,
    response: Option<HttpResponse>,
    shutdown: CancellationToken,
    registration: Registration,
    metrics: Arc<ReactorMetrics>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// 创建绑定到 worker 的会话
    pub fn new(id: ConnectionId, peer: SocketAddr, stream: S, ctx: &WorkerContext) -> Self {
        let codec = HttpCodec::with_limits(ctx.config.max_head_size, ctx.config.max_body_size);
        let registration = ctx
            .registry
            .register(id, peer, ctx.id, ctx.metrics.clone());

        Self {
            id,
            peer,
            worker: ctx.id,
            framed: Framed::with_capacity(stream, codec, ctx.config.read_buffer_size),
            router: ctx.router.clone(),
            state: SessionState::Idle,
            request: None,
            response: None,
            shutdown: ctx.shutdown.clone(),
            registration,
            metrics: ctx.metrics.clone(),
        }
    }

    /// 连接 ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// 当前状态
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// 运行会话直到连接关闭
    pub async fn run(mut self) {
        self.transition(SessionState::Reading);

        loop {
            let outcome = self.do_read().await;
            if !self.on_read(outcome) {
                break;
            }

            self.dispatch();
            self.transition(SessionState::Writing);

            let result = self.do_write().await;
            if !self.on_write(result) {
                break;
            }

            self.transition(SessionState::Reading);
        }

        self.close().await;
    }

    async fn do_read(&mut self) -> ReadOutcome {
        // 上一轮的请求状态必须清空
        self.request = None;
        self.response = None;

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => ReadOutcome::Shutdown,
            frame = self.framed.next() => match frame {
                Some(Ok(request)) => ReadOutcome::Request(request),
                Some(Err(e)) => ReadOutcome::Failed(e),
                None => ReadOutcome::Eof,
            },
        }
    }

    fn on_read(&mut self, outcome: ReadOutcome) -> bool {
        match outcome {
            ReadOutcome::Request(request) => {
                trace!(method = %request.method, target = %request.target, "收到请求");
                self.request = Some(request);
                self.transition(SessionState::Dispatching);
                true
            }
            ReadOutcome::Eof => {
                debug!(conn = %self.id, "对端关闭连接");
                false
            }
            ReadOutcome::Failed(e) => {
                self.on_error(e);
                false
            }
            ReadOutcome::Shutdown => {
                debug!(conn = %self.id, "worker 关闭，结束空闲会话");
                false
            }
        }
    }

    fn dispatch(&mut self) {
        let Some(request) = self.request.as_ref() else {
            return;
        };

        let reply = self
            .router
            .dispatch(self.id, self.peer, &request.method, &request.target);
        self.metrics.record_response(reply.is_success());

        let keep_alive = request.keep_alive() && !self.shutdown.is_cancelled();
        self.response = Some(HttpResponse::from_reply(reply, request.version, keep_alive));
    }

    async fn do_write(&mut self) -> Result<bool, HttpError> {
        let Some(response) = self.response.take() else {
            return Ok(false);
        };
        let keep_alive = response.keep_alive;
        self.framed.send(response).await?;
        Ok(keep_alive)
    }

    fn on_write(&mut self, result: Result<bool, HttpError>) -> bool {
        match result {
            Ok(keep_alive) => {
                self.registration.record_request();
                if !keep_alive {
                    trace!(conn = %self.id, "非长连接，写完后关闭");
                    return false;
                }
                // 正在关闭的 worker 不再读取下一个请求
                !self.shutdown.is_cancelled()
            }
            Err(e) => {
                self.on_error(e);
                false
            }
        }
    }

    /// 记录会话错误；调用方随后关闭连接
    fn on_error(&self, err: HttpError) -> GreetingError {
        let err = GreetingError::from(err)
            .with_context(self.peer)
            .with_context(self.id);
        match err.kind() {
            GreetingErrorKind::Protocol => warn!(error = %err, "请求格式错误，关闭连接"),
            _ => debug!(error = %err, "连接读写失败"),
        }
        self.metrics.record_session_error();
        err
    }

    async fn close(&mut self) {
        self.transition(SessionState::Closed);
        if let Err(e) = self.framed.get_mut().shutdown().await {
            trace!(conn = %self.id, error = %e, "关闭写端失败");
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "非法状态迁移: {} -> {}",
            self.state,
            next
        );
        trace!(worker = self.worker, conn = %self.id, state = %next, "状态迁移");
        self.state = next;
        self.registration.set_state(next);
    }
}

impl<S> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("worker", &self.worker)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greeting_config::ReactorConfig;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, DuplexStream};
    use tokio::task::JoinHandle;

    fn context() -> WorkerContext {
        WorkerContext::new(
            0,
            Arc::new(Router::greeting()),
            Arc::new(ReactorMetrics::new()),
            ReactorConfig::default(),
        )
    }

    fn spawn_session(ctx: &WorkerContext, id: u64) -> (DuplexStream, JoinHandle<()>) {
        let (client, server) = tokio::io::duplex(4096);
        let session = Session::new(
            ConnectionId::new(id),
            "127.0.0.1:40000".parse().unwrap(),
            server,
            ctx,
        );
        (client, tokio::spawn(session.run()))
    }

    /// 读取一个带 Content-Length 的完整响应
    async fn read_response(client: &mut DuplexStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let text = String::from_utf8_lossy(&buf).into_owned();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| line.strip_prefix("Content-Length: "))
                    .map(|v| v.parse::<usize>().unwrap())
                    .unwrap();
                if buf.len() >= end + 4 + length {
                    return text;
                }
            }
            let n = client.read(&mut chunk).await.unwrap();
            assert!(n > 0, "连接提前关闭: {:?}", text);
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    #[tokio::test]
    async fn test_session_greeting() {
        let ctx = context();
        let (mut client, _task) = spawn_session(&ctx, 1);

        client
            .write_all(b"GET /greeting?name=World HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        let response = read_response(&mut client).await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(response.contains("Content-Length: 11\r\n"));
        assert!(response.ends_with("\r\n\r\nHello World"));
    }

    #[tokio::test]
    async fn test_session_keep_alive_resets_request() {
        let ctx = context();
        let (mut client, _task) = spawn_session(&ctx, 1);

        client
            .write_all(b"GET /greeting?name=John%20Doe HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        let first = read_response(&mut client).await;
        assert!(first.ends_with("Hello John Doe"));

        client
            .write_all(b"GET /greeting?foo=bar HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        let second = read_response(&mut client).await;
        assert!(second.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(second.ends_with("\r\n\r\nHello "));

        let info = ctx.registry.get(ConnectionId::new(1)).unwrap();
        assert_eq!(info.requests, 2);
        assert_eq!(ctx.metrics.requests(), 2);
    }

    #[tokio::test]
    async fn test_session_bad_request_keeps_connection() {
        let ctx = context();
        let (mut client, _task) = spawn_session(&ctx, 1);

        client
            .write_all(b"POST /greeting?name=World HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc")
            .await
            .unwrap();
        let first = read_response(&mut client).await;
        assert!(first.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(first.contains("Content-Length: 0\r\n"));
        assert!(!first.contains("Connection: close"));

        client
            .write_all(b"GET /greeting?name=again HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        let second = read_response(&mut client).await;
        assert!(second.ends_with("Hello again"));
        assert_eq!(ctx.metrics.bad_requests(), 1);
    }

    #[tokio::test]
    async fn test_session_connection_close() {
        let ctx = context();
        let (mut client, task) = spawn_session(&ctx, 1);

        client
            .write_all(b"GET /foo?name=World HTTP/1.1\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.contains("Connection: close\r\n"));

        task.await.unwrap();
        assert!(ctx.registry.is_empty());
        assert_eq!(ctx.metrics.current_sessions(), 0);
    }

    #[tokio::test]
    async fn test_session_http10_closes_by_default() {
        let ctx = context();
        let (mut client, task) = spawn_session(&ctx, 1);

        client
            .write_all(b"GET /greeting?name=old HTTP/1.0\r\n\r\n")
            .await
            .unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(response.ends_with("Hello old"));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_session_eof_closes() {
        let ctx = context();
        let (client, task) = spawn_session(&ctx, 9);

        // 等待会话进入 Reading
        tokio::task::yield_now().await;
        drop(client);

        task.await.unwrap();
        assert!(!ctx.registry.contains(ConnectionId::new(9)));
        assert_eq!(ctx.metrics.session_errors(), 0);
    }

    #[tokio::test]
    async fn test_session_malformed_syntax_closes() {
        let ctx = context();
        let (mut client, task) = spawn_session(&ctx, 1);

        client.write_all(b"NOT A VALID REQUEST LINE\r\n\r\n").await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert!(response.is_empty());

        task.await.unwrap();
        assert_eq!(ctx.metrics.session_errors(), 1);
    }

    #[tokio::test]
    async fn test_session_error_carries_context() {
        let ctx = context();
        let (_client, server) = tokio::io::duplex(64);
        let session = Session::new(
            ConnectionId::new(9),
            "127.0.0.1:40000".parse().unwrap(),
            server,
            &ctx,
        );

        let err = session.on_error(HttpError::BadRequestLine);
        assert_eq!(err.kind(), GreetingErrorKind::Protocol);
        assert_eq!(err.to_string(), "conn#9: peer 127.0.0.1:40000: 协议错误: 请求行格式错误");

        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert_eq!(session.on_error(HttpError::Io(reset)).kind(), GreetingErrorKind::Io);
        assert_eq!(ctx.metrics.session_errors(), 2);
    }

    #[tokio::test]
    async fn test_session_shutdown_while_reading() {
        let ctx = context();
        let (mut client, task) = spawn_session(&ctx, 1);

        tokio::task::yield_now().await;
        ctx.shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn test_session_state_registered() {
        let ctx = context();
        let (_client, _task) = spawn_session(&ctx, 4);

        tokio::task::yield_now().await;
        let info = ctx.registry.get(ConnectionId::new(4)).unwrap();
        assert_eq!(info.state, SessionState::Reading);
        assert_eq!(ctx.metrics.current_sessions(), 1);
    }
}
