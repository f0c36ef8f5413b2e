//! Load generator
//!
//! Runs a fixed number of keep-alive clients against `/greeting` until a
//! deadline or an external signal, then reports counters and a latency
//! histogram.

mod client;
mod stats;

pub use client::{GreetingClient, GreetingResponse, ResponseCodec};
pub use stats::{BenchReport, BenchStats, LATENCY_BUCKETS};

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Names cycled through by the clients.
pub const NAMES: &[&str] = &[
    "刘备",
    "关羽",
    "张飞",
    "Harry Potter",
    "Ronald Weasley",
    "Hermione Granger",
    "新垣結衣",
    "石原さとみ",
    "長澤まさみ",
];

/// Pause before reconnecting after a failed connect.
const RECONNECT_DELAY: Duration = Duration::from_millis(100);

/// Load generator settings.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// `host:port` of the greeting server.
    pub server_address: String,
    /// Number of concurrent clients.
    pub concurrent: usize,
    /// How long to run.
    pub duration: Duration,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:3000".to_string(),
            concurrent: 32,
            duration: Duration::from_secs(300),
        }
    }
}

/// Run the load generator until `config.duration` elapses or `shutdown` completes.
pub async fn run_bench<F>(config: &BenchConfig, shutdown: F) -> BenchReport
where
    F: Future<Output = ()>,
{
    let stats = Arc::new(BenchStats::new());
    let token = CancellationToken::new();
    let tracker = TaskTracker::new();
    let started = Instant::now();

    info!(
        server = %config.server_address,
        concurrent = config.concurrent,
        duration = ?config.duration,
        "开始压测"
    );

    for task in 0..config.concurrent {
        tracker.spawn(client_loop(
            task,
            config.server_address.clone(),
            stats.clone(),
            token.clone(),
        ));
    }
    tracker.close();

    tokio::select! {
        _ = shutdown => info!("收到停止信号"),
        _ = tokio::time::sleep(config.duration) => info!("压测时间到"),
    }

    token.cancel();
    tracker.wait().await;

    let report = stats.report(started.elapsed());
    info!(success = report.success, failure = report.failure, "压测结束");
    report
}

async fn client_loop(
    task: usize,
    addr: String,
    stats: Arc<BenchStats>,
    token: CancellationToken,
) {
    let mut client: Option<GreetingClient> = None;
    let mut next = task;

    while !token.is_cancelled() {
        if client.is_none() {
            let connected = tokio::select! {
                _ = token.cancelled() => return,
                result = GreetingClient::connect(&addr) => result,
            };
            match connected {
                Ok(conn) => client = Some(conn),
                Err(e) => {
                    warn!(task, error = %e, "连接服务端失败");
                    stats.record_failure(None);
                    tokio::select! {
                        _ = token.cancelled() => return,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                    continue;
                }
            }
        }
        let Some(conn) = client.as_mut() else {
            continue;
        };

        let name = NAMES[next % NAMES.len()];
        next += 1;

        let started = Instant::now();
        let result = tokio::select! {
            _ = token.cancelled() => return,
            result = conn.greet(name) => result,
        };

        match result {
            Ok(response) if response.status == 200 => {
                stats.record_success(started.elapsed());
                if conn.is_closed() {
                    client = None;
                }
            }
            Ok(response) => {
                warn!(task, status = response.status, "请求返回非 200 状态码");
                stats.record_failure(Some(started.elapsed()));
                if conn.is_closed() {
                    client = None;
                }
            }
            Err(e) => {
                debug!(task, error = %e, "请求失败，重新连接");
                stats.record_failure(None);
                client = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServerBuilder;

    fn free_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_bench_against_server() {
        let handle = ServerBuilder::bind(format!("127.0.0.1:{}", free_port()))
            .workers(2)
            .start()
            .await
            .unwrap();

        let config = BenchConfig {
            server_address: handle.local_addr().to_string(),
            concurrent: 4,
            duration: Duration::from_millis(300),
        };
        let report = run_bench(&config, std::future::pending()).await;

        assert!(report.success > 0);
        assert_eq!(report.failure, 0);
        assert_eq!(report.samples, report.success);
        assert!(handle.metrics().requests() >= report.success);
        assert_eq!(handle.metrics().bad_requests(), 0);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_bench_counts_connect_failures() {
        let config = BenchConfig {
            server_address: format!("127.0.0.1:{}", free_port()),
            concurrent: 2,
            duration: Duration::from_millis(250),
        };
        let report = run_bench(&config, std::future::pending()).await;

        assert_eq!(report.success, 0);
        assert!(report.failure >= 2);
        assert_eq!(report.samples, 0);
    }

    #[tokio::test]
    async fn test_bench_stops_on_signal() {
        let config = BenchConfig {
            server_address: format!("127.0.0.1:{}", free_port()),
            concurrent: 1,
            duration: Duration::from_secs(60),
        };
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            run_bench(&config, tokio::time::sleep(Duration::from_millis(50))),
        )
        .await
        .unwrap();
        assert!(report.elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_client_greets_with_encoded_name() {
        let handle = ServerBuilder::bind(format!("127.0.0.1:{}", free_port()))
            .workers(1)
            .start()
            .await
            .unwrap();

        let mut client = GreetingClient::connect(&handle.local_addr().to_string())
            .await
            .unwrap();
        for name in ["Harry Potter", "刘备"] {
            let response = client.greet(name).await.unwrap();
            assert_eq!(response.status, 200);
            assert_eq!(response.body, format!("Hello {}", name).into_bytes());
            assert!(!client.is_closed());
        }

        handle.shutdown().await.unwrap();
    }
}
