//! Greeting 性能基准测试
//!
//! 运行：`cargo bench --features benchmark`

use bytes::BytesMut;
use greeting_core::ConnectionIdGenerator;
use greeting_network::{ConnectionBalancer, HttpCodec, HttpResponse, Version};
use greeting_router::{Method, Reply, Router, query};
use tokio_util::codec::{Decoder, Encoder};

/// 基准测试辅助宏
macro_rules! bench {
    ($name:expr, $code:block) => {
        let start = std::time::Instant::now();
        let iterations = 10000;
        for _ in 0..iterations {
            $code
        }
        let duration = start.elapsed();
        let avg_ns = duration.as_nanos() / iterations as u128;
        println!("  {:30}: {:>8} ns/op ({} ops in {:?})",
            $name, avg_ns, iterations, duration);
    };
}

const REQUEST: &[u8] =
    b"GET /greeting?name=John%20Doe HTTP/1.1\r\nHost: localhost\r\nUser-Agent: bench\r\n\r\n";

fn main() {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("   Greeting 性能基准测试");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    bench_dispatch_primitives();
    bench_codec();
    bench_router();

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("   基准测试完成");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// 连接 ID 与轮询选择
fn bench_dispatch_primitives() {
    println!("\n📊 分发基准测试:");

    let ids = ConnectionIdGenerator::new();
    bench!("ConnectionIdGenerator::next()", {
        let _id = ids.next();
    });

    let balancer = ConnectionBalancer::new(8);
    bench!("ConnectionBalancer::next()", {
        let _worker = balancer.next_worker();
    });
}

/// HTTP 编解码
fn bench_codec() {
    println!("\n📊 HTTP 编解码基准测试:");

    let mut codec = HttpCodec::new();
    bench!("HttpCodec::decode()", {
        let mut buf = BytesMut::from(REQUEST);
        let _request = codec.decode(&mut buf);
    });

    bench!("HttpCodec::encode()", {
        let mut buf = BytesMut::new();
        let response = HttpResponse::from_reply(Reply::text("Hello John Doe"), Version::Http11, true);
        let _ = codec.encode(response, &mut buf);
    });
}

/// 查询串与路由
fn bench_router() {
    println!("\n📊 路由基准测试:");

    bench!("url_decode()", {
        let _name = query::url_decode("John%20Doe+%E4%BD%A0%E5%A5%BD");
    });

    bench!("find_param()", {
        let _name = query::find_param("a=1&b=2&name=World", "name");
    });

    let router = Router::greeting();
    let peer: std::net::SocketAddr = "127.0.0.1:40000".parse().unwrap();
    let id = greeting_core::ConnectionId::new(1);
    bench!("Router::dispatch()", {
        let _reply = router.dispatch(id, peer, &Method::Get, "/greeting?name=World");
    });
}
