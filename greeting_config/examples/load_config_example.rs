//! 配置加载示例
//!
//! 演示如何解析配置、应用环境变量覆盖并验证

use greeting_config::{GreetingConfig, ServerConfig};

const CONFIG: &str = r#"
[server]
bind_address = "127.0.0.1"
port = 8080
worker_threads = 4

[reactor]
backlog = 512
drain_timeout_ms = 500
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Greeting 配置加载示例 ===\n");

    // 示例 1: 使用默认配置
    println!("1. 使用默认配置:");
    let config = ServerConfig::default();
    println!("   地址: {}", config.bind_addr());
    println!("   工作线程: {:?}", config.worker_threads);
    println!();

    // 示例 2: 从 TOML 解析
    println!("2. 从 TOML 解析:");
    let config = GreetingConfig::from_toml_str(CONFIG)?;
    println!("{}", config.server.summary());
    println!("   排空等待: {:?}", config.reactor.drain_timeout());
    println!();

    // 示例 3: 环境变量覆盖（GREETING_PORT 等）
    println!("3. 应用环境变量覆盖:");
    let server = config.server.clone().load_with_env_override()?;
    println!("   地址: {}", server.bind_addr());
    println!();

    // 示例 4: 无效配置
    println!("4. 无效配置示例:");
    let invalid = ServerConfig {
        port: 0,
        ..Default::default()
    };
    match invalid.validate() {
        Ok(_) => println!("   ✓ 配置有效"),
        Err(e) => println!("   ✗ 配置无效: {}", e),
    }

    Ok(())
}
