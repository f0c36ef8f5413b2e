//! greeting - multi-threaded event-loop HTTP greeting server.

use clap::Parser;
use greeting::logging::{self, LogConfig, LogFormat};
use greeting::{Result, Server};
use greeting_config::{GreetingConfig, ServerConfig, parse_worker_threads};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

/// Minimal concurrent HTTP greeting server.
#[derive(Parser, Debug)]
#[command(name = "greeting")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "GREETING_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long)]
    bind_address: Option<String>,

    /// Port to listen on.
    #[arg(short, long, alias = "bind-port")]
    port: Option<u16>,

    /// Number of worker event loops (a number or `auto`).
    #[arg(short, long, alias = "network-thread-number", value_parser = parse_workers)]
    workers: Option<WorkerThreads>,

    /// Milliseconds to wait for in-flight sessions on shutdown (0 = abandon).
    #[arg(long)]
    drain_timeout_ms: Option<u64>,

    /// Enable verbose output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format: pretty, compact or json.
    #[arg(long, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

/// Worker count given on the command line; `None` means one per CPU.
#[derive(Debug, Clone, Copy)]
struct WorkerThreads(Option<usize>);

fn parse_workers(value: &str) -> std::result::Result<WorkerThreads, String> {
    parse_worker_threads(value)
        .map(WorkerThreads)
        .ok_or_else(|| format!("invalid worker count '{}': expected a number or 'auto'", value))
}

impl Cli {
    fn log_config(&self) -> LogConfig {
        let config = LogConfig::from_verbosity(self.verbose).with_format(self.log_format);
        let level = config.level.to_string().to_lowercase();
        // -v 覆盖环境变量中的过滤器
        let config = match self.verbose {
            0 => config,
            _ => config.with_filter(level),
        };
        config.with_env_overrides()
    }

    /// defaults < config file < environment < command line
    fn load_config(&self) -> Result<GreetingConfig> {
        let mut config = match &self.config {
            Some(path) => GreetingConfig::from_file_with_env(path)?,
            None => GreetingConfig {
                server: ServerConfig::default().load_with_env_override()?,
                ..Default::default()
            },
        };

        if let Some(addr) = &self.bind_address {
            config.server.bind_address = addr.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(WorkerThreads(workers)) = self.workers {
            config.server.worker_threads = workers;
        }
        if let Some(millis) = self.drain_timeout_ms {
            config.reactor.drain_timeout_ms = millis;
        }

        Ok(config)
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;
    Server::new()
        .config(config.server)
        .reactor_config(config.reactor)
        .run()
        .await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_config());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "服务器启动失败");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_aliases() {
        let cli = Cli::try_parse_from([
            "greeting",
            "--bind-port",
            "8081",
            "--network-thread-number",
            "4",
            "--drain-timeout-ms",
            "250",
        ])
        .unwrap();
        assert_eq!(cli.port, Some(8081));
        assert!(matches!(cli.workers, Some(WorkerThreads(Some(4)))));

        let config = cli.load_config().unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.worker_threads, Some(4));
        assert_eq!(config.reactor.drain_timeout_ms, 250);
    }

    #[test]
    fn test_cli_workers_auto() {
        let cli = Cli::try_parse_from(["greeting", "--workers", "auto"]).unwrap();
        assert!(matches!(cli.workers, Some(WorkerThreads(None))));
        assert!(Cli::try_parse_from(["greeting", "--workers", "many"]).is_err());
    }

    #[test]
    fn test_cli_log_format() {
        let cli = Cli::try_parse_from(["greeting", "-vv", "--log-format", "json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.log_config().filter.as_deref(), Some("trace"));
    }

    #[test]
    fn test_cli_verbosity_beats_env_filter() {
        // 显式 -v 得到固定过滤器，环境变量不再生效
        let cli = Cli::try_parse_from(["greeting", "-v"]).unwrap();
        assert_eq!(cli.log_config().filter.as_deref(), Some("debug"));

        let quiet = Cli::try_parse_from(["greeting"]).unwrap();
        let filter = quiet.log_config().filter;
        let from_env = std::env::var("GREETING_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok();
        assert_eq!(filter, from_env);
    }
}
