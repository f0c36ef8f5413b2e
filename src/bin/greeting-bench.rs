//! greeting-bench - load generator for the greeting server.

use clap::Parser;
use greeting::bench::{BenchConfig, run_bench};
use greeting::logging::{self, LogConfig, LogFormat};
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;

/// Run concurrent keep-alive clients against a greeting server.
#[derive(Parser, Debug)]
#[command(name = "greeting-bench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address of the server to load.
    #[arg(long, alias = "greeting_server_address", default_value = "127.0.0.1:3000")]
    server_address: String,

    /// Number of concurrent clients.
    #[arg(long, default_value_t = 32, value_parser = clap::value_parser!(u64).range(1..))]
    concurrent: u64,

    /// How long to run, in seconds.
    #[arg(long, alias = "bench_secs", default_value_t = 300)]
    bench_secs: u64,

    /// Runtime worker threads driving the clients.
    #[arg(long, alias = "tokio_worker_threads", default_value_t = 16)]
    worker_threads: usize,

    /// Enable verbose output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format: pretty, compact or json.
    #[arg(long, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

impl Cli {
    fn log_config(&self) -> LogConfig {
        let config = LogConfig::from_verbosity(self.verbose).with_format(self.log_format);
        match self.verbose {
            0 => config.with_env_overrides(),
            _ => {
                let level = config.level.to_string().to_lowercase();
                config.with_filter(level)
            }
        }
    }

    fn bench_config(&self) -> BenchConfig {
        BenchConfig {
            server_address: self.server_address.clone(),
            concurrent: usize::try_from(self.concurrent).unwrap_or(usize::MAX),
            duration: Duration::from_secs(self.bench_secs),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_config());

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cli.worker_threads.max(1))
        .thread_name("bench")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "创建运行时失败");
            return ExitCode::FAILURE;
        }
    };

    let config = cli.bench_config();
    let report = runtime.block_on(run_bench(&config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "监听 Ctrl+C 失败");
            std::future::pending::<()>().await;
        }
    }));

    println!("{}", report);
    ExitCode::SUCCESS
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
    fn test_cli_defaults_and_aliases() {
        let cli = Cli::try_parse_from(["greeting-bench"]).unwrap();
        let config = cli.bench_config();
        assert_eq!(config.server_address, "127.0.0.1:3000");
        assert_eq!(config.concurrent, 32);
        assert_eq!(config.duration, Duration::from_secs(300));

        let cli = Cli::try_parse_from([
            "greeting-bench",
            "--greeting_server_address",
            "10.0.0.1:8080",
            "--concurrent",
            "4",
            "--bench_secs",
            "10",
        ])
        .unwrap();
        let config = cli.bench_config();
        assert_eq!(config.server_address, "10.0.0.1:8080");
        assert_eq!(config.concurrent, 4);
        assert_eq!(config.duration, Duration::from_secs(10));

        assert!(Cli::try_parse_from(["greeting-bench", "--concurrent", "0"]).is_err());

        let cli = Cli::try_parse_from(["greeting-bench", "-vv"]).unwrap();
        assert_eq!(cli.log_config().filter.as_deref(), Some("trace"));
    }
}
