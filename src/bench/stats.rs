//! 压测统计
//!
//! 成功/失败计数与固定桶延迟直方图，全部为原子计数器。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// 直方图桶上界（秒）
pub const LATENCY_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// 压测统计
#[derive(Debug, Default)]
pub struct BenchStats {
    success: AtomicU64,
    failure: AtomicU64,
    /// 每个桶的非累计计数，最后一格为 +Inf
    buckets: [AtomicU64; LATENCY_BUCKETS.len() + 1],
    latency_sum_us: AtomicU64,
    latency_max_us: AtomicU64,
}

impl BenchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次成功请求及其延迟
    pub fn record_success(&self, latency: Duration) {
        self.success.fetch_add(1, Ordering::Relaxed);
        self.observe(latency);
    }

    /// 记录一次失败请求
    ///
    /// 拿到了响应（非 200）时带上延迟；连接或 IO 失败时为 `None`。
    pub fn record_failure(&self, latency: Option<Duration>) {
        self.failure.fetch_add(1, Ordering::Relaxed);
        if let Some(latency) = latency {
            self.observe(latency);
        }
    }

    fn observe(&self, latency: Duration) {
        let secs = latency.as_secs_f64();
        let slot = LATENCY_BUCKETS
            .iter()
            .position(|bound| secs <= *bound)
            .unwrap_or(LATENCY_BUCKETS.len());
        self.buckets[slot].fetch_add(1, Ordering::Relaxed);

        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.latency_sum_us.fetch_add(micros, Ordering::Relaxed);
        self.latency_max_us.fetch_max(micros, Ordering::Relaxed);
    }

    pub fn success(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
    }

    pub fn failure(&self) -> u64 {
        self.failure.load(Ordering::Relaxed)
    }

    /// 生成报告快照
    pub fn report(&self, elapsed: Duration) -> BenchReport {
        let buckets = self
            .buckets
            .iter()
            .map(|count| count.load(Ordering::Relaxed))
            .collect::<Vec<_>>();
        BenchReport {
            success: self.success(),
            failure: self.failure(),
            samples: buckets.iter().sum(),
            buckets,
            latency_sum: Duration::from_micros(self.latency_sum_us.load(Ordering::Relaxed)),
            latency_max: Duration::from_micros(self.latency_max_us.load(Ordering::Relaxed)),
            elapsed,
        }
    }
}

/// 压测报告
#[derive(Debug, Clone)]
pub struct BenchReport {
    pub success: u64,
    pub failure: u64,
    /// 有延迟样本的请求数
    pub samples: u64,
    /// 每个桶的非累计计数
    pub buckets: Vec<u64>,
    pub latency_sum: Duration,
    pub latency_max: Duration,
    pub elapsed: Duration,
}

impl BenchReport {
    /// 总请求数
    pub fn total(&self) -> u64 {
        self.success + self.failure
    }

    /// 每秒成功请求数
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.success as f64 / secs
        } else {
            0.0
        }
    }

    /// 平均延迟
    pub fn mean_latency(&self) -> Duration {
        match self.samples {
            0 => Duration::ZERO,
            n => self.latency_sum / u32::try_from(n).unwrap_or(u32::MAX),
        }
    }

    /// 估算分位数：返回落入该分位的桶上界（秒），超出最后一个桶时为 `None`
    pub fn quantile_bound(&self, q: f64) -> Option<f64> {
        if self.samples == 0 {
            return None;
        }
        let rank = (q.clamp(0.0, 1.0) * self.samples as f64).ceil().max(1.0) as u64;
        let mut seen = 0;
        for (i, count) in self.buckets.iter().enumerate() {
            seen += count;
            if seen >= rank {
                return LATENCY_BUCKETS.get(i).copied();
            }
        }
        None
    }
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "压测结果 ({:.1?}):", self.elapsed)?;
        writeln!(f, " - 成功: {}", self.success)?;
        writeln!(f, " - 失败: {}", self.failure)?;
        writeln!(f, " - 吞吐: {:.1} req/s", self.throughput())?;
        writeln!(f, " - 平均延迟: {:.3?}", self.mean_latency())?;
        writeln!(f, " - 最大延迟: {:.3?}", self.latency_max)?;
        for q in [0.5, 0.9, 0.99] {
            match self.quantile_bound(q) {
                Some(bound) => writeln!(f, " - p{}: <= {}s", q * 100.0, bound)?,
                None if self.samples > 0 => writeln!(f, " - p{}: > 10s", q * 100.0)?,
                None => {}
            }
        }

        writeln!(f, "延迟直方图 (累计):")?;
        let mut cumulative = 0;
        for (i, count) in self.buckets.iter().enumerate() {
            cumulative += count;
            match LATENCY_BUCKETS.get(i) {
                Some(bound) => writeln!(f, "   le={:<6} {}", bound, cumulative)?,
                None => writeln!(f, "   le=+Inf   {}", cumulative)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = BenchStats::new();
        stats.record_success(Duration::from_millis(1));
        stats.record_success(Duration::from_millis(3));
        stats.record_failure(None);
        stats.record_failure(Some(Duration::from_millis(20)));

        let report = stats.report(Duration::from_secs(2));
        assert_eq!(report.success, 2);
        assert_eq!(report.failure, 2);
        assert_eq!(report.total(), 4);
        assert_eq!(report.samples, 3);
        assert_eq!(report.throughput(), 1.0);
        assert_eq!(report.mean_latency(), Duration::from_millis(8));
        assert_eq!(report.latency_max, Duration::from_millis(20));
    }

    #[test]
    fn test_bucket_placement() {
        let stats = BenchStats::new();
        stats.record_success(Duration::from_millis(5));
        stats.record_success(Duration::from_millis(6));
        stats.record_success(Duration::from_secs(11));

        let report = stats.report(Duration::from_secs(1));
        assert_eq!(report.buckets[0], 1); // le=0.005
        assert_eq!(report.buckets[1], 1); // le=0.01
        assert_eq!(report.buckets[LATENCY_BUCKETS.len()], 1); // +Inf
        assert_eq!(report.quantile_bound(0.5), Some(0.01));
        assert_eq!(report.quantile_bound(1.0), None);
    }

    #[test]
    fn test_empty_report() {
        let report = BenchStats::new().report(Duration::ZERO);
        assert_eq!(report.throughput(), 0.0);
        assert_eq!(report.mean_latency(), Duration::ZERO);
        assert_eq!(report.quantile_bound(0.99), None);

        let text = report.to_string();
        assert!(text.contains("成功: 0"));
        assert!(text.contains("le=+Inf   0"));
    }
}
