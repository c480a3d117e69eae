//! Relay 指标收集模块
//!
//! 记录每轮读取/分发迭代的运行指标，并在内存中聚合以便输出摘要。

use std::collections::BTreeMap;
use std::time::Duration;

use contracts::BackendId;
use metrics::{counter, histogram};

/// 一轮迭代的采样
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationSample {
    /// 本轮读取的条目数
    pub batch_size: usize,
    /// 本轮耗时（不含节流休眠）
    pub elapsed: Duration,
    pub delivered: usize,
    pub failed: usize,
    pub poison: usize,
    /// 各后端本轮计入健康状态的失败数（未分配条目的后端不出现）
    pub backend_failures: Vec<(BackendId, usize)>,
}

/// 从迭代采样记录指标
///
/// 每轮迭代结束时调用一次（包括空批次）。
///
/// # Example
///
/// ```ignore
/// let report = pipeline.run_iteration().await;
/// observability::record_iteration_metrics(&report.sample());
/// ```
pub fn record_iteration_metrics(sample: &IterationSample) {
    counter!("mail_relay_iterations_total").increment(1);
    histogram!("mail_relay_batch_size").record(sample.batch_size as f64);
    histogram!("mail_relay_iteration_duration_ms").record(sample.elapsed.as_secs_f64() * 1000.0);

    if sample.batch_size == 0 {
        counter!("mail_relay_empty_iterations_total").increment(1);
    }
}

/// 迭代指标聚合器
#[derive(Debug, Clone, Default)]
pub struct RelayMetricsAggregator {
    /// 总迭代数
    pub iterations: u64,

    /// 空批次迭代数
    pub empty_iterations: u64,

    pub delivered: u64,
    pub failed: u64,
    pub poison: u64,

    /// 批次大小统计（仅非空批次）
    pub batch_stats: RunningStats,

    /// 迭代耗时统计 (毫秒)
    pub duration_stats: RunningStats,

    /// 各后端出现失败的迭代数
    pub failing_iterations: BTreeMap<BackendId, u64>,
}

impl RelayMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, sample: &IterationSample) {
        self.iterations += 1;
        self.duration_stats
            .push(sample.elapsed.as_secs_f64() * 1000.0);

        if sample.batch_size == 0 {
            self.empty_iterations += 1;
            return;
        }

        self.batch_stats.push(sample.batch_size as f64);
        self.delivered += sample.delivered as u64;
        self.failed += sample.failed as u64;
        self.poison += sample.poison as u64;

        for (backend, failures) in &sample.backend_failures {
            if *failures > 0 {
                *self.failing_iterations.entry(*backend).or_insert(0) += 1;
            }
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let attempted = self.delivered + self.failed;
        MetricsSummary {
            iterations: self.iterations,
            empty_iterations: self.empty_iterations,
            delivered: self.delivered,
            failed: self.failed,
            poison: self.poison,
            failure_rate: if attempted > 0 {
                self.failed as f64 / attempted as f64 * 100.0
            } else {
                0.0
            },
            batch_size: StatsSummary::from(&self.batch_stats),
            iteration_ms: StatsSummary::from(&self.duration_stats),
            failing_iterations: self.failing_iterations.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub iterations: u64,
    pub empty_iterations: u64,
    pub delivered: u64,
    pub failed: u64,
    pub poison: u64,
    pub failure_rate: f64,
    pub batch_size: StatsSummary,
    pub iteration_ms: StatsSummary,
    pub failing_iterations: BTreeMap<BackendId, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Relay Metrics Summary ===")?;
        writeln!(
            f,
            "Iterations: {} ({} empty)",
            self.iterations, self.empty_iterations
        )?;
        writeln!(f, "Delivered: {}", self.delivered)?;
        writeln!(f, "Failed: {} ({:.2}%)", self.failed, self.failure_rate)?;
        writeln!(f, "Poison dropped: {}", self.poison)?;
        writeln!(f, "Batch size: {}", self.batch_size)?;
        writeln!(f, "Iteration (ms): {}", self.iteration_ms)?;

        if !self.failing_iterations.is_empty() {
            writeln!(f, "Failing iterations per backend:")?;
            for (backend, count) in &self.failing_iterations {
                writeln!(f, "  {}: {}", backend, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
