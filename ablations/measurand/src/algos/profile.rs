//! 测量量运行统计.

use dpn_berry::PsdComparison;
use std::time::{Duration, Instant};

/// ablation/benchmark 计时器.
///
/// 该计时器支持 "中途中断" 与 "结束中断, 继续开始计时".
#[derive(Clone, Debug)]
struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器. 初始化时会视为已经开始计时 (`self.start()`).
    #[inline]
    fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: Instant::now(),
        }
    }

    /// 开始计时.
    #[inline]
    fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时, 并将这一区间的时间累加. 返回本轮计时时长.
    ///
    /// # 注意
    ///
    /// 上一次调用必须是 `self.start()`, 否则计算时间值无意义.
    #[inline]
    fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    /// 获得总共累计下来的时间 (以微秒为单位).
    #[inline]
    fn get_total_us(&self) -> u64 {
        self.consumed.as_micros() as u64
    }
}

/// 单个测量量的运行统计.
#[derive(Clone, Debug)]
pub struct Profile {
    /// 没有任何实例的图像个数.
    trivial: u64,

    /// 含有实例的图像个数.
    target: u64,

    /// 测得的实例个数.
    measured: u64,

    /// 因几何退化被跳过的实例个数.
    skipped: u64,

    /// 测量含实例图像花费的总时间.
    target_time: AccTimer,

    /// 整个任务花费的总时间.
    real_time: AccTimer,

    /// 最耗时的一幅图像所消耗的时间.
    most: Option<Duration>,

    /// 与参考粒径分布的比较.
    comparison: Option<PsdComparison>,
}

impl Profile {
    /// 初始化.
    #[inline]
    pub fn new() -> Self {
        Self {
            trivial: 0,
            target: 0,
            measured: 0,
            skipped: 0,
            target_time: AccTimer::new(),
            real_time: AccTimer::new(),
            most: None,
            comparison: None,
        }
    }

    /// 记录一幅没有实例的图像.
    #[inline]
    pub fn count_trivial(&mut self) {
        self.trivial += 1;
    }

    /// 记录一幅含实例的图像, 并开始计时.
    #[inline]
    pub fn count_target(&mut self) {
        self.target += 1;
        self.target_time.start();
    }

    /// 结束一幅图像的计时, 并记录测得与跳过的实例个数.
    #[inline]
    pub fn target_elapsed(&mut self, measured: usize, skipped: usize) {
        let d = self.target_time.elapsed();
        self.most = Some(self.most.map_or(d, |m| m.max(d)));
        self.measured += measured as u64;
        self.skipped += skipped as u64;
    }

    /// 结束全部计时, 并记录与参考分布的比较.
    #[inline]
    pub fn finish(mut self, comparison: Option<PsdComparison>) -> Self {
        self.real_time.elapsed();
        self.comparison = comparison;
        self
    }

    /// 获得没有实例的图像个数.
    #[inline]
    pub fn get_trivial(&self) -> u64 {
        self.trivial
    }

    /// 获得含有实例的图像个数.
    #[inline]
    pub fn get_target(&self) -> u64 {
        self.target
    }

    /// 获得测得的实例个数.
    #[inline]
    pub fn get_measured(&self) -> u64 {
        self.measured
    }

    /// 获得跳过的实例个数.
    #[inline]
    pub fn get_skipped(&self) -> u64 {
        self.skipped
    }

    /// 以微秒为单位获得测量含实例图像的总花费时间.
    #[inline]
    pub fn get_target_time_us(&self) -> u64 {
        self.target_time.get_total_us()
    }

    /// 以微秒为单位获得任务的总时间.
    #[inline]
    pub fn get_real_time_us(&self) -> u64 {
        self.real_time.get_total_us()
    }

    /// 以微秒为单位获得每个测得实例的平均时间.
    #[inline]
    pub fn get_avg_instance_time_us(&self) -> Option<f64> {
        match self.measured {
            0 => None,
            n => Some(self.get_target_time_us() as f64 / n as f64),
        }
    }

    /// 获取最耗时的一幅图像所消耗的时间. 不存在时返回 `None`.
    #[inline]
    pub fn get_most_time_consuming(&self) -> Option<Duration> {
        self.most
    }

    /// 与参考粒径分布的比较.
    #[inline]
    pub fn get_comparison(&self) -> Option<&PsdComparison> {
        self.comparison.as_ref()
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}
