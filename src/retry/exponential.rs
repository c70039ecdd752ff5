use rand::Rng;
use std::time::Duration;

/// 默认最小延迟
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(10);

/// 默认最大延迟
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1);

/// 默认增长因子
pub const DEFAULT_FACTOR: f64 = 2.0;

/// 指数退避策略
///
/// 第 n 次连续失败的基础延迟为 `min * factor^n`，上限为 `max`。
/// 启用抖动时，先在 `[min, 基础延迟]` 区间内随机取值，再截断到 `max`，
/// 因此饱和后的延迟大多等于 `max`。
/// 没有最大尝试次数，策略本身从不终止重试；任何一次成功后应调用 [`reset`](Self::reset)。
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min: Duration,
    max: Duration,
    factor: f64,
    jitter: bool,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
            factor: DEFAULT_FACTOR,
            jitter: true,
            attempt: 0,
        }
    }

    /// 设置增长因子（小于 1 时按 1 处理）
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = if factor.is_finite() && factor >= 1.0 { factor } else { 1.0 };
        self
    }

    /// 设置是否启用抖动
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// 当前连续失败次数
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// 计算下一次延迟并推进尝试次数
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for_attempt(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// 重置为最小延迟
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let min = self.min.as_nanos() as f64;
        let max = self.max.as_nanos() as f64;

        // powi 的指数用 i32，上限足够让结果饱和到 max
        let exp = attempt.min(i32::MAX as u32) as i32;
        let base = min * self.factor.powi(exp);

        // 先在未截断的基础延迟上抖动，再截断到 max
        let delay = if self.jitter && base.is_finite() && base > min {
            rand::thread_rng().gen_range(min..=base)
        } else {
            base
        };

        Duration::from_nanos(delay.clamp(min, max).round() as u64)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DELAY, DEFAULT_MAX_DELAY)
    }
}
