//! 重试策略
//!
//! 纯函数：尝试次数、退避时长、何时放弃。不关心传输层

use std::time::Duration;

use crate::config::Config;

/// 指数退避重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最多尝试次数（含第一次），至少为 1
    max_attempts: u32,
    /// 退避基数
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_fetch_attempts,
            Duration::from_millis(config.backoff_base_ms),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 是否为最后一次尝试（attempt 从 0 开始）
    pub fn is_final(&self, attempt: u32) -> bool {
        attempt + 1 >= self.max_attempts
    }

    /// 第 `attempt` 次失败后需要等待的时长
    ///
    /// 最后一次失败返回 None，表示不再重试
    pub fn backoff_after(&self, attempt: u32) -> Option<Duration> {
        if self.is_final(attempt) {
            return None;
        }
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.backoff_after(0), Some(Duration::from_millis(1000)));
        assert_eq!(policy.backoff_after(1), Some(Duration::from_millis(2000)));
        assert_eq!(policy.backoff_after(2), None);
        assert!(policy.is_final(2));
        assert!(!policy.is_final(1));
    }

    #[test]
    fn test_single_attempt_never_waits() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.backoff_after(0), None);
    }

    #[test]
    fn test_large_attempt_saturates() {
        let policy = RetryPolicy::new(100, Duration::from_secs(1));
        assert!(policy.backoff_after(40).is_some());
    }
}
