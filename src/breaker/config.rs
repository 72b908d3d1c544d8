//! 熔断器配置

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 熔断器配置（每个熔断器创建后不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Closed 状态下连续失败多少次后打开（0 表示关闭该条件）
    pub failure_threshold: u32,

    /// HalfOpen 状态下连续成功多少次后关闭
    pub success_threshold: u32,

    /// Open 状态持续多久后允许探测
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,

    /// HalfOpen 状态下允许同时在途的探测请求数
    pub max_requests: u32,

    /// Closed 状态下计数窗口的滚动周期（0 表示不滚动）
    #[serde(rename = "interval_ms", with = "duration_ms")]
    pub interval: Duration,

    /// 失败率条件生效所需的最小请求数
    pub min_requests: u32,

    /// 失败率阈值（<= 0 表示关闭该条件）
    pub failure_ratio: f64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
            max_requests: 1,
            interval: Duration::from_secs(60),
            min_requests: 10,
            failure_ratio: 0.5,
        }
    }
}

impl BreakerConfig {
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_min_requests(mut self, min_requests: u32) -> Self {
        self.min_requests = min_requests;
        self
    }

    #[must_use]
    pub fn with_failure_ratio(mut self, ratio: f64) -> Self {
        self.failure_ratio = ratio;
        self
    }

    pub(crate) fn effective_max_requests(&self) -> u32 {
        self.max_requests.max(1)
    }

    pub(crate) fn effective_success_threshold(&self) -> u32 {
        self.success_threshold.max(1)
    }
}

/// 以毫秒整数序列化 `Duration`
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
