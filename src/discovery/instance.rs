//! 服务实例定义

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

/// 实例健康状态
///
/// 由外部健康检查组件异步写入，本模块只读取。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Passing,
    Warning,
    Critical,
    #[default]
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Passing => "passing",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
            HealthStatus::Unknown => "unknown",
        }
    }

    /// 只有 `passing` 被视为健康
    pub fn is_passing(&self) -> bool {
        matches!(self, HealthStatus::Passing)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HealthStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "passing" | "healthy" | "serving" => HealthStatus::Passing,
            "warning" => HealthStatus::Warning,
            "critical" | "unhealthy" | "not_serving" => HealthStatus::Critical,
            _ => HealthStatus::Unknown,
        })
    }
}

/// 服务实例
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInstance {
    /// 服务名（如 "message-orchestrator"）
    pub service_name: String,

    /// 实例 ID（唯一标识，统计与哈希环均以此为键）
    pub instance_id: String,

    /// 服务地址
    pub address: SocketAddr,

    /// 健康状态
    pub health: HealthStatus,

    /// 自定义标签（用于过滤和路由）
    pub tags: HashMap<String, String>,

    /// 权重（0 表示未设置，按 1 处理）
    pub weight: u32,
}

impl ServiceInstance {
    /// 创建新的服务实例，默认健康、权重未设置
    pub fn new(
        service_name: impl Into<String>,
        instance_id: impl Into<String>,
        address: SocketAddr,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            instance_id: instance_id.into(),
            address,
            health: HealthStatus::Passing,
            tags: HashMap::new(),
            weight: 0,
        }
    }

    /// 添加标签
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// 设置权重
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// 设置健康状态
    pub fn with_health(mut self, health: HealthStatus) -> Self {
        self.health = health;
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_passing()
    }

    /// 检查是否匹配标签过滤器
    pub fn matches_tags(&self, filters: &HashMap<String, String>) -> bool {
        filters
            .iter()
            .all(|(key, value)| self.tags.get(key).map(|v| v == value).unwrap_or(false))
    }
}
