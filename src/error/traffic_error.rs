//! 流量治理统一错误类型

use super::code::ErrorCode;
use thiserror::Error;

/// 熔断与负载均衡的统一错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrafficError {
    /// 熔断器处于 Open 状态，请求在调用前即被拒绝
    #[error("circuit breaker '{name}' is open")]
    CircuitOpen { name: String },

    /// HalfOpen 状态下探测请求数已达上限
    #[error("circuit breaker '{name}': too many requests")]
    TooManyRequests { name: String },

    /// 舱壁并发许可耗尽
    #[error("bulkhead '{name}' is full (capacity {capacity})")]
    BulkheadFull { name: String, capacity: usize },

    /// 过滤后没有可用实例
    #[error("no healthy instances available for '{service}'")]
    NoHealthyInstances { service: String },

    /// 未配置或未知的负载均衡算法
    #[error("invalid load balancing algorithm: {0}")]
    InvalidAlgorithm(String),

    /// 服务发现后端错误
    #[error("registry error: {0}")]
    Registry(String),

    /// 配置错误
    #[error("configuration error: {0}")]
    Config(String),
}

impl TrafficError {
    pub fn circuit_open(name: impl Into<String>) -> Self {
        TrafficError::CircuitOpen { name: name.into() }
    }

    pub fn too_many_requests(name: impl Into<String>) -> Self {
        TrafficError::TooManyRequests { name: name.into() }
    }

    pub fn no_healthy_instances(service: impl Into<String>) -> Self {
        TrafficError::NoHealthyInstances {
            service: service.into(),
        }
    }

    /// 获取对应的错误代码
    ///
    /// 舱壁饱和与半开探测超限同属 `TooManyRequests`。
    pub fn code(&self) -> ErrorCode {
        match self {
            TrafficError::CircuitOpen { .. } => ErrorCode::CircuitOpen,
            TrafficError::TooManyRequests { .. } | TrafficError::BulkheadFull { .. } => {
                ErrorCode::TooManyRequests
            }
            TrafficError::NoHealthyInstances { .. } => ErrorCode::NoHealthyInstances,
            TrafficError::InvalidAlgorithm(_) => ErrorCode::InvalidAlgorithm,
            TrafficError::Registry(_) => ErrorCode::RegistryUnavailable,
            TrafficError::Config(_) => ErrorCode::ConfigurationError,
        }
    }
}

/// 受保护调用的结果错误
///
/// `Rejected` 表示调用在到达下游之前被拒绝；`Failed` 原样携带下游调用自身的错误。
#[derive(Error, Debug)]
pub enum CallError<E> {
    #[error(transparent)]
    Rejected(TrafficError),

    #[error("call failed: {0}")]
    Failed(E),
}

impl<E> CallError<E> {
    /// 是否为熔断/选择阶段的拒绝
    pub fn is_rejected(&self) -> bool {
        matches!(self, CallError::Rejected(_))
    }

    /// 拒绝原因（如果有）
    pub fn rejection(&self) -> Option<&TrafficError> {
        match self {
            CallError::Rejected(err) => Some(err),
            CallError::Failed(_) => None,
        }
    }

    /// 取出下游调用自身的错误
    pub fn into_inner(self) -> Option<E> {
        match self {
            CallError::Failed(err) => Some(err),
            CallError::Rejected(_) => None,
        }
    }
}

impl<E> From<TrafficError> for CallError<E> {
    fn from(err: TrafficError) -> Self {
        CallError::Rejected(err)
    }
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, TrafficError>;
