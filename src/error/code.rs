//! 错误代码和错误类别定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误代码枚举
///
/// 错误代码按类别分组，每个类别占用1000个代码范围：
/// - 1000-1999: 熔断相关错误
/// - 2000-2999: 负载均衡相关错误
/// - 3000-3999: 服务发现相关错误
/// - 9000-9999: 通用错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorCode {
    // ============================================================
    // 熔断相关错误 (1000-1999)
    // ============================================================
    CircuitOpen = 1000,
    TooManyRequests = 1001,

    // ============================================================
    // 负载均衡相关错误 (2000-2999)
    // ============================================================
    NoHealthyInstances = 2000,
    InvalidAlgorithm = 2001,

    // ============================================================
    // 服务发现相关错误 (3000-3999)
    // ============================================================
    RegistryUnavailable = 3000,

    // ============================================================
    // 通用错误 (9000-9999)
    // ============================================================
    ConfigurationError = 9000,
    UnknownError = 9999,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorCode {
    /// 获取错误代码的数字值
    #[inline]
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// 从数字值创建错误代码
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            1000 => Some(ErrorCode::CircuitOpen),
            1001 => Some(ErrorCode::TooManyRequests),
            2000 => Some(ErrorCode::NoHealthyInstances),
            2001 => Some(ErrorCode::InvalidAlgorithm),
            3000 => Some(ErrorCode::RegistryUnavailable),
            9000 => Some(ErrorCode::ConfigurationError),
            9999 => Some(ErrorCode::UnknownError),
            _ => None,
        }
    }

    /// 获取错误代码的英文标识符
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::CircuitOpen => "CIRCUIT_OPEN",
            ErrorCode::TooManyRequests => "TOO_MANY_REQUESTS",
            ErrorCode::NoHealthyInstances => "NO_HEALTHY_INSTANCES",
            ErrorCode::InvalidAlgorithm => "INVALID_ALGORITHM",
            ErrorCode::RegistryUnavailable => "REGISTRY_UNAVAILABLE",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// 获取错误代码的类别
    pub fn category(&self) -> ErrorCategory {
        match self.as_u32() {
            1000..=1999 => ErrorCategory::CircuitBreaking,
            2000..=2999 => ErrorCategory::LoadBalancing,
            3000..=3999 => ErrorCategory::Discovery,
            _ => ErrorCategory::General,
        }
    }

    /// 判断是否属于快速失败（未真正调用下游）的拒绝
    ///
    /// 本模块从不自行重试，是否重试由调用方决定。
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ErrorCode::CircuitOpen | ErrorCode::TooManyRequests | ErrorCode::NoHealthyInstances
        )
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    CircuitBreaking,
    LoadBalancing,
    Discovery,
    General,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::CircuitBreaking => write!(f, "CIRCUIT_BREAKING"),
            ErrorCategory::LoadBalancing => write!(f, "LOAD_BALANCING"),
            ErrorCategory::Discovery => write!(f, "DISCOVERY"),
            ErrorCategory::General => write!(f, "GENERAL"),
        }
    }
}
