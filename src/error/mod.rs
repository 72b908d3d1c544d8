//! Flare Traffic Core 错误处理模块
//!
//! 提供错误代码分类、统一错误类型以及基础设施错误的转换

pub mod code;
pub mod traffic_error;

pub use code::{ErrorCategory, ErrorCode};
pub use traffic_error::{CallError, Result, TrafficError};

/// 基础设施层默认使用的结果类型
pub type InfraResult<T> = anyhow::Result<T>;

/// `InfraResult` 的辅助扩展，用于快速转换为统一的错误类型
pub trait InfraResultExt<T> {
    fn into_registry_error(self) -> Result<T>;
}

impl<T> InfraResultExt<T> for InfraResult<T> {
    fn into_registry_error(self) -> Result<T> {
        self.map_err(|err| TrafficError::Registry(format!("{err:#}")))
    }
}
