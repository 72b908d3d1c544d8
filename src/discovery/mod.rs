//! 服务发现边界
//!
//! 定义服务实例模型与注册表读取接口；注册、心跳与健康探测由外部组件负责。

pub mod instance;
pub mod registry;

pub use instance::{HealthStatus, ServiceInstance};
pub use registry::{ServiceRegistry, StaticRegistry};
