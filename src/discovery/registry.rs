//! 服务注册表抽象
//!
//! 实例注册表、心跳/TTL 过期与健康探测都属于外部组件，
//! 这里只定义读取边界，并提供一个进程内实现用于本地部署和测试。

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::discovery::instance::{HealthStatus, ServiceInstance};
use crate::error::InfraResult;

/// 服务注册表 trait
///
/// 由于需要动态分发（dyn），使用 async-trait
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// 列出服务的全部实例（包含不健康实例，由过滤器负责剔除）
    async fn list_instances(&self, service_name: &str) -> InfraResult<Vec<ServiceInstance>>;
}

/// 进程内静态注册表
///
/// 实例按注册顺序返回，保证轮询在多次调用间的顺序稳定。
#[derive(Clone, Default)]
pub struct StaticRegistry {
    services: Arc<RwLock<HashMap<String, Vec<ServiceInstance>>>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册实例；同 ID 的实例会被替换并保持原有位置
    pub async fn register(&self, instance: ServiceInstance) {
        let mut services = self.services.write().await;
        let instances = services.entry(instance.service_name.clone()).or_default();
        match instances
            .iter_mut()
            .find(|existing| existing.instance_id == instance.instance_id)
        {
            Some(existing) => *existing = instance,
            None => instances.push(instance),
        }
    }

    /// 注销实例，返回是否存在
    pub async fn deregister(&self, service_name: &str, instance_id: &str) -> bool {
        let mut services = self.services.write().await;
        let Some(instances) = services.get_mut(service_name) else {
            return false;
        };
        let before = instances.len();
        instances.retain(|inst| inst.instance_id != instance_id);
        before != instances.len()
    }

    /// 更新实例健康状态（模拟外部健康探测的写入）
    pub async fn set_health(
        &self,
        service_name: &str,
        instance_id: &str,
        health: HealthStatus,
    ) -> bool {
        let mut services = self.services.write().await;
        services
            .get_mut(service_name)
            .and_then(|instances| {
                instances
                    .iter_mut()
                    .find(|inst| inst.instance_id == instance_id)
            })
            .map(|inst| inst.health = health)
            .is_some()
    }
}

#[async_trait]
impl ServiceRegistry for StaticRegistry {
    async fn list_instances(&self, service_name: &str) -> InfraResult<Vec<ServiceInstance>> {
        let services = self.services.read().await;
        Ok(services.get(service_name).cloned().unwrap_or_default())
    }
}
