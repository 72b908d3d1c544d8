//! 带熔断与负载均衡的服务调用客户端
//!
//! 调用流程：注册表列出实例 → 熔断器准入 → 过滤并选择实例 → 执行调用方的工作 → 更新统计。

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::warn;

use crate::breaker::CircuitBreakerManager;
use crate::config::Config;
use crate::discovery::{ServiceInstance, ServiceRegistry};
use crate::error::{CallError, InfraResultExt, Result};
use crate::loadbalance::{LoadBalancerManager, StatsUpdate};

/// 服务调用客户端
///
/// 熔断器按服务名创建；选择实例发生在熔断器准入之后，
/// 因此无可用实例也会计为该服务的一次失败。
#[derive(Clone)]
pub struct ResilientClient {
    registry: Arc<dyn ServiceRegistry>,
    balancer: Arc<LoadBalancerManager>,
    breakers: Arc<CircuitBreakerManager>,
}

impl ResilientClient {
    pub fn new(
        registry: Arc<dyn ServiceRegistry>,
        balancer: Arc<LoadBalancerManager>,
        breakers: Arc<CircuitBreakerManager>,
    ) -> Self {
        Self {
            registry,
            balancer,
            breakers,
        }
    }

    /// 从全局配置创建客户端
    pub fn from_config(registry: Arc<dyn ServiceRegistry>, config: &Config) -> Result<Self> {
        let balancer = LoadBalancerManager::new(&config.load_balancer)?;
        let breakers = CircuitBreakerManager::from_config(config);
        Ok(Self::new(registry, Arc::new(balancer), Arc::new(breakers)))
    }

    pub fn balancer(&self) -> &Arc<LoadBalancerManager> {
        &self.balancer
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerManager> {
        &self.breakers
    }

    /// 调用服务
    ///
    /// `f` 接收选中的实例并执行真正的下游调用；其错误原样放入 `CallError::Failed`。
    pub async fn call<F, Fut, T, E>(
        &self,
        service_name: &str,
        routing_key: &str,
        f: F,
    ) -> std::result::Result<T, CallError<E>>
    where
        F: FnOnce(ServiceInstance) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let candidates = self
            .registry
            .list_instances(service_name)
            .await
            .into_registry_error()?;

        let breaker = self.breakers.get(service_name);
        let balancer = &self.balancer;
        let candidates = &candidates;
        let outcome = breaker
            .execute_classified(
                move || async move {
                    let instance = match balancer
                        .select_for(service_name, candidates, routing_key)
                        .await
                    {
                        Ok(instance) => instance,
                        Err(err) => return Err(CallError::Rejected(err)),
                    };

                    let connection =
                        Connection::open(balancer.clone(), instance.instance_id.clone()).await;
                    let result = AssertUnwindSafe(f(instance)).catch_unwind().await;
                    connection.close(matches!(result, Ok(Ok(_)))).await;

                    match result {
                        Ok(result) => result.map_err(CallError::Failed),
                        Err(panic) => std::panic::resume_unwind(panic),
                    }
                },
                |result: &std::result::Result<T, CallError<E>>| result.is_ok(),
            )
            .await;

        match outcome {
            Ok(result) => result,
            Err(rejected) => Err(CallError::Rejected(rejected)),
        }
    }
}

/// 一个实例上的活跃连接
///
/// 打开时活跃连接 +1；调用方的 future 被取消导致未正常关闭时，
/// 在 `Drop` 中按失败释放，避免最少连接策略看到虚高的连接数。
struct Connection {
    balancer: Arc<LoadBalancerManager>,
    instance_id: String,
    started: Instant,
    closed: bool,
}

impl Connection {
    async fn open(balancer: Arc<LoadBalancerManager>, instance_id: String) -> Self {
        balancer
            .update_stats(&instance_id, StatsUpdate::Acquire)
            .await;
        Self {
            balancer,
            instance_id,
            started: Instant::now(),
            closed: false,
        }
    }

    fn release(&self, success: bool) -> StatsUpdate {
        StatsUpdate::Release {
            success,
            response_time: self.started.elapsed(),
        }
    }

    async fn close(mut self, success: bool) {
        let update = self.release(success);
        self.balancer.update_stats(&self.instance_id, update).await;
        self.closed = true;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let update = self.release(false);
        if self.balancer.try_update_stats(&self.instance_id, update) {
            return;
        }
        // 统计表正被占用：交给运行时异步释放
        match Handle::try_current() {
            Ok(handle) => {
                let balancer = self.balancer.clone();
                let instance_id = std::mem::take(&mut self.instance_id);
                handle.spawn(async move {
                    balancer.update_stats(&instance_id, update).await;
                });
            }
            Err(_) => {
                warn!(
                    instance = %self.instance_id,
                    "connection dropped outside a runtime, release skipped"
                );
            }
        }
    }
}
