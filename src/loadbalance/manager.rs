//! 负载均衡管理器
//!
//! 解析当前算法（全局配置，可按次覆盖），应用实例过滤器，委托给具体策略，
//! 并维护按实例与按算法的使用统计。

use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::filter::{FilterChain, HealthFilter, InstanceFilter};
use super::stats::{AlgorithmStats, InstanceStats, StatsUpdate};
use super::{Algorithm, LoadBalancerStrategy, SelectionContext, strategy_for};
use crate::config::LoadBalancerConfig;
use crate::discovery::ServiceInstance;
use crate::error::{Result, TrafficError};

/// 无法从候选中得知服务名时使用的占位名
pub const UNKNOWN_SERVICE: &str = "unknown";

/// 负载均衡管理器（每进程一个）
pub struct LoadBalancerManager {
    algorithm: Algorithm,
    stats_enabled: bool,
    weights: HashMap<String, u32>,
    strategies: HashMap<Algorithm, Box<dyn LoadBalancerStrategy>>,
    filters: FilterChain,
    instance_stats: RwLock<HashMap<String, InstanceStats>>,
    algorithm_stats: RwLock<HashMap<Algorithm, AlgorithmStats>>,
}

impl LoadBalancerManager {
    /// 根据配置创建管理器；算法名无效时返回 `InvalidAlgorithm`
    pub fn new(config: &LoadBalancerConfig) -> Result<Self> {
        let algorithm: Algorithm = config.algorithm.parse()?;

        let strategies = Algorithm::ALL
            .into_iter()
            .map(|algorithm| (algorithm, strategy_for(algorithm)))
            .collect();

        let mut filters = FilterChain::new();
        if config.health_check_enabled {
            filters.push(HealthFilter);
        }

        Ok(Self {
            algorithm,
            stats_enabled: config.stats_enabled,
            weights: config.weights.clone(),
            strategies,
            filters,
            instance_stats: RwLock::new(HashMap::new()),
            algorithm_stats: RwLock::new(HashMap::new()),
        })
    }

    /// 追加实例过滤器（在健康过滤之后执行）
    #[must_use]
    pub fn with_filter(mut self, filter: impl InstanceFilter + 'static) -> Self {
        self.filters.push(filter);
        self
    }

    /// 替换某个算法的策略实现
    pub fn register_strategy(&mut self, strategy: Box<dyn LoadBalancerStrategy>) {
        self.strategies.insert(strategy.algorithm(), strategy);
    }

    /// 全局配置的算法
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// 使用全局算法选择实例
    pub async fn select(
        &self,
        candidates: &[ServiceInstance],
        routing_key: &str,
    ) -> Result<ServiceInstance> {
        self.select_with_algorithm(candidates, routing_key, self.algorithm)
            .await
    }

    /// 为指定服务选择实例；候选为空时错误中仍带有服务名
    pub async fn select_for(
        &self,
        service_name: &str,
        candidates: &[ServiceInstance],
        routing_key: &str,
    ) -> Result<ServiceInstance> {
        self.pick(Some(service_name), candidates, routing_key, self.algorithm)
            .await
    }

    /// 按名字覆盖本次选择使用的算法
    pub async fn select_with(
        &self,
        candidates: &[ServiceInstance],
        routing_key: &str,
        algorithm: &str,
    ) -> Result<ServiceInstance> {
        let algorithm: Algorithm = algorithm.parse()?;
        self.select_with_algorithm(candidates, routing_key, algorithm)
            .await
    }

    /// 使用指定算法选择实例
    pub async fn select_with_algorithm(
        &self,
        candidates: &[ServiceInstance],
        routing_key: &str,
        algorithm: Algorithm,
    ) -> Result<ServiceInstance> {
        self.pick(None, candidates, routing_key, algorithm).await
    }

    async fn pick(
        &self,
        service_name: Option<&str>,
        candidates: &[ServiceInstance],
        routing_key: &str,
        algorithm: Algorithm,
    ) -> Result<ServiceInstance> {
        let strategy = self
            .strategies
            .get(&algorithm)
            .ok_or_else(|| TrafficError::InvalidAlgorithm(algorithm.to_string()))?;

        let service = service_name
            .or_else(|| candidates.first().map(|instance| instance.service_name.as_str()))
            .unwrap_or(UNKNOWN_SERVICE)
            .to_string();
        let filtered = self.filters.filter(candidates);

        let selected = {
            let stats = self.instance_stats.read().await;
            let ctx = SelectionContext::new(routing_key, &stats, &self.weights);
            strategy.select(&filtered, &ctx).cloned()
        };

        let Some(instance) = selected else {
            warn!(
                service = %service,
                algorithm = %algorithm,
                candidates = candidates.len(),
                "no healthy instance available"
            );
            self.record_algorithm(algorithm, false).await;
            return Err(TrafficError::no_healthy_instances(service));
        };

        debug!(
            service = %instance.service_name,
            instance = %instance.instance_id,
            algorithm = %algorithm,
            "instance selected"
        );
        self.record_algorithm(algorithm, true).await;
        if self.stats_enabled {
            self.update_stats(&instance.instance_id, StatsUpdate::Selected)
                .await;
        }
        Ok(instance)
    }

    /// 更新实例统计
    ///
    /// 活跃连接数始终维护（最少连接策略依赖它）；
    /// 关闭统计时只跳过选中次数与最近使用时间。
    pub async fn update_stats(&self, instance_id: &str, update: StatsUpdate) {
        if !self.stats_enabled && update == StatsUpdate::Selected {
            return;
        }
        let mut stats = self.instance_stats.write().await;
        stats
            .entry(instance_id.to_string())
            .or_default()
            .apply(update);
    }

    /// 不等待锁的统计更新，供无法 `.await` 的场景（如 `Drop`）使用
    ///
    /// 统计表正被占用时返回 `false`，不做任何修改。
    pub fn try_update_stats(&self, instance_id: &str, update: StatsUpdate) -> bool {
        if !self.stats_enabled && update == StatsUpdate::Selected {
            return true;
        }
        match self.instance_stats.try_write() {
            Ok(mut stats) => {
                stats
                    .entry(instance_id.to_string())
                    .or_default()
                    .apply(update);
                true
            }
            Err(_) => false,
        }
    }

    async fn record_algorithm(&self, algorithm: Algorithm, success: bool) {
        if !self.stats_enabled {
            return;
        }
        let mut stats = self.algorithm_stats.write().await;
        let entry = stats.entry(algorithm).or_default();
        if success {
            entry.selections += 1;
            entry.last_selected = Some(Utc::now());
        } else {
            entry.failures += 1;
        }
    }

    /// 单个实例的统计；未记录过时返回全零
    pub async fn instance_stats(&self, instance_id: &str) -> InstanceStats {
        self.instance_stats
            .read()
            .await
            .get(instance_id)
            .cloned()
            .unwrap_or_default()
    }

    /// 全部实例统计
    pub async fn all_instance_stats(&self) -> HashMap<String, InstanceStats> {
        self.instance_stats.read().await.clone()
    }

    /// 全部算法统计
    pub async fn algorithm_stats(&self) -> HashMap<Algorithm, AlgorithmStats> {
        self.algorithm_stats.read().await.clone()
    }
}
