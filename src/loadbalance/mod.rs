//! 负载均衡模块
//!
//! 提供多种负载均衡策略，用于从多个服务实例中选择一个：
//! 轮询、加权轮询、最少连接、随机、加权随机、一致性哈希、源地址哈希。

pub mod filter;
pub mod hash;
pub mod least_conn;
pub mod manager;
pub mod random;
pub mod round_robin;
pub mod stats;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::discovery::ServiceInstance;
use crate::error::TrafficError;

pub use filter::{FilterChain, HealthFilter, InstanceFilter, TagFilter};
pub use hash::{ConsistentHash, SourceHash, VIRTUAL_NODES};
pub use least_conn::LeastConnections;
pub use manager::{LoadBalancerManager, UNKNOWN_SERVICE};
pub use random::{Random, WeightedRandom};
pub use round_robin::{RoundRobin, WeightedRoundRobin};
pub use stats::{AlgorithmStats, InstanceStats, StatsUpdate};

/// 负载均衡算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// 轮询
    RoundRobin,
    /// 加权轮询
    WeightedRoundRobin,
    /// 最少连接
    LeastConnections,
    /// 随机
    Random,
    /// 加权随机
    WeightedRandom,
    /// 一致性哈希
    ConsistentHash,
    /// 源地址（路由键）哈希
    SourceHash,
}

impl Algorithm {
    pub const ALL: [Algorithm; 7] = [
        Algorithm::RoundRobin,
        Algorithm::WeightedRoundRobin,
        Algorithm::LeastConnections,
        Algorithm::Random,
        Algorithm::WeightedRandom,
        Algorithm::ConsistentHash,
        Algorithm::SourceHash,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "round_robin",
            Algorithm::WeightedRoundRobin => "weighted_round_robin",
            Algorithm::LeastConnections => "least_connections",
            Algorithm::Random => "random",
            Algorithm::WeightedRandom => "weighted_random",
            Algorithm::ConsistentHash => "consistent_hash",
            Algorithm::SourceHash => "source_hash",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Algorithm {
    type Err = TrafficError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "round_robin" | "rr" => Ok(Algorithm::RoundRobin),
            "weighted_round_robin" | "wrr" => Ok(Algorithm::WeightedRoundRobin),
            "least_connections" | "least_conn" => Ok(Algorithm::LeastConnections),
            "random" => Ok(Algorithm::Random),
            "weighted_random" => Ok(Algorithm::WeightedRandom),
            "consistent_hash" => Ok(Algorithm::ConsistentHash),
            "source_hash" | "ip_hash" | "source_ip_hash" => Ok(Algorithm::SourceHash),
            _ => Err(TrafficError::InvalidAlgorithm(s.to_string())),
        }
    }
}

/// 一次选择的上下文
pub struct SelectionContext<'a> {
    /// 路由键（用户 ID、调用方地址等），哈希类策略使用
    pub routing_key: &'a str,
    /// 实例统计，按实例 ID 索引；缺失视为全零
    pub stats: &'a HashMap<String, InstanceStats>,
    /// 静态权重表，按实例 ID 索引，优先于实例自身权重
    pub weights: &'a HashMap<String, u32>,
}

impl<'a> SelectionContext<'a> {
    pub fn new(
        routing_key: &'a str,
        stats: &'a HashMap<String, InstanceStats>,
        weights: &'a HashMap<String, u32>,
    ) -> Self {
        Self {
            routing_key,
            stats,
            weights,
        }
    }

    /// 实例的有效权重，未设置或非正数时为 1
    pub fn weight_of(&self, instance: &ServiceInstance) -> u64 {
        self.weights
            .get(&instance.instance_id)
            .copied()
            .filter(|weight| *weight > 0)
            .or(Some(instance.weight).filter(|weight| *weight > 0))
            .map(u64::from)
            .unwrap_or(1)
    }

    /// 实例当前活跃连接数
    pub fn active_connections(&self, instance: &ServiceInstance) -> u64 {
        self.stats
            .get(&instance.instance_id)
            .map(|stats| stats.active_connections)
            .unwrap_or(0)
    }
}

/// 负载均衡策略
///
/// 候选列表由调用方持有；策略只保留少量内部计数器或哈希环。
/// 候选为空时返回 `None`。
pub trait LoadBalancerStrategy: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    fn select<'a>(
        &self,
        candidates: &'a [ServiceInstance],
        ctx: &SelectionContext<'_>,
    ) -> Option<&'a ServiceInstance>;
}

/// 创建算法对应的内置策略
pub fn strategy_for(algorithm: Algorithm) -> Box<dyn LoadBalancerStrategy> {
    match algorithm {
        Algorithm::RoundRobin => Box::new(RoundRobin::new()),
        Algorithm::WeightedRoundRobin => Box::new(WeightedRoundRobin::new()),
        Algorithm::LeastConnections => Box::new(LeastConnections),
        Algorithm::Random => Box::new(Random),
        Algorithm::WeightedRandom => Box::new(WeightedRandom),
        Algorithm::ConsistentHash => Box::new(ConsistentHash::new()),
        Algorithm::SourceHash => Box::new(SourceHash),
    }
}
