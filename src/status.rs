//! 只读状态报告，供外部状态/观测接口使用

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::breaker::{BreakerSnapshot, CircuitBreakerManager};
use crate::error::{Result, TrafficError};
use crate::loadbalance::{AlgorithmStats, InstanceStats, LoadBalancerManager};

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub generated_at: DateTime<Utc>,
    pub algorithm: String,
    pub breakers: Vec<BreakerSnapshot>,
    pub algorithms: BTreeMap<String, AlgorithmStats>,
    pub instances: BTreeMap<String, InstanceStats>,
}

impl StatusReport {
    /// 采集熔断器与负载均衡的当前统计
    pub async fn collect(breakers: &CircuitBreakerManager, balancer: &LoadBalancerManager) -> Self {
        let algorithms = balancer
            .algorithm_stats()
            .await
            .into_iter()
            .map(|(algorithm, stats)| (algorithm.to_string(), stats))
            .collect();
        let instances = balancer.all_instance_stats().await.into_iter().collect();

        Self {
            generated_at: Utc::now(),
            algorithm: balancer.algorithm().to_string(),
            breakers: breakers.list(),
            algorithms,
            instances,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| TrafficError::Config(format!("failed to encode status report: {err}")))
    }
}
