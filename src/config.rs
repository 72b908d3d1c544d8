use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::breaker::BreakerConfig;
use crate::error::{Result, TrafficError};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// 熔断器默认配置
    pub circuit_breaker: BreakerConfig,
    /// 按依赖名覆盖的熔断器配置
    pub breakers: HashMap<String, BreakerConfig>,
    pub load_balancer: LoadBalancerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancerConfig {
    pub algorithm: String, // round_robin, weighted_round_robin, least_connections, random, ...
    pub health_check_enabled: bool,
    pub stats_enabled: bool,
    /// 静态权重表：instance_id -> weight
    pub weights: HashMap<String, u32>,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            health_check_enabled: true,
            stats_enabled: true,
            weights: HashMap::new(),
        }
    }
}

fn default_algorithm() -> String {
    "round_robin".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter 指令，如 "info,flare_traffic_core=debug"
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| TrafficError::Config(format!("failed to read {path}: {err}")))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| TrafficError::Config(err.to_string()))
    }

    /// 解析依赖的熔断器配置：按名覆盖优先，否则使用默认配置
    pub fn breaker_config(&self, name: &str) -> BreakerConfig {
        self.breakers
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.circuit_breaker.clone())
    }
}
