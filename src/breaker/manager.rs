//! 熔断器管理器
//!
//! 按依赖名惰性创建熔断器，每个名字在进程生命周期内只构造一次。

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::circuit::{BreakerSnapshot, CircuitBreaker, StateChangeListener};
use super::config::BreakerConfig;
use super::state::State;
use crate::config::Config;

/// 熔断器注册表
pub struct CircuitBreakerManager {
    default_config: BreakerConfig,
    overrides: HashMap<String, BreakerConfig>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    on_state_change: Option<StateChangeListener>,
}

impl CircuitBreakerManager {
    /// 使用默认配置创建管理器
    pub fn new(default_config: BreakerConfig) -> Self {
        Self {
            default_config,
            overrides: HashMap::new(),
            breakers: RwLock::new(HashMap::new()),
            on_state_change: None,
        }
    }

    /// 从全局配置创建管理器（包含按依赖名的覆盖配置）
    pub fn from_config(config: &Config) -> Self {
        let mut manager = Self::new(config.circuit_breaker.clone());
        manager.overrides = config.breakers.clone();
        manager
    }

    /// 设置状态变化回调，之后创建的熔断器都会挂载该回调
    #[must_use]
    pub fn with_state_change_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&str, State, State) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Arc::new(listener));
        self
    }

    /// 获取（必要时创建）指定名字的熔断器
    ///
    /// `config` 只在首次创建时生效；未提供时依次使用按名覆盖配置和默认配置。
    pub fn get_breaker(&self, name: &str, config: Option<BreakerConfig>) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(name) {
            return breaker.clone();
        }

        let mut breakers = self.breakers.write();
        // 获取写锁期间可能已被其他线程创建
        if let Some(breaker) = breakers.get(name) {
            return breaker.clone();
        }

        let config = config
            .or_else(|| self.overrides.get(name).cloned())
            .unwrap_or_else(|| self.default_config.clone());
        let mut breaker = CircuitBreaker::new(name, config);
        if let Some(listener) = &self.on_state_change {
            breaker = breaker.with_state_change_listener(listener.clone());
        }
        let breaker = Arc::new(breaker);
        breakers.insert(name.to_string(), breaker.clone());
        debug!(breaker = %name, "circuit breaker created");
        breaker
    }

    /// 使用默认/覆盖配置获取熔断器
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        self.get_breaker(name, None)
    }

    /// 查询已存在的熔断器，不会创建
    pub fn lookup(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().get(name).cloned()
    }

    /// 已创建的熔断器名字（按字典序）
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// 所有熔断器的状态快照（按名字排序）
    pub fn list(&self) -> Vec<BreakerSnapshot> {
        let breakers: Vec<Arc<CircuitBreaker>> = self.breakers.read().values().cloned().collect();
        let mut snapshots: Vec<BreakerSnapshot> =
            breakers.iter().map(|breaker| breaker.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// 移除熔断器；已持有的引用仍可继续使用
    pub fn remove(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        let removed = self.breakers.write().remove(name);
        if removed.is_some() {
            info!(breaker = %name, "circuit breaker removed");
        }
        removed
    }

    /// 重置单个熔断器，返回是否存在
    pub fn reset(&self, name: &str) -> bool {
        match self.lookup(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// 重置全部熔断器
    pub fn reset_all(&self) {
        let breakers: Vec<Arc<CircuitBreaker>> = self.breakers.read().values().cloned().collect();
        for breaker in breakers {
            breaker.reset();
        }
        info!(count = self.len(), "all circuit breakers reset");
    }

    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }
}

impl Default for CircuitBreakerManager {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
