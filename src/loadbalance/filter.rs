//! 实例过滤器

use std::collections::HashMap;

use crate::discovery::ServiceInstance;

/// 实例过滤器：在选择之前剔除不合格的候选
pub trait InstanceFilter: Send + Sync {
    fn filter(&self, instances: &[ServiceInstance]) -> Vec<ServiceInstance>;
}

/// 只保留健康状态为 `passing` 的实例
#[derive(Debug, Default, Clone, Copy)]
pub struct HealthFilter;

impl InstanceFilter for HealthFilter {
    fn filter(&self, instances: &[ServiceInstance]) -> Vec<ServiceInstance> {
        instances
            .iter()
            .filter(|instance| instance.is_healthy())
            .cloned()
            .collect()
    }
}

/// 只保留标签全部匹配的实例
#[derive(Debug, Default, Clone)]
pub struct TagFilter {
    tags: HashMap<String, String>,
}

impl TagFilter {
    pub fn new(tags: HashMap<String, String>) -> Self {
        Self { tags }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

impl InstanceFilter for TagFilter {
    fn filter(&self, instances: &[ServiceInstance]) -> Vec<ServiceInstance> {
        instances
            .iter()
            .filter(|instance| instance.matches_tags(&self.tags))
            .cloned()
            .collect()
    }
}

/// 依次应用多个过滤器；为空时原样返回
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn InstanceFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: impl InstanceFilter + 'static) {
        self.filters.push(Box::new(filter));
    }

    pub fn with(mut self, filter: impl InstanceFilter + 'static) -> Self {
        self.push(filter);
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl InstanceFilter for FilterChain {
    fn filter(&self, instances: &[ServiceInstance]) -> Vec<ServiceInstance> {
        let mut remaining = instances.to_vec();
        for filter in &self.filters {
            if remaining.is_empty() {
                break;
            }
            remaining = filter.filter(&remaining);
        }
        remaining
    }
}
