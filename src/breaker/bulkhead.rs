//! 舱壁（并发上限）熔断器
//!
//! 先获取固定容量的许可再委托给底层熔断器；许可耗尽时立即失败，
//! 不排队，也不占用熔断器的准入名额。

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

use super::circuit::CircuitBreaker;
use crate::error::{CallError, TrafficError};

#[derive(Debug)]
pub struct BulkheadBreaker {
    breaker: Arc<CircuitBreaker>,
    permits: Semaphore,
    capacity: usize,
}

impl BulkheadBreaker {
    /// 创建舱壁；容量至少为 1
    pub fn new(breaker: Arc<CircuitBreaker>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            breaker,
            permits: Semaphore::new(capacity),
            capacity,
        }
    }

    pub fn inner(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 当前空闲许可数
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Ok(_permit) = self.permits.try_acquire() else {
            debug!(breaker = %self.breaker.name(), capacity = self.capacity, "bulkhead saturated");
            return Err(CallError::Rejected(TrafficError::BulkheadFull {
                name: self.breaker.name().to_string(),
                capacity: self.capacity,
            }));
        };
        self.breaker.execute(f).await
    }
}
