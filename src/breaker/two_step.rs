//! 两段式熔断器
//!
//! 把准入与结果记录拆开，适用于回调式或异步完成的调用。

use std::sync::Arc;
use tracing::debug;

use super::circuit::CircuitBreaker;
use super::state::State;
use crate::error::Result;

/// 两段式熔断器装饰器
#[derive(Debug, Clone)]
pub struct TwoStepCircuitBreaker {
    breaker: Arc<CircuitBreaker>,
}

impl TwoStepCircuitBreaker {
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self { breaker }
    }

    pub fn name(&self) -> &str {
        self.breaker.name()
    }

    pub fn state(&self) -> State {
        self.breaker.state()
    }

    /// 底层熔断器
    pub fn inner(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// 请求准入；被拒绝时返回 `CircuitOpen` / `TooManyRequests`
    pub fn allow(&self) -> Result<Completion> {
        let generation = self.breaker.before_request()?;
        Ok(Completion {
            breaker: self.breaker.clone(),
            generation,
            recorded: false,
        })
    }
}

/// 一次已准入请求的完成句柄
///
/// 句柄可以跨线程移动，稍后调用 [`done`](Self::done) 记录结果。
/// 未调用 `done` 就被丢弃时按失败记录。
#[must_use = "call `done` to record the outcome of the admitted request"]
#[derive(Debug)]
pub struct Completion {
    breaker: Arc<CircuitBreaker>,
    generation: u64,
    recorded: bool,
}

impl Completion {
    /// 准入时刻的代
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn done(mut self, success: bool) {
        self.recorded = true;
        self.breaker.after_request(self.generation, success);
    }

    pub fn success(self) {
        self.done(true);
    }

    pub fn failure(self) {
        self.done(false);
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.recorded {
            debug!(
                breaker = %self.breaker.name(),
                generation = self.generation,
                "completion dropped without an outcome"
            );
            self.breaker.after_request(self.generation, false);
        }
    }
}
