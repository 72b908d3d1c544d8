//! 基于结果码判定成败的熔断器

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use super::circuit::CircuitBreaker;
use crate::error::CallError;

/// 默认视为失败的结果码
pub const DEFAULT_FAILURE_CODES: [i32; 4] = [500, 502, 503, 504];

/// 结果码感知的熔断器装饰器
///
/// 只根据调用方给出的结果码判定成败，与传输层是否出错无关。
#[derive(Debug, Clone)]
pub struct ResultCodeBreaker {
    breaker: Arc<CircuitBreaker>,
    failure_codes: HashSet<i32>,
}

impl ResultCodeBreaker {
    pub fn new(breaker: Arc<CircuitBreaker>, failure_codes: impl IntoIterator<Item = i32>) -> Self {
        Self {
            breaker,
            failure_codes: failure_codes.into_iter().collect(),
        }
    }

    /// 使用 [`DEFAULT_FAILURE_CODES`]
    pub fn with_default_codes(breaker: Arc<CircuitBreaker>) -> Self {
        Self::new(breaker, DEFAULT_FAILURE_CODES)
    }

    pub fn inner(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn is_failure_code(&self, code: i32) -> bool {
        self.failure_codes.contains(&code)
    }

    /// 执行调用；`f` 返回 `(结果码, 调用结果)`
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = (i32, Result<T, E>)>,
    {
        let (_, result) = self
            .breaker
            .execute_classified(f, |(code, _): &(i32, Result<T, E>)| {
                !self.is_failure_code(*code)
            })
            .await?;
        result.map_err(CallError::Failed)
    }
}
