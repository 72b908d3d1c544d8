//! 轮询与加权轮询

use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Algorithm, LoadBalancerStrategy, SelectionContext};
use crate::discovery::ServiceInstance;

/// 轮询
///
/// 原子计数器对候选数取模，直接索引调用方给出的顺序；
/// 调用方需保证候选顺序稳定，公平性才能跨调用成立。
#[derive(Debug, Default)]
pub struct RoundRobin {
    index: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancerStrategy for RoundRobin {
    fn algorithm(&self) -> Algorithm {
        Algorithm::RoundRobin
    }

    fn select<'a>(
        &self,
        candidates: &'a [ServiceInstance],
        _ctx: &SelectionContext<'_>,
    ) -> Option<&'a ServiceInstance> {
        if candidates.is_empty() {
            return None;
        }
        let index = self.index.fetch_add(1, Ordering::Relaxed);
        candidates.get(index % candidates.len())
    }
}

/// 加权轮询
///
/// 每个实例按权重展开为若干个连续槽位，游标在展开序列上确定性地轮转。
/// 例如 `{A:3, B:1}` 的选择序列为 `A A A B A A A B ...`。
#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    cursor: AtomicUsize,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancerStrategy for WeightedRoundRobin {
    fn algorithm(&self) -> Algorithm {
        Algorithm::WeightedRoundRobin
    }

    fn select<'a>(
        &self,
        candidates: &'a [ServiceInstance],
        ctx: &SelectionContext<'_>,
    ) -> Option<&'a ServiceInstance> {
        if candidates.is_empty() {
            return None;
        }
        let total: u64 = candidates.iter().map(|c| ctx.weight_of(c)).sum();
        let mut slot = self.cursor.fetch_add(1, Ordering::Relaxed) as u64 % total;
        for candidate in candidates {
            let weight = ctx.weight_of(candidate);
            if slot < weight {
                return Some(candidate);
            }
            slot -= weight;
        }
        candidates.last()
    }
}
