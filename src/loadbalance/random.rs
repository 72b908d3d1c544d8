//! 随机与加权随机

use rand::Rng;

use super::{Algorithm, LoadBalancerStrategy, SelectionContext};
use crate::discovery::ServiceInstance;

/// 均匀随机
#[derive(Debug, Default, Clone, Copy)]
pub struct Random;

impl LoadBalancerStrategy for Random {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Random
    }

    fn select<'a>(
        &self,
        candidates: &'a [ServiceInstance],
        _ctx: &SelectionContext<'_>,
    ) -> Option<&'a ServiceInstance> {
        if candidates.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..candidates.len());
        candidates.get(index)
    }
}

/// 加权随机
///
/// 在 `[0, 总权重)` 内取随机数，沿累积权重找到第一个累积和大于它的实例。
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedRandom;

impl LoadBalancerStrategy for WeightedRandom {
    fn algorithm(&self) -> Algorithm {
        Algorithm::WeightedRandom
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
        let draw = rand::thread_rng().gen_range(0..total);
        let mut cumulative = 0u64;
        for candidate in candidates {
            cumulative += ctx.weight_of(candidate);
            if cumulative > draw {
                return Some(candidate);
            }
        }
        candidates.last()
    }
}
