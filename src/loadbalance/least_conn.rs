use super::{Algorithm, LoadBalancerStrategy, SelectionContext};
use crate::discovery::ServiceInstance;

/// 最少连接
///
/// 线性扫描候选，取活跃连接数最小者；相同时取先出现的实例。
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastConnections;

impl LoadBalancerStrategy for LeastConnections {
    fn algorithm(&self) -> Algorithm {
        Algorithm::LeastConnections
    }

    fn select<'a>(
        &self,
        candidates: &'a [ServiceInstance],
        ctx: &SelectionContext<'_>,
    ) -> Option<&'a ServiceInstance> {
        candidates
            .iter()
            .min_by_key(|candidate| ctx.active_connections(candidate))
    }
}
