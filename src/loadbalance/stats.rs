//! 负载均衡统计

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// 单个实例的使用统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstanceStats {
    pub active_connections: u64,
    pub total_requests: u64,
    pub failed_requests: u64,
    /// 最近一次请求的响应耗时
    pub response_time: Duration,
    pub last_used: Option<DateTime<Utc>>,
}

/// 实例统计的更新操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsUpdate {
    /// 实例被选中
    Selected,
    /// 开始一次请求（活跃连接 +1）
    Acquire,
    /// 结束一次请求（活跃连接 -1）
    Release {
        success: bool,
        response_time: Duration,
    },
}

impl InstanceStats {
    pub(crate) fn apply(&mut self, update: StatsUpdate) {
        match update {
            StatsUpdate::Selected => {
                self.total_requests += 1;
                self.last_used = Some(Utc::now());
            }
            StatsUpdate::Acquire => {
                self.active_connections += 1;
            }
            StatsUpdate::Release {
                success,
                response_time,
            } => {
                self.active_connections = self.active_connections.saturating_sub(1);
                if !success {
                    self.failed_requests += 1;
                }
                self.response_time = response_time;
            }
        }
    }
}

/// 单个算法的使用统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlgorithmStats {
    pub selections: u64,
    /// 因无可用实例而失败的次数
    pub failures: u64,
    pub last_selected: Option<DateTime<Utc>>,
}
