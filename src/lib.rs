//! Flare Traffic Core Library
//!
//! 位于服务发现客户端与后端实例之间的流量治理层：
//! 按依赖划分的熔断器状态机，以及可插拔的多算法负载均衡。
//! 每次出站调用回答两个问题：依赖当前是否健康到可以调用？调用应交给哪个实例？

pub mod breaker;
pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod loadbalance;
pub mod logging;
pub mod status;

// Re-exports
pub use breaker::{
    BreakerConfig, BreakerSnapshot, BulkheadBreaker, CircuitBreaker, CircuitBreakerManager,
    Completion, Counts, ResultCodeBreaker, State, TwoStepCircuitBreaker,
};
pub use client::ResilientClient;
pub use config::{Config, LoadBalancerConfig, LoggingConfig};
pub use discovery::{HealthStatus, ServiceInstance, ServiceRegistry, StaticRegistry};
pub use error::{CallError, ErrorCategory, ErrorCode, Result, TrafficError};
pub use loadbalance::{
    Algorithm, InstanceFilter, InstanceStats, LoadBalancerManager, LoadBalancerStrategy,
    SelectionContext, StatsUpdate,
};
pub use status::StatusReport;
