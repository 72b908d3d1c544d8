//! 熔断器模块
//!
//! 一个核心状态机 [`CircuitBreaker`]，以及在其之上组合的装饰器：
//! 两段式、结果码感知和舱壁。

pub mod bulkhead;
pub mod circuit;
pub mod config;
pub mod manager;
pub mod result_code;
pub mod state;
pub mod two_step;

pub use bulkhead::BulkheadBreaker;
pub use circuit::{BreakerSnapshot, CircuitBreaker, StateChangeListener};
pub use config::BreakerConfig;
pub use manager::CircuitBreakerManager;
pub use result_code::{DEFAULT_FAILURE_CODES, ResultCodeBreaker};
pub use state::{Counts, State};
pub use two_step::{Completion, TwoStepCircuitBreaker};
