//! 熔断器核心状态机
//!
//! 状态转换：
//! - Closed → Open：连续失败达到阈值，或请求数达到最小样本且失败率达到阈值
//! - Open → HalfOpen：进入 Open 后超过 `timeout`，在下一次访问时惰性切换
//! - HalfOpen → Closed：连续成功达到 `success_threshold`
//! - HalfOpen → Open：任意一次失败
//!
//! 内部状态由一把读写锁保护，锁只覆盖准入与结果记录两个记账步骤，
//! 从不跨越被包装的调用本身。

use futures::FutureExt;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use super::config::BreakerConfig;
use super::state::{Counts, State};
use crate::error::{CallError, Result, TrafficError};

/// 状态变化回调：`(name, from, to)`
pub type StateChangeListener = Arc<dyn Fn(&str, State, State) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct Transition {
    from: State,
    to: State,
}

#[derive(Debug)]
struct Inner {
    state: State,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
}

impl Inner {
    fn new(config: &BreakerConfig, now: Instant) -> Self {
        let mut inner = Self {
            state: State::Closed,
            generation: 0,
            counts: Counts::default(),
            expiry: None,
        };
        inner.expiry = inner.next_expiry(config, now);
        inner
    }

    fn next_expiry(&self, config: &BreakerConfig, now: Instant) -> Option<Instant> {
        match self.state {
            State::Closed if !config.interval.is_zero() => Some(now + config.interval),
            State::Closed | State::HalfOpen => None,
            State::Open => Some(now + config.timeout),
        }
    }

    /// 是否有惰性切换（窗口滚动或 Open 超时）待执行
    fn transition_due(&self, now: Instant) -> bool {
        match self.state {
            State::Closed | State::Open => self.expiry.is_some_and(|expiry| expiry <= now),
            State::HalfOpen => false,
        }
    }

    fn refresh(&mut self, config: &BreakerConfig, now: Instant) -> Option<Transition> {
        if !self.transition_due(now) {
            return None;
        }
        match self.state {
            State::Closed => {
                trace!(generation = self.generation, "rolling window elapsed, resetting counts");
                self.new_generation(config, now);
                None
            }
            State::Open => self.set_state(State::HalfOpen, config, now),
            State::HalfOpen => None,
        }
    }

    fn set_state(&mut self, state: State, config: &BreakerConfig, now: Instant) -> Option<Transition> {
        if self.state == state {
            return None;
        }
        let from = self.state;
        self.state = state;
        self.new_generation(config, now);
        Some(Transition { from, to: state })
    }

    fn new_generation(&mut self, config: &BreakerConfig, now: Instant) {
        self.generation = self.generation.wrapping_add(1);
        self.counts.clear();
        self.expiry = self.next_expiry(config, now);
    }

    fn on_success(&mut self, config: &BreakerConfig, now: Instant) -> Option<Transition> {
        match self.state {
            State::Closed => {
                self.counts.on_success();
                None
            }
            State::HalfOpen => {
                self.counts.on_success();
                if self.counts.consecutive_successes >= config.effective_success_threshold() {
                    self.set_state(State::Closed, config, now)
                } else {
                    None
                }
            }
            State::Open => None,
        }
    }

    fn on_failure(&mut self, config: &BreakerConfig, now: Instant) -> Option<Transition> {
        match self.state {
            State::Closed => {
                self.counts.on_failure();
                if ready_to_trip(&self.counts, config) {
                    self.set_state(State::Open, config, now)
                } else {
                    None
                }
            }
            State::HalfOpen => self.set_state(State::Open, config, now),
            State::Open => None,
        }
    }
}

/// Closed → Open 的判定条件
///
/// 失败率分支受 `min_requests` 约束，避免小样本误判。
fn ready_to_trip(counts: &Counts, config: &BreakerConfig) -> bool {
    if config.failure_threshold > 0 && counts.consecutive_failures >= config.failure_threshold {
        return true;
    }
    config.failure_ratio > 0.0
        && counts.requests > 0
        && counts.requests >= config.min_requests
        && counts.failure_ratio() >= config.failure_ratio
}

/// 一次已准入的调用
///
/// 被包装的 future 在完成前被丢弃（超时、`select!`、任务取消）时，
/// 按失败记录，保证 HalfOpen 的探测名额会被释放。
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    recorded: bool,
}

impl Admission<'_> {
    fn record(mut self, success: bool) {
        self.recorded = true;
        self.breaker.after_request(self.generation, success);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            debug!(
                breaker = %self.breaker.name,
                generation = self.generation,
                "admitted call dropped before completion"
            );
            self.breaker.after_request(self.generation, false);
        }
    }
}

/// 熔断器状态快照（用于外部观测）
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: State,
    pub generation: u64,
    pub counts: Counts,
}

/// 单个依赖的熔断器
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: RwLock<Inner>,
    on_state_change: Option<StateChangeListener>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("inner", &*self.inner.read())
            .finish()
    }
}

impl CircuitBreaker {
    /// 创建新的熔断器，初始状态为 Closed
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let inner = Inner::new(&config, Instant::now());
        Self {
            name: name.into(),
            config,
            inner: RwLock::new(inner),
            on_state_change: None,
        }
    }

    /// 设置状态变化回调
    #[must_use]
    pub fn with_state_change_listener(mut self, listener: StateChangeListener) -> Self {
        self.on_state_change = Some(listener);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// 当前状态（会先执行到期的惰性切换）
    pub fn state(&self) -> State {
        self.observe().0
    }

    /// 当前代
    pub fn generation(&self) -> u64 {
        self.observe().1
    }

    /// 当前代内的计数
    pub fn counts(&self) -> Counts {
        self.observe().2
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let (state, generation, counts) = self.observe();
        BreakerSnapshot {
            name: self.name.clone(),
            state,
            generation,
            counts,
        }
    }

    fn observe(&self) -> (State, u64, Counts) {
        let now = Instant::now();
        let guard = self.inner.upgradable_read();
        if !guard.transition_due(now) {
            return (guard.state, guard.generation, guard.counts);
        }
        let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
        let transition = guard.refresh(&self.config, now);
        let observed = (guard.state, guard.generation, guard.counts);
        drop(guard);
        self.notify(transition);
        observed
    }

    /// 请求准入
    ///
    /// 成功时返回准入时刻的代，完成后需把它交给 [`after_request`](Self::after_request)。
    pub fn before_request(&self) -> Result<u64> {
        let now = Instant::now();
        let mut guard = self.inner.write();
        let transition = guard.refresh(&self.config, now);
        let admitted = match guard.state {
            State::Open => Err(TrafficError::circuit_open(&self.name)),
            State::HalfOpen
                if guard.counts.outstanding() >= self.config.effective_max_requests() =>
            {
                Err(TrafficError::too_many_requests(&self.name))
            }
            State::Closed | State::HalfOpen => {
                guard.counts.on_request();
                Ok(guard.generation)
            }
        };
        drop(guard);

        self.notify(transition);
        if let Err(err) = &admitted {
            debug!(breaker = %self.name, error = %err, "request rejected");
        }
        admitted
    }

    /// 记录请求结果
    ///
    /// 如果准入之后发生过代切换，结果属于过期窗口，直接丢弃。
    pub fn after_request(&self, generation: u64, success: bool) {
        let now = Instant::now();
        let mut guard = self.inner.write();
        let refreshed = guard.refresh(&self.config, now);
        let stale = guard.generation != generation;
        let transition = if stale {
            refreshed
        } else if success {
            guard.on_success(&self.config, now)
        } else {
            guard.on_failure(&self.config, now)
        };
        drop(guard);

        if stale {
            trace!(breaker = %self.name, generation, "discarding result from a previous generation");
        }
        self.notify(transition);
    }

    /// 执行受保护的调用，由 `is_success` 根据调用输出判定成功或失败
    ///
    /// 调用内部发生 panic 时，先记为一次失败，再原样恢复 panic。
    pub async fn execute_classified<F, Fut, R, C>(&self, f: F, is_success: C) -> Result<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
        C: FnOnce(&R) -> bool,
    {
        let admission = Admission {
            breaker: self,
            generation: self.before_request()?,
            recorded: false,
        };
        match AssertUnwindSafe(async move { f().await }).catch_unwind().await {
            Ok(output) => {
                admission.record(is_success(&output));
                Ok(output)
            }
            Err(panic) => {
                admission.record(false);
                std::panic::resume_unwind(panic)
            }
        }
    }

    /// 执行受保护的调用，`Err` 计为失败
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> std::result::Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let outcome = self
            .execute_classified(f, |output: &std::result::Result<T, E>| output.is_ok())
            .await;
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(CallError::Failed(err)),
            Err(rejected) => Err(CallError::Rejected(rejected)),
        }
    }

    /// 执行无返回值的受保护调用
    pub async fn call<F, Fut, E>(&self, f: F) -> std::result::Result<(), CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<(), E>>,
    {
        self.execute(f).await
    }

    /// 重置为 Closed 并开启新的一代
    pub fn reset(&self) {
        let now = Instant::now();
        let mut guard = self.inner.write();
        let transition = guard.set_state(State::Closed, &self.config, now);
        if transition.is_none() {
            guard.new_generation(&self.config, now);
        }
        drop(guard);
        self.notify(transition);
    }

    fn notify(&self, transition: Option<Transition>) {
        let Some(Transition { from, to }) = transition else {
            return;
        };
        info!(breaker = %self.name, from = %from, to = %to, "circuit breaker state changed");
        if let Some(listener) = &self.on_state_change {
            listener(&self.name, from, to);
        }
    }
}
