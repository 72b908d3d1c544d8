//! 负载均衡策略与管理器测试

use flare_traffic_core::config::LoadBalancerConfig;
use flare_traffic_core::discovery::{HealthStatus, ServiceInstance};
use flare_traffic_core::error::{ErrorCode, TrafficError};
use flare_traffic_core::loadbalance::{
    Algorithm, ConsistentHash, InstanceStats, LoadBalancerManager, LoadBalancerStrategy,
    SelectionContext, SourceHash, StatsUpdate, TagFilter, UNKNOWN_SERVICE, VIRTUAL_NODES,
};
use std::collections::HashMap;
use std::time::Duration;

fn instance(id: &str, port: u16) -> ServiceInstance {
    ServiceInstance::new("user-service", id, format!("127.0.0.1:{port}").parse().unwrap())
}

fn instances(ids: &[&str]) -> Vec<ServiceInstance> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| instance(id, 9000 + i as u16))
        .collect()
}

fn manager(algorithm: &str) -> LoadBalancerManager {
    LoadBalancerManager::new(&LoadBalancerConfig {
        algorithm: algorithm.to_string(),
        ..Default::default()
    })
    .unwrap()
}

// ============================================================
// 算法名解析
// ============================================================

#[test]
fn algorithm_names_and_aliases() {
    for algorithm in Algorithm::ALL {
        assert_eq!(algorithm.as_str().parse::<Algorithm>().unwrap(), algorithm);
    }
    assert_eq!("rr".parse::<Algorithm>().unwrap(), Algorithm::RoundRobin);
    assert_eq!("least-conn".parse::<Algorithm>().unwrap(), Algorithm::LeastConnections);
    assert_eq!("ip_hash".parse::<Algorithm>().unwrap(), Algorithm::SourceHash);
    assert_eq!(
        "fastest".parse::<Algorithm>().unwrap_err(),
        TrafficError::InvalidAlgorithm("fastest".to_string())
    );
}

#[test]
fn invalid_algorithm_in_config_is_rejected() {
    let result = LoadBalancerManager::new(&LoadBalancerConfig {
        algorithm: "fastest".to_string(),
        ..Default::default()
    });
    let err = result.err().unwrap();
    assert_eq!(err.code(), ErrorCode::InvalidAlgorithm);
}

// ============================================================
// 各算法
// ============================================================

#[tokio::test]
async fn round_robin_cycles_in_order() {
    let lb = manager("round_robin");
    let candidates = instances(&["a", "b", "c"]);

    let mut picked = Vec::new();
    for _ in 0..4 {
        picked.push(lb.select(&candidates, "").await.unwrap().instance_id);
    }
    assert_eq!(picked, vec!["a", "b", "c", "a"]);
}

#[tokio::test]
async fn weighted_round_robin_follows_weights() {
    let mut weights = HashMap::new();
    weights.insert("a".to_string(), 3);
    weights.insert("b".to_string(), 1);
    let lb = LoadBalancerManager::new(&LoadBalancerConfig {
        algorithm: "weighted_round_robin".to_string(),
        weights,
        ..Default::default()
    })
    .unwrap();
    let candidates = instances(&["a", "b"]);

    let mut picked = Vec::new();
    for _ in 0..8 {
        picked.push(lb.select(&candidates, "").await.unwrap().instance_id);
    }
    assert_eq!(picked, vec!["a", "a", "a", "b", "a", "a", "a", "b"]);
}

#[tokio::test]
async fn weighted_round_robin_uses_instance_weight_when_unconfigured() {
    let lb = manager("wrr");
    let candidates = vec![instance("a", 9000).with_weight(2), instance("b", 9001)];

    let mut picked = Vec::new();
    for _ in 0..3 {
        picked.push(lb.select(&candidates, "").await.unwrap().instance_id);
    }
    assert_eq!(picked, vec!["a", "a", "b"]);
}

#[tokio::test]
async fn least_connections_picks_minimum() {
    let lb = manager("least_connections");
    let candidates = instances(&["a", "b", "c"]);

    // a: 5, b: 2, c: 7
    for (id, active) in [("a", 5), ("b", 2), ("c", 7)] {
        for _ in 0..active {
            lb.update_stats(id, StatsUpdate::Acquire).await;
        }
    }
    assert_eq!(lb.select(&candidates, "").await.unwrap().instance_id, "b");

    lb.update_stats(
        "a",
        StatsUpdate::Release {
            success: true,
            response_time: Duration::from_millis(3),
        },
    )
    .await;
    assert_eq!(lb.instance_stats("a").await.active_connections, 4);
}

#[tokio::test]
async fn least_connections_tie_goes_to_first() {
    let lb = manager("least_connections");
    let candidates = instances(&["a", "b", "c"]);
    lb.update_stats("a", StatsUpdate::Acquire).await;

    // b 与 c 均为 0（c 没有任何统计记录）
    assert_eq!(lb.select(&candidates, "").await.unwrap().instance_id, "b");
}

#[tokio::test]
async fn random_stays_within_candidates() {
    let lb = manager("random");
    let candidates = instances(&["a", "b", "c"]);

    for _ in 0..200 {
        let picked = lb.select(&candidates, "").await.unwrap();
        assert!(candidates.contains(&picked));
    }
}

#[test]
fn weighted_random_respects_weights() {
    let strategy = flare_traffic_core::loadbalance::WeightedRandom;
    let candidates = vec![instance("a", 9000).with_weight(3), instance("b", 9001).with_weight(1)];
    let stats = HashMap::new();
    let weights = HashMap::new();
    let ctx = SelectionContext::new("", &stats, &weights);

    let mut hits = HashMap::new();
    for _ in 0..10_000 {
        let picked = strategy.select(&candidates, &ctx).unwrap();
        *hits.entry(picked.instance_id.clone()).or_insert(0u32) += 1;
    }

    let ratio = f64::from(hits["a"]) / f64::from(hits["b"]);
    assert!((2.5..3.6).contains(&ratio), "ratio = {ratio}");
}

#[test]
fn consistent_hash_is_stable_and_moves_few_keys() {
    let strategy = ConsistentHash::new();
    let stats: HashMap<String, InstanceStats> = HashMap::new();
    let weights = HashMap::new();

    let four = instances(&["node-1", "node-2", "node-3", "node-4"]);
    let mut five = four.clone();
    five.push(instance("node-5", 9100));

    let keys: Vec<String> = (0..2000).map(|i| format!("user-{i}")).collect();
    let route = |candidates: &[ServiceInstance], key: &str| {
        let ctx = SelectionContext::new(key, &stats, &weights);
        strategy.select(candidates, &ctx).unwrap().instance_id.clone()
    };

    // 同一键在成员不变时总是落到同一实例
    for key in keys.iter().take(50) {
        assert_eq!(route(&four, key), route(&four, key));
    }
    assert_eq!(strategy.ring_len(), 4 * VIRTUAL_NODES);

    let mut moved = 0;
    for key in &keys {
        let before = route(&four, key);
        let after = route(&five, key);
        if before != after {
            // 只会迁移到新加入的实例
            assert_eq!(after, "node-5");
            moved += 1;
        }
    }
    // 4 个实例增加到 5 个，约 1/5 的键发生迁移
    let fraction = moved as f64 / keys.len() as f64;
    assert!((0.1..0.35).contains(&fraction), "moved fraction = {fraction}");
}

#[test]
fn source_hash_is_deterministic() {
    let strategy = SourceHash;
    let candidates = instances(&["a", "b", "c"]);
    let stats = HashMap::new();
    let weights = HashMap::new();

    let ctx = SelectionContext::new("10.0.0.7", &stats, &weights);
    let first = strategy.select(&candidates, &ctx).unwrap().instance_id.clone();
    for _ in 0..10 {
        assert_eq!(strategy.select(&candidates, &ctx).unwrap().instance_id, first);
    }

    let empty: Vec<ServiceInstance> = Vec::new();
    assert!(strategy.select(&empty, &ctx).is_none());
}

// ============================================================
// 过滤与错误
// ============================================================

#[tokio::test]
async fn unhealthy_instances_are_filtered() {
    let lb = manager("round_robin");
    let candidates = vec![
        instance("a", 9000).with_health(HealthStatus::Critical),
        instance("b", 9001),
    ];
    for _ in 0..3 {
        assert_eq!(lb.select(&candidates, "").await.unwrap().instance_id, "b");
    }

    let all_down: Vec<_> = candidates
        .into_iter()
        .map(|inst| inst.with_health(HealthStatus::Warning))
        .collect();
    let err = lb.select(&all_down, "").await.unwrap_err();
    assert_eq!(err, TrafficError::no_healthy_instances("user-service"));
}

#[tokio::test]
async fn health_check_can_be_disabled() {
    let lb = LoadBalancerManager::new(&LoadBalancerConfig {
        health_check_enabled: false,
        ..Default::default()
    })
    .unwrap();
    let candidates = vec![instance("a", 9000).with_health(HealthStatus::Critical)];
    assert_eq!(lb.select(&candidates, "").await.unwrap().instance_id, "a");
}

#[tokio::test]
async fn empty_candidates_fail() {
    let lb = manager("least_connections");
    let err = lb.select(&[], "").await.unwrap_err();
    assert_eq!(err, TrafficError::no_healthy_instances(UNKNOWN_SERVICE));

    let err = lb.select_for("billing", &[], "").await.unwrap_err();
    assert_eq!(err, TrafficError::no_healthy_instances("billing"));
    assert_eq!(err.to_string(), "no healthy instances available for 'billing'");

    let failures = lb.algorithm_stats().await[&Algorithm::LeastConnections].failures;
    assert_eq!(failures, 2);
}

#[tokio::test]
async fn tag_filter_narrows_candidates() {
    let lb = manager("round_robin").with_filter(TagFilter::default().with_tag("zone", "east"));
    let candidates = vec![
        instance("a", 9000).with_tag("zone", "west"),
        instance("b", 9001).with_tag("zone", "east"),
    ];
    for _ in 0..3 {
        assert_eq!(lb.select(&candidates, "").await.unwrap().instance_id, "b");
    }
}

#[tokio::test]
async fn per_call_algorithm_override() {
    let lb = manager("round_robin");
    let candidates = instances(&["a", "b", "c"]);

    let first = lb
        .select_with(&candidates, "session-42", "consistent_hash")
        .await
        .unwrap();
    let second = lb
        .select_with(&candidates, "session-42", "consistent-hash")
        .await
        .unwrap();
    assert_eq!(first, second);

    let err = lb.select_with(&candidates, "", "nope").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidAlgorithm);
}

// ============================================================
// 统计
// ============================================================

#[tokio::test]
async fn selection_updates_stats() {
    let lb = manager("round_robin");
    let candidates = instances(&["a", "b"]);
    lb.select(&candidates, "").await.unwrap();
    lb.select(&candidates, "").await.unwrap();
    lb.select(&candidates, "").await.unwrap();

    let a = lb.instance_stats("a").await;
    assert_eq!(a.total_requests, 2);
    assert!(a.last_used.is_some());
    assert_eq!(lb.instance_stats("b").await.total_requests, 1);
    assert_eq!(lb.instance_stats("missing").await, InstanceStats::default());

    let algorithms = lb.algorithm_stats().await;
    assert_eq!(algorithms[&Algorithm::RoundRobin].selections, 3);
    assert!(algorithms[&Algorithm::RoundRobin].last_selected.is_some());

    lb.update_stats(
        "b",
        StatsUpdate::Release {
            success: false,
            response_time: Duration::from_millis(12),
        },
    )
    .await;
    let b = lb.instance_stats("b").await;
    assert_eq!(b.failed_requests, 1);
    assert_eq!(b.active_connections, 0);
    assert_eq!(b.response_time, Duration::from_millis(12));
}

#[tokio::test]
async fn disabled_stats_still_track_connections() {
    let lb = LoadBalancerManager::new(&LoadBalancerConfig {
        algorithm: "least_connections".to_string(),
        stats_enabled: false,
        ..Default::default()
    })
    .unwrap();
    let candidates = instances(&["a", "b"]);

    lb.update_stats("a", StatsUpdate::Acquire).await;
    assert_eq!(lb.select(&candidates, "").await.unwrap().instance_id, "b");

    assert_eq!(lb.instance_stats("b").await.total_requests, 0);
    assert_eq!(lb.instance_stats("a").await.active_connections, 1);
    assert!(lb.algorithm_stats().await.is_empty());
}
