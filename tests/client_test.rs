//! ResilientClient 端到端测试：注册表 → 熔断 → 负载均衡 → 调用

use flare_traffic_core::breaker::{BreakerConfig, State};
use flare_traffic_core::client::ResilientClient;
use flare_traffic_core::config::Config;
use flare_traffic_core::discovery::{HealthStatus, ServiceInstance, ServiceRegistry, StaticRegistry};
use flare_traffic_core::error::{CallError, ErrorCode, TrafficError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

async fn registry_with(ids: &[&str]) -> StaticRegistry {
    let registry = StaticRegistry::new();
    for (i, id) in ids.iter().enumerate() {
        let address = format!("10.0.0.{}:8080", i + 1).parse().unwrap();
        registry
            .register(ServiceInstance::new("orders", *id, address))
            .await;
    }
    registry
}

fn client(registry: &StaticRegistry) -> ResilientClient {
    let mut config = Config::default();
    config.circuit_breaker = BreakerConfig::default()
        .with_failure_threshold(2)
        .with_timeout(Duration::from_secs(30));
    let registry: Arc<dyn ServiceRegistry> = Arc::new(registry.clone());
    ResilientClient::from_config(registry, &config).unwrap()
}

#[tokio::test]
async fn successful_calls_rotate_instances() {
    let registry = registry_with(&["o-1", "o-2"]).await;
    let client = client(&registry);

    let mut seen = Vec::new();
    for _ in 0..4 {
        let address = client
            .call("orders", "", |instance| async move {
                Ok::<_, String>(instance.address.to_string())
            })
            .await
            .unwrap();
        seen.push(address);
    }
    assert_eq!(
        seen,
        vec![
            "10.0.0.1:8080",
            "10.0.0.2:8080",
            "10.0.0.1:8080",
            "10.0.0.2:8080",
        ]
    );

    let breaker = client.breakers().get("orders");
    assert_eq!(breaker.counts().total_successes, 4);

    let stats = client.balancer().instance_stats("o-1").await;
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.active_connections, 0);
}

#[tokio::test]
async fn failures_trip_the_service_breaker() {
    let registry = registry_with(&["o-1"]).await;
    let client = client(&registry);
    let invoked = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let invoked = invoked.clone();
        let err = client
            .call("orders", "", |_instance| async move {
                invoked.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("503 from upstream")
            })
            .await
            .unwrap_err();
        assert_eq!(err.into_inner(), Some("503 from upstream"));
    }
    assert_eq!(client.breakers().get("orders").state(), State::Open);

    let counter = invoked.clone();
    let err = client
        .call("orders", "", |_instance| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), &str>(())
        })
        .await
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&TrafficError::circuit_open("orders")));
    assert_eq!(invoked.load(Ordering::SeqCst), 2);

    let stats = client.balancer().instance_stats("o-1").await;
    assert_eq!(stats.failed_requests, 2);
    assert_eq!(stats.active_connections, 0);
}

#[tokio::test]
async fn unhealthy_instances_are_skipped() {
    let registry = registry_with(&["o-1", "o-2"]).await;
    let client = client(&registry);
    assert!(
        registry
            .set_health("orders", "o-1", HealthStatus::Critical)
            .await
    );

    for _ in 0..3 {
        let id = client
            .call("orders", "", |instance| async move {
                Ok::<_, ()>(instance.instance_id)
            })
            .await
            .unwrap();
        assert_eq!(id, "o-2");
    }
}

#[tokio::test]
async fn no_instances_counts_against_the_breaker() {
    let registry = StaticRegistry::new();
    let client = client(&registry);

    for _ in 0..2 {
        let err = client
            .call("billing", "", |_instance| async { Ok::<(), ()>(()) })
            .await
            .unwrap_err();
        assert_eq!(
            err.rejection().map(TrafficError::code),
            Some(ErrorCode::NoHealthyInstances)
        );
        assert_eq!(
            err.rejection(),
            Some(&TrafficError::no_healthy_instances("billing"))
        );
    }

    // 连续两次无可用实例后熔断器打开
    let err = client
        .call("billing", "", |_instance| async { Ok::<(), ()>(()) })
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::Rejected(TrafficError::CircuitOpen { .. })));
}

#[tokio::test]
async fn deregistered_instances_disappear() {
    let registry = registry_with(&["o-1", "o-2"]).await;
    let client = client(&registry);
    assert!(registry.deregister("orders", "o-1").await);
    assert!(!registry.deregister("orders", "o-1").await);

    let id = client
        .call("orders", "", |instance| async move {
            Ok::<_, ()>(instance.instance_id)
        })
        .await
        .unwrap();
    assert_eq!(id, "o-2");
}

#[tokio::test]
async fn breakers_are_isolated_per_service() {
    let registry = registry_with(&["o-1"]).await;
    registry
        .register(ServiceInstance::new(
            "payments",
            "p-1",
            "10.0.1.1:8080".parse().unwrap(),
        ))
        .await;
    let client = client(&registry);

    for _ in 0..2 {
        client
            .call("orders", "", |_instance| async { Err::<(), _>("down") })
            .await
            .unwrap_err();
    }
    assert_eq!(client.breakers().get("orders").state(), State::Open);

    client
        .call("payments", "", |_instance| async { Ok::<(), &str>(()) })
        .await
        .unwrap();
    assert_eq!(client.breakers().get("payments").state(), State::Closed);
}

#[tokio::test(start_paused = true)]
async fn cancelled_call_releases_its_connection() {
    let registry = registry_with(&["o-1", "o-2"]).await;
    let client = client(&registry);

    let cancelled = tokio::time::timeout(
        Duration::from_millis(10),
        client.call("orders", "", |_instance| std::future::pending::<Result<(), ()>>()),
    )
    .await;
    assert!(cancelled.is_err());

    let stats = client.balancer().instance_stats("o-1").await;
    assert_eq!(stats.active_connections, 0);
    assert_eq!(stats.failed_requests, 1);

    // 被取消的调用计为一次失败
    let counts = client.breakers().get("orders").counts();
    assert_eq!(counts.requests, 1);
    assert_eq!(counts.total_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn least_connections_recovers_after_cancellation() {
    let registry = registry_with(&["o-1", "o-2"]).await;
    let mut config = Config::default();
    config.load_balancer.algorithm = "least_connections".to_string();
    let shared: Arc<dyn ServiceRegistry> = Arc::new(registry.clone());
    let client = ResilientClient::from_config(shared, &config).unwrap();

    let _ = tokio::time::timeout(
        Duration::from_millis(10),
        client.call("orders", "", |_instance| std::future::pending::<Result<(), ()>>()),
    )
    .await;

    // o-1 没有残留的活跃连接，仍按先出现的顺序被选中
    let id = client
        .call("orders", "", |instance| async move {
            Ok::<_, ()>(instance.instance_id)
        })
        .await
        .unwrap();
    assert_eq!(id, "o-1");
}
