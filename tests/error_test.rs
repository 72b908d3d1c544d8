//! 错误代码与错误类型测试

use flare_traffic_core::error::{CallError, ErrorCategory, ErrorCode, TrafficError};

#[test]
fn codes_round_trip_through_numbers() {
    for code in [
        ErrorCode::CircuitOpen,
        ErrorCode::TooManyRequests,
        ErrorCode::NoHealthyInstances,
        ErrorCode::InvalidAlgorithm,
        ErrorCode::RegistryUnavailable,
        ErrorCode::ConfigurationError,
        ErrorCode::UnknownError,
    ] {
        assert_eq!(ErrorCode::from_u32(code.as_u32()), Some(code));
    }
    assert_eq!(ErrorCode::from_u32(4242), None);
}

#[test]
fn codes_are_grouped_by_range() {
    assert_eq!(ErrorCode::CircuitOpen.category(), ErrorCategory::CircuitBreaking);
    assert_eq!(ErrorCode::InvalidAlgorithm.category(), ErrorCategory::LoadBalancing);
    assert_eq!(ErrorCode::RegistryUnavailable.category(), ErrorCategory::Discovery);
    assert_eq!(ErrorCode::ConfigurationError.category(), ErrorCategory::General);
    assert_eq!(ErrorCategory::LoadBalancing.to_string(), "LOAD_BALANCING");
    assert_eq!(ErrorCode::NoHealthyInstances.to_string(), "NO_HEALTHY_INSTANCES");
}

#[test]
fn rejections_are_distinguished() {
    assert!(ErrorCode::CircuitOpen.is_rejection());
    assert!(ErrorCode::TooManyRequests.is_rejection());
    assert!(!ErrorCode::ConfigurationError.is_rejection());

    let bulkhead = TrafficError::BulkheadFull {
        name: "media".to_string(),
        capacity: 8,
    };
    assert_eq!(bulkhead.code(), ErrorCode::TooManyRequests);
    assert_eq!(bulkhead.to_string(), "bulkhead 'media' is full (capacity 8)");
    assert_eq!(
        TrafficError::circuit_open("orders").to_string(),
        "circuit breaker 'orders' is open"
    );
}

#[test]
fn call_error_keeps_both_sides_apart() {
    let rejected: CallError<std::io::Error> = TrafficError::too_many_requests("orders").into();
    assert!(rejected.is_rejected());
    assert_eq!(rejected.to_string(), "circuit breaker 'orders': too many requests");
    assert!(rejected.into_inner().is_none());

    let failed: CallError<String> = CallError::Failed("timeout".to_string());
    assert!(!failed.is_rejected());
    assert!(failed.rejection().is_none());
    assert_eq!(failed.to_string(), "call failed: timeout");
}
