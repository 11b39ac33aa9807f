use axum::{
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,   // Normal operation
    Open,     // Failure detected, failing fast
    HalfOpen, // Testing if the carrier is back
}

/// Trips open when the carrier keeps failing so operators get an
/// immediate 503 instead of a queue of 30-second timeouts.
pub struct CircuitBreaker {
    pub name: String,
    pub state: RwLock<CircuitState>,
    pub failure_count: AtomicUsize,
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
    pub last_failure: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: usize, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicUsize::new(0),
            failure_threshold: threshold,
            reset_timeout: timeout,
            last_failure: RwLock::new(None),
        }
    }

    pub async fn check(&self) -> bool {
        let state = *self.state.read().await;
        if state == CircuitState::Closed {
            return true;
        }

        if state == CircuitState::Open {
            let last_fail = *self.last_failure.read().await;
            if let Some(instant) = last_fail {
                if instant.elapsed() > self.reset_timeout {
                    let mut s = self.state.write().await;
                    *s = CircuitState::HalfOpen;
                    tracing::info!("Circuit Breaker [{}] moving to Half-Open", self.name);
                    return true;
                }
            }
            return false;
        }

        // Half-Open allows one request through
        true
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        if *state == CircuitState::HalfOpen {
            *state = CircuitState::Closed;
            self.failure_count.store(0, Ordering::SeqCst);
            tracing::info!("Circuit Breaker [{}] recovered to Closed", self.name);
        } else if *state == CircuitState::Closed {
            self.failure_count.store(0, Ordering::SeqCst);
        }
    }

    pub async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write().await;

        if count >= self.failure_threshold || *state == CircuitState::HalfOpen {
            *state = CircuitState::Open;
            let mut last = self.last_failure.write().await;
            *last = Some(Instant::now());
            tracing::error!("Circuit Breaker [{}] TRIPPED to Open. Failures: {}", self.name, count);
        }
    }
}

/// Guards the routes that reach the carrier; waybill pool inspection
/// and locally-served reads pass through untouched.
pub async fn circuit_breaker_middleware(
    State(state): State<AppState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> impl IntoResponse {
    let path = req.uri().path();
    let guarded = path.starts_with("/v1/shipments")
        || path.starts_with("/v1/pickups")
        || path.starts_with("/v1/tracking")
        || path.starts_with("/v1/waybills/allocate")
        || path.starts_with("/v1/waybills/fetch");

    if guarded {
        let cb = &state.resiliency.carrier_cb;
        if !cb.check().await {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Circuit Breaker [{}] is OPEN", cb.name),
            )
                .into_response();
        }

        let response = next.run(req).await;

        if response.status().is_server_error() {
            cb.record_failure().await;
        } else {
            cb.record_success().await;
        }

        response.into_response()
    } else {
        next.run(req).await.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_breaker_trips_after_threshold() {
        let cb = CircuitBreaker::new("carrier", 3, Duration::from_secs(60));
        assert!(cb.check().await);

        for _ in 0..3 {
            cb.record_failure().await;
        }
        assert!(!cb.check().await);
    }

    #[tokio::test]
    async fn test_breaker_recovers_through_half_open() {
        let cb = CircuitBreaker::new("carrier", 1, Duration::from_millis(10));
        cb.record_failure().await;
        assert!(!cb.check().await);

        tokio::time::sleep(Duration::from_millis(20)).await;
        // Half-open probe allowed, success closes.
        assert!(cb.check().await);
        cb.record_success().await;
        assert_eq!(*cb.state.read().await, CircuitState::Closed);
    }
}
