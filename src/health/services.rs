use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::warn;

use crate::feedback::{CoachingService, FeedbackError};
use crate::meals::repo::MealLogStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unreachable,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ComponentHealth {
    fn new(status: HealthStatus, started: Instant, detail: Option<String>) -> Self {
        Self {
            status,
            latency_ms: started.elapsed().as_millis() as u64,
            detail,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub store: ComponentHealth,
    pub feedback_service: ComponentHealth,
}

impl HealthReport {
    pub fn new(store: ComponentHealth, feedback_service: ComponentHealth) -> Self {
        let status = match (store.status, feedback_service.status) {
            (HealthStatus::Unreachable, _) => HealthStatus::Unreachable,
            (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
            _ => HealthStatus::Degraded,
        };
        Self { status, store, feedback_service }
    }
}

/// Pings the store. Slower than half of `timeout` counts as degraded.
pub async fn check_store(store: &dyn MealLogStore, timeout: Duration) -> ComponentHealth {
    let started = Instant::now();
    match tokio::time::timeout(timeout, store.ping()).await {
        Ok(Ok(())) if started.elapsed() <= timeout / 2 => {
            ComponentHealth::new(HealthStatus::Healthy, started, None)
        }
        Ok(Ok(())) => ComponentHealth::new(
            HealthStatus::Degraded,
            started,
            Some("slow response".into()),
        ),
        Ok(Err(e)) => {
            warn!(error = %e, "store health check failed");
            ComponentHealth::new(HealthStatus::Unreachable, started, Some(e.to_string()))
        }
        Err(_) => ComponentHealth::new(
            HealthStatus::Unreachable,
            started,
            Some(format!("no answer within {timeout:?}")),
        ),
    }
}

/// Asks the text-generation server for its model list.
pub async fn check_feedback_service(
    coach: &dyn CoachingService,
    model: &str,
    timeout: Duration,
) -> ComponentHealth {
    let started = Instant::now();
    let result = match tokio::time::timeout(timeout, coach.probe(timeout)).await {
        Ok(r) => r,
        Err(_) => Err(FeedbackError::Timeout(timeout)),
    };
    match result {
        Ok(catalog) if catalog.model_available => {
            ComponentHealth::new(HealthStatus::Healthy, started, None)
        }
        Ok(catalog) => ComponentHealth::new(
            HealthStatus::Degraded,
            started,
            Some(format!(
                "model {model} is not installed (available: {})",
                catalog.models.join(", ")
            )),
        ),
        Err(e @ FeedbackError::Status(_)) => {
            ComponentHealth::new(HealthStatus::Degraded, started, Some(e.to_string()))
        }
        Err(e) => ComponentHealth::new(HealthStatus::Unreachable, started, Some(e.to_string())),
    }
}
