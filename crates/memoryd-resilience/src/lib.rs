mod alert;
mod breaker;
mod registry;

pub use alert::{Alert, AlertManager, AlertRouter, ReqwestWebhookSender, Severity, WebhookSender, threshold_breached};
pub use breaker::{BreakerConfig, BreakerCounters, BreakerState, CallDecision, CircuitBreaker};
pub use registry::BreakerRegistry;
