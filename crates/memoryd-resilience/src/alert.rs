use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: String,
    pub alert_type: String,
    pub severity: Severity,
    pub message: String,
    pub metadata: BTreeMap<String, String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Alert {
    /// Stable hash of `(alert_type, deduplication-relevant metadata)`
    /// (spec §3 Alert). `metadata` is a `BTreeMap` so iteration order
    /// is already deterministic.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.alert_type.as_bytes());
        for (key, value) in &self.metadata {
            hasher.update(b"\0");
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Evaluates a threshold-triggered alert condition. `low_hit_rate`-style
/// metric types use an inverted comparison: the alert fires when the
/// observed value falls *below* the threshold rather than above it.
pub fn threshold_breached(alert_type: &str, observed: f64, threshold: f64) -> bool {
    if alert_type.starts_with("low_") {
        observed < threshold
    } else {
        observed >= threshold
    }
}

/// type -> set of webhook URLs.
#[derive(Default, Clone)]
pub struct AlertRouter {
    routes: BTreeMap<String, Vec<String>>,
}

impl AlertRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, alert_type: impl Into<String>, urls: Vec<String>) -> Self {
        self.routes.insert(alert_type.into(), urls);
        self
    }

    pub fn urls_for(&self, alert_type: &str) -> &[String] {
        self.routes.get(alert_type).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[async_trait::async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(&self, url: &str, alert: &Alert) -> Result<(), String>;
}

pub struct ReqwestWebhookSender {
    client: reqwest::Client,
}

impl Default for ReqwestWebhookSender {
    fn default() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[async_trait::async_trait]
impl WebhookSender for ReqwestWebhookSender {
    async fn send(&self, url: &str, alert: &Alert) -> Result<(), String> {
        self.client
            .post(url)
            .json(alert)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}

const RETRY_DELAY: Duration = Duration::from_secs(10);

/// Accepts alerts, suppresses re-delivery within `dedup_window` keyed
/// on fingerprint, and fans delivery out to every URL the router maps
/// the alert's type to. Delivery runs on a spawned task per webhook so
/// `submit` never blocks on network I/O; a failed delivery is retried
/// exactly once after `RETRY_DELAY` before being dropped.
pub struct AlertManager {
    router: AlertRouter,
    sender: Arc<dyn WebhookSender>,
    dedup_window: Duration,
    last_sent: DashMap<String, std::time::Instant>,
}

impl AlertManager {
    pub fn new(router: AlertRouter, sender: Arc<dyn WebhookSender>, dedup_window: Duration) -> Self {
        Self { router, sender, dedup_window, last_sent: DashMap::new() }
    }

    /// Returns `true` if the alert was dispatched (not suppressed as a
    /// duplicate). Dispatch itself happens on background tasks.
    pub fn submit(&self, alert: Alert) -> bool {
        let fingerprint = alert.fingerprint();
        let now = std::time::Instant::now();

        let mut suppressed = false;
        self.last_sent
            .entry(fingerprint.clone())
            .and_modify(|last| {
                if now.duration_since(*last) < self.dedup_window {
                    suppressed = true;
                } else {
                    *last = now;
                }
            })
            .or_insert(now);
        if suppressed {
            tracing::debug!(alert_type = %alert.alert_type, fingerprint = %fingerprint, "alert suppressed as duplicate");
            return false;
        }

        let urls = self.router.urls_for(&alert.alert_type).to_vec();
        for url in urls {
            let sender = Arc::clone(&self.sender);
            let alert = alert.clone();
            tokio::spawn(async move {
                deliver_with_one_retry(sender, &url, &alert).await;
            });
        }
        true
    }
}

async fn deliver_with_one_retry(sender: Arc<dyn WebhookSender>, url: &str, alert: &Alert) {
    if sender.send(url, alert).await.is_ok() {
        return;
    }
    tracing::warn!(url = %url, alert_type = %alert.alert_type, "webhook delivery failed, retrying once");
    tokio::time::sleep(RETRY_DELAY).await;
    if let Err(e) = sender.send(url, alert).await {
        tracing::error!(url = %url, alert_type = %alert.alert_type, error = %e, "webhook delivery dropped after retry");
    }
}
