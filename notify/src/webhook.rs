//! Notifier that POSTs messages to a chat bridge.
//!
//! Body: `{"chat": "<target>", "text": "<message>"}`. Each message is sent on
//! its own spawned task so callers never wait on the bridge; [`WebhookNotifier::flush`]
//! waits for the ones still in flight before the process exits.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use paywatch_types::ChatTarget;

use crate::Notifier;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    chat: &'a str,
    text: &'a str,
}

/// Forwards messages to an HTTP endpoint.
#[derive(Clone)]
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
    in_flight: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
            timeout: DEFAULT_TIMEOUT,
            in_flight: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait for every message handed to [`Notifier::send_message`] so far.
    pub async fn flush(&self) {
        let pending: Vec<_> = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in pending {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!("chat delivery task ended abnormally: {e}");
                }
            }
        }
    }

    /// Deliver one message and wait for the bridge to acknowledge it.
    pub async fn deliver(&self, target: &ChatTarget, text: &str) -> Result<(), String> {
        let resp = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&OutboundMessage {
                chat: target.as_str(),
                text,
            })
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {} from {}", resp.status(), self.url));
        }
        Ok(())
    }
}

impl Notifier for WebhookNotifier {
    fn send_message(&self, target: &ChatTarget, text: &str) {
        let this = self.clone();
        let target = target.clone();
        let text = text.to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(async move {
                    if let Err(e) = this.deliver(&target, &text).await {
                        tracing::warn!(chat = %target, "failed to deliver message: {e}");
                    }
                });
                let mut in_flight = self
                    .in_flight
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                in_flight.retain(|t| !t.is_finished());
                in_flight.push(task);
            }
            Err(_) => {
                tracing::warn!(chat = %target, "no async runtime; dropping outbound message");
            }
        }
    }
}
