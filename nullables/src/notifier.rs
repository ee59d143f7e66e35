//! Nullable notifier: records outbound chat messages instead of sending them.

use paywatch_notify::Notifier;
use paywatch_types::ChatTarget;
use std::sync::Mutex;

/// A message captured by [`NullNotifier`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub target: ChatTarget,
    pub text: String,
}

/// Captures messages for later inspection.
#[derive(Debug, Default)]
pub struct NullNotifier {
    sent: Mutex<Vec<SentMessage>>,
}

impl NullNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages sent so far, in order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Messages sent to one chat.
    pub fn sent_to(&self, target: &ChatTarget) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|m| &m.target == target)
            .map(|m| m.text)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

impl Notifier for NullNotifier {
    fn send_message(&self, target: &ChatTarget, text: &str) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentMessage {
                target: target.clone(),
                text: text.to_string(),
            });
        }
    }
}
