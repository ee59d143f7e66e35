//! Notifier that writes messages to the structured log.

use paywatch_types::ChatTarget;

use crate::Notifier;

/// Logs every outbound message at `info`. Used when no chat bridge is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_message(&self, target: &ChatTarget, text: &str) {
        tracing::info!(chat = %target, text, "outbound message");
    }
}
