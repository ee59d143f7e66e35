//! Outbound chat notifications.
//!
//! The engine needs exactly one capability from the chat platform:
//! `send_message(chat_target, text)`. Delivery is fire-and-forget; a slow or
//! failing chat bridge never holds up a settlement.

pub mod log;
pub mod webhook;

pub use log::LogNotifier;
pub use webhook::WebhookNotifier;

use paywatch_types::ChatTarget;

/// Sends a text message to a chat.
pub trait Notifier: Send + Sync {
    fn send_message(&self, target: &ChatTarget, text: &str);
}
