//! Inbound chat events and their dispatch onto the engine.
//!
//! A chat bridge forwards two kinds of events: commands typed by a user and
//! callbacks from message buttons. Commands of the form
//! `/start buy_subscription_<offer>` request an offer; callbacks of the form
//! `cancel_payment_<service>` cancel a waiting payment. Every other command
//! is ignored.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use paywatch_types::{BuyerId, ChatTarget, OfferId, ServiceId, ServiceRecord};

use crate::{messages, EngineError, PaymentEngine};

const START_COMMAND: &str = "/start";
const BUY_PREFIX: &str = "buy_subscription_";
const CANCEL_PREFIX: &str = "cancel_payment_";

/// The command text that requests `offer_id`.
pub fn buy_command(offer_id: OfferId) -> String {
    format!("{START_COMMAND} {BUY_PREFIX}{}", offer_id.get())
}

/// The callback payload that cancels service `id`.
pub fn cancel_callback(id: ServiceId) -> String {
    format!("{CANCEL_PREFIX}{}", id.get())
}

/// An event received from the chat platform.
///
/// Buyer and chat identifiers are opaque; the engine never interprets them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A text command.
    Command {
        buyer: BuyerId,
        chat: ChatTarget,
        /// Whether the command was sent in the buyer's private chat.
        #[serde(default)]
        private: bool,
        text: String,
    },
    /// A button press carrying callback data.
    Callback {
        buyer: BuyerId,
        chat: ChatTarget,
        data: String,
    },
}

impl ChatEvent {
    pub fn buyer(&self) -> &BuyerId {
        match self {
            Self::Command { buyer, .. } | Self::Callback { buyer, .. } => buyer,
        }
    }

    pub fn chat(&self) -> &ChatTarget {
        match self {
            Self::Command { chat, .. } | Self::Callback { chat, .. } => chat,
        }
    }
}

/// What an event asks the engine to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatIntent {
    /// A bare `/start`, or `/start` with an argument it does not recognise.
    Start,
    Buy(OfferId),
    Cancel(ServiceId),
}

/// Parse a command. Returns `None` for anything other than `/start`.
///
/// Accepts the `/start@botname` form some platforms send in groups.
pub fn parse_command(text: &str) -> Option<ChatIntent> {
    let mut parts = text.split_whitespace();
    let command = parts.next()?;
    let name = command.split('@').next()?;
    if name != START_COMMAND {
        return None;
    }
    let intent = parts
        .next()
        .and_then(|arg| arg.strip_prefix(BUY_PREFIX))
        .and_then(|id| id.parse::<u64>().ok())
        .map(|id| ChatIntent::Buy(OfferId::new(id)))
        .unwrap_or(ChatIntent::Start);
    Some(intent)
}

/// Parse callback data. Returns `None` for unknown buttons.
pub fn parse_callback(data: &str) -> Option<ChatIntent> {
    data.trim()
        .strip_prefix(CANCEL_PREFIX)
        .and_then(|id| id.parse::<u64>().ok())
        .map(|id| ChatIntent::Cancel(ServiceId::new(id)))
}

/// Result of dispatching one event.
#[derive(Debug)]
pub enum ChatOutcome {
    /// Not addressed to this engine.
    Ignored,
    Welcomed,
    /// A buy command arrived in a group; the buyer was pointed at the bot.
    RedirectedToPrivate(OfferId),
    /// A payment request was created and the invoice sent.
    Invoiced(ServiceRecord),
    Cancelled(ServiceRecord),
    UnknownAction,
    /// The engine refused the request; the buyer was told why.
    Rejected(EngineError),
}

impl ChatOutcome {
    /// Short label for logs and HTTP responses.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Welcomed => "welcomed",
            Self::RedirectedToPrivate(_) => "redirected",
            Self::Invoiced(_) => "invoiced",
            Self::Cancelled(_) => "cancelled",
            Self::UnknownAction => "unknown_action",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// Maps chat events onto engine operations and replies through the
/// engine's notifier.
pub struct ChatDispatcher {
    engine: Arc<PaymentEngine>,
}

impl ChatDispatcher {
    pub fn new(engine: Arc<PaymentEngine>) -> Self {
        Self { engine }
    }

    pub async fn dispatch(&self, event: ChatEvent) -> ChatOutcome {
        let outcome = match &event {
            ChatEvent::Command {
                buyer,
                chat,
                private,
                text,
            } => match parse_command(text) {
                None => ChatOutcome::Ignored,
                Some(intent) => self.on_command(buyer, chat, *private, intent).await,
            },
            ChatEvent::Callback { buyer, chat, data } => match parse_callback(data) {
                Some(ChatIntent::Cancel(id)) => self.on_cancel(buyer, chat, id),
                _ => {
                    self.engine.reply(chat, &messages::unknown_action());
                    ChatOutcome::UnknownAction
                }
            },
        };
        tracing::debug!(
            buyer = %event.buyer(),
            chat = %event.chat(),
            outcome = outcome.label(),
            "chat event handled"
        );
        outcome
    }

    async fn on_command(
        &self,
        buyer: &BuyerId,
        chat: &ChatTarget,
        private: bool,
        intent: ChatIntent,
    ) -> ChatOutcome {
        match intent {
            ChatIntent::Buy(offer_id) if !private => {
                self.engine
                    .reply(chat, &messages::open_private_chat(offer_id));
                ChatOutcome::RedirectedToPrivate(offer_id)
            }
            ChatIntent::Buy(offer_id) => match self.engine.request_offer(buyer, offer_id).await {
                Ok(record) => ChatOutcome::Invoiced(record),
                Err(e) => {
                    tracing::info!(buyer = %buyer, offer_id = %offer_id, "buy request rejected: {e}");
                    self.engine.reply(chat, &messages::request_rejected(&e));
                    ChatOutcome::Rejected(e)
                }
            },
            ChatIntent::Start if private => {
                self.engine.reply(chat, &messages::welcome(buyer));
                ChatOutcome::Welcomed
            }
            _ => ChatOutcome::Ignored,
        }
    }

    fn on_cancel(&self, buyer: &BuyerId, chat: &ChatTarget, id: ServiceId) -> ChatOutcome {
        match self.engine.cancel(id, buyer) {
            Ok(record) => ChatOutcome::Cancelled(record),
            Err(e) => {
                tracing::info!(buyer = %buyer, service_id = %id, "cancel rejected: {e}");
                self.engine.reply(chat, &messages::cancel_rejected(&e));
                ChatOutcome::Rejected(e)
            }
        }
    }
}
