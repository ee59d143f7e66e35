//! Buyer- and chat-facing message texts.
//!
//! Amounts are stored in smallest units; these helpers are the only place
//! they are rendered as decimals.

use paywatch_types::{BuyerId, Offer, OfferId, ServiceRecord, TokenAmount};
use paywatch_utils::format_duration;

use crate::chat::{buy_command, cancel_callback};
use crate::{EngineError, EngineSettings};

fn amount(value: TokenAmount, settings: &EngineSettings) -> String {
    format!(
        "{} {}",
        value.format_units(settings.decimals),
        settings.token_symbol
    )
}

/// Announcement posted into the offer's chat.
pub fn offer_announcement(offer: &Offer, settings: &EngineSettings) -> String {
    format!(
        "New offer {}\nPrice: {}\n{}\nTo pay, send {} to the bot in a private chat.",
        offer.id,
        amount(offer.price, settings),
        offer.description,
        buy_command(offer.id)
    )
}

/// Payment instructions sent to the buyer once an address is leased.
pub fn invoice(record: &ServiceRecord, settings: &EngineSettings) -> String {
    format!(
        "Service {}\nAmount: {}\nAddress: {}\nNetwork: {}\nPay within {}\nCancel: {}",
        record.id,
        amount(record.amount, settings),
        record.address,
        settings.chain_name,
        format_duration(settings.payment_window_secs),
        cancel_callback(record.id)
    )
}

/// Confirmation sent when the expected amount has arrived.
pub fn payment_confirmed(
    record: &ServiceRecord,
    delivery: Option<&str>,
    settings: &EngineSettings,
) -> String {
    let mut text = format!(
        "Payment received for {}\nAmount: {}\nAddress: {}",
        record.id,
        amount(record.amount, settings),
        record.address
    );
    if let Some(delivery) = delivery {
        text.push('\n');
        text.push_str(delivery);
    }
    text
}

pub fn payment_expired(record: &ServiceRecord) -> String {
    format!(
        "Payment time for {} has expired. Address {} has been released.",
        record.id, record.address
    )
}

pub fn payment_cancelled(record: &ServiceRecord) -> String {
    format!(
        "Payment {} cancelled, address released: {}",
        record.id, record.address
    )
}

pub fn welcome(buyer: &BuyerId) -> String {
    format!("Welcome! Your buyer id: {buyer}")
}

/// Reply to a buy command sent in a group chat.
pub fn open_private_chat(offer_id: OfferId) -> String {
    format!(
        "Open a private chat with the bot and send {} to pay.",
        buy_command(offer_id)
    )
}

pub fn unknown_action() -> String {
    "Unknown action.".to_string()
}

/// Reply to a buy request the engine refused.
pub fn request_rejected(err: &EngineError) -> String {
    match err {
        EngineError::NotFound(_) => "Offer not found.".to_string(),
        EngineError::NoFreeResource(reason) => {
            format!("Cannot start a payment right now: {reason}.")
        }
        EngineError::UpstreamUnavailable(_) => {
            "The token contract is unavailable. Contact the operator.".to_string()
        }
        _ => "Something went wrong. Please try again later.".to_string(),
    }
}

/// Reply to a cancel request the engine refused.
pub fn cancel_rejected(err: &EngineError) -> String {
    match err {
        EngineError::NotFound(_) => "Payment not found or already settled.".to_string(),
        _ => "Something went wrong. Please try again later.".to_string(),
    }
}
