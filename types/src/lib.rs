//! Fundamental types for the paywatch payment engine.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! chain addresses, token amounts, timestamps, identifiers, service records and
//! their status enum.

pub mod address;
pub mod amount;
pub mod error;
pub mod ids;
pub mod network;
pub mod service;
pub mod state;
pub mod time;

pub use address::ChainAddress;
pub use amount::TokenAmount;
pub use error::PaywatchError;
pub use ids::{BuyerId, ChatTarget, OfferId, ServiceId};
pub use network::NetworkProfile;
pub use service::{AddressEntry, NewOffer, NewService, Offer, ServiceRecord};
pub use state::ServiceStatus;
pub use time::{Clock, SystemClock, Timestamp};
