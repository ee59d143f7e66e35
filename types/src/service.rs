//! Persisted records: pool addresses, service records, and offers.

use serde::{Deserialize, Serialize};

use crate::{
    BuyerId, ChainAddress, ChatTarget, OfferId, ServiceId, ServiceStatus, Timestamp, TokenAmount,
};

/// One row of the address pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub address: ChainAddress,
    /// `true` while a waiting service record references this address.
    pub leased: bool,
}

/// One payment attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub id: ServiceId,
    pub buyer: BuyerId,
    /// Requested amount in smallest units.
    pub amount: TokenAmount,
    pub address: ChainAddress,
    /// Balance of `address` captured when it was leased.
    pub baseline: TokenAmount,
    pub deadline: Timestamp,
    pub status: ServiceStatus,
    /// Set only on the transition to `Paid`.
    pub paid_at: Option<Timestamp>,
    /// Offer this request was created for, if any.
    #[serde(default)]
    pub offer_id: Option<OfferId>,
    pub created_at: Timestamp,
    /// Set on any terminal transition.
    #[serde(default)]
    pub closed_at: Option<Timestamp>,
}

impl ServiceRecord {
    /// Materialise a freshly allocated record in `Waiting`.
    pub fn from_new(id: ServiceId, new: NewService) -> Self {
        Self {
            id,
            buyer: new.buyer,
            amount: new.amount,
            address: new.address,
            baseline: new.baseline,
            deadline: new.deadline,
            status: ServiceStatus::Waiting,
            paid_at: None,
            offer_id: new.offer_id,
            created_at: new.created_at,
            closed_at: None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.status == ServiceStatus::Waiting
    }

    /// Strictly past the deadline.
    pub fn is_overdue(&self, now: Timestamp) -> bool {
        now > self.deadline
    }

    /// Funds received since the lease: `current - baseline`, floored at zero.
    pub fn delta(&self, current: TokenAmount) -> TokenAmount {
        current.saturating_sub(self.baseline)
    }

    /// Whether `current` covers the requested amount on top of the baseline.
    pub fn is_settled_by(&self, current: TokenAmount) -> bool {
        self.delta(current) >= self.amount
    }

    /// Apply a terminal transition in place.
    ///
    /// Returns `false` (leaving the record untouched) when the record is
    /// already terminal or `status` is not a terminal state.
    pub fn close(&mut self, status: ServiceStatus, at: Timestamp) -> bool {
        if !self.status.can_transition_to(status) {
            return false;
        }
        self.status = status;
        self.closed_at = Some(at);
        if status == ServiceStatus::Paid {
            self.paid_at = Some(at);
        }
        true
    }
}

/// Fields of a service record before the store assigns its id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewService {
    pub buyer: BuyerId,
    pub amount: TokenAmount,
    pub address: ChainAddress,
    pub baseline: TokenAmount,
    pub deadline: Timestamp,
    pub offer_id: Option<OfferId>,
    pub created_at: Timestamp,
}

/// A priced item published by the operator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub price: TokenAmount,
    pub description: String,
    /// Chat the offer was announced in.
    pub chat: ChatTarget,
    /// Text handed to the buyer once payment is confirmed.
    #[serde(default)]
    pub delivery: Option<String>,
    pub created_at: Timestamp,
}

/// Fields of an offer before the store assigns its id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewOffer {
    pub price: TokenAmount,
    pub description: String,
    pub chat: ChatTarget,
    pub delivery: Option<String>,
    pub created_at: Timestamp,
}

impl Offer {
    pub fn from_new(id: OfferId, new: NewOffer) -> Self {
        Self {
            id,
            price: new.price,
            description: new.description,
            chat: new.chat,
            delivery: new.delivery,
            created_at: new.created_at,
        }
    }
}
