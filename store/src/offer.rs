//! Offer storage trait.

use crate::StoreError;
use paywatch_types::{NewOffer, Offer, OfferId};

/// Storage for operator-published offers.
pub trait OfferStore {
    /// Allocate an id and persist the offer.
    fn create_offer(&self, new: NewOffer) -> Result<Offer, StoreError>;

    fn get_offer(&self, id: OfferId) -> Result<Option<Offer>, StoreError>;

    /// Every offer, ordered by id.
    fn list_offers(&self) -> Result<Vec<Offer>, StoreError>;
}
