//! LMDB implementation of OfferStore.

use paywatch_store::{OfferStore, StoreError};
use paywatch_types::{NewOffer, Offer, OfferId};

use crate::meta::{self, NEXT_OFFER_ID_KEY};
use crate::{LmdbError, LmdbStore};

impl OfferStore for LmdbStore {
    fn create_offer(&self, new: NewOffer) -> Result<Offer, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let id = meta::next_id(&self.meta_db, &mut wtxn, NEXT_OFFER_ID_KEY)?;
        let offer = Offer::from_new(OfferId::new(id), new);
        let bytes = bincode::serialize(&offer).map_err(LmdbError::from)?;
        self.offers_db
            .put(&mut wtxn, &id.to_be_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(offer)
    }

    fn get_offer(&self, id: OfferId) -> Result<Option<Offer>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .offers_db
            .get(&rtxn, &id.get().to_be_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(
                bincode::deserialize(bytes).map_err(LmdbError::from)?,
            )),
            None => Ok(None),
        }
    }

    fn list_offers(&self) -> Result<Vec<Offer>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut offers = Vec::new();
        for item in self.offers_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_key, bytes) = item.map_err(LmdbError::from)?;
            offers.push(bincode::deserialize(bytes).map_err(LmdbError::from)?);
        }
        Ok(offers)
    }
}
