//! Auction lifecycle and bid acceptance
//!
//! One auction per promotion, created lazily at launch and linked to every
//! auction-priced slot. Bids are append-only; a bid is accepted when it
//! clears the current floor and lands on the increment lattice anchored at
//! the minimum price (or the current top bid).

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::common::errors::{EngineError, Result};
use crate::common::types::{Auction, Bid, PricingModel, Promotion, SlotStatus};

use super::Engine;

/// The smallest bid the auction will accept for a slot.
///
/// With no standing bid the floor is the minimum price itself; otherwise it
/// is the top bid plus one step (or the top bid again when the step is zero).
pub fn next_min_bid(min_price: Decimal, bid_step: Decimal, current_top: Decimal) -> Decimal {
    if current_top <= Decimal::ZERO {
        min_price
    } else {
        current_top + bid_step
    }
}

impl Engine {
    /// Make sure the promotion's auction exists and every auction-priced
    /// slot is linked to it. Returns the auction id, or `None` for
    /// fixed-priced promotions.
    pub(crate) async fn ensure_auction(&self, promotion: &Promotion) -> Result<Option<i64>> {
        if promotion.pricing_model != PricingModel::Auction {
            return Ok(None);
        }
        let (Some(min_price), Some(bid_step)) = (promotion.min_price, promotion.bid_step) else {
            return Err(EngineError::validation(
                "auction parameters are not configured",
            ));
        };

        let auction_id = match self.auctions.by_promotion(promotion.id).await? {
            Some(auction) => auction.id,
            None => {
                let auction = Auction {
                    id: 0,
                    promotion_id: promotion.id,
                    date_from: promotion.date_from.clone(),
                    date_to: promotion.date_to.clone(),
                    min_price,
                    bid_step,
                };
                match self.auctions.create(&auction).await {
                    Ok(id) => {
                        info!(promotion_id = promotion.id, auction_id = id, "auction created");
                        id
                    }
                    Err(err) => {
                        // A concurrent launch may have inserted it first.
                        match self.auctions.by_promotion(promotion.id).await? {
                            Some(auction) => {
                                warn!(
                                    promotion_id = promotion.id,
                                    auction_id = auction.id,
                                    "auction insert lost the race, reusing existing"
                                );
                                auction.id
                            }
                            None => return Err(err),
                        }
                    }
                }
            }
        };

        for mut slot in self.slots.by_promotion(promotion.id).await? {
            if slot.pricing != PricingModel::Auction || slot.auction_id.is_some() {
                continue;
            }
            slot.auction_id = Some(auction_id);
            self.slots.update(&slot).await?;
        }

        Ok(Some(auction_id))
    }

    /// Place a bid on an auction slot on behalf of a seller.
    ///
    /// The bid must be at least the current floor (see [`next_min_bid`]) and,
    /// when a step is configured, sit on the lattice `base + k * step` where
    /// the base is the minimum price or the current top bid. The product must
    /// exist and belong to the bidding seller.
    ///
    /// The top bid is read without a lock, so two sellers bidding in the same
    /// instant can both clear the same stale floor; the higher append still
    /// wins the slot.
    pub async fn place_bid(
        &self,
        seller_id: i64,
        slot_id: i64,
        product_id: i64,
        amount: Decimal,
    ) -> Result<()> {
        let slot = self
            .slots
            .get(slot_id)
            .await?
            .ok_or_else(|| EngineError::not_found("slot not found"))?;
        if slot.status != SlotStatus::Available {
            return Err(EngineError::conflict("slot not available"));
        }
        if slot.pricing != PricingModel::Auction {
            return Err(EngineError::validation(
                "promotion does not use auction pricing",
            ));
        }
        let auction = self
            .auctions
            .by_promotion(slot.promotion_id)
            .await?
            .ok_or_else(|| EngineError::not_found("auction not found"))?;

        let current_top = self
            .bids
            .top_by_slot(slot_id)
            .await?
            .map(|b| b.amount)
            .unwrap_or(Decimal::ZERO);
        let floor = next_min_bid(auction.min_price, auction.bid_step, current_top);
        if amount < floor {
            return Err(EngineError::validation(format!(
                "bid must be at least {floor}"
            )));
        }
        let base = if current_top > Decimal::ZERO {
            current_top
        } else {
            auction.min_price
        };
        if auction.bid_step > Decimal::ZERO
            && amount > base
            && (amount - base) % auction.bid_step != Decimal::ZERO
        {
            return Err(EngineError::validation(format!(
                "bid must be a multiple of the step {} above {base}",
                auction.bid_step
            )));
        }

        let product = self.owned_product(seller_id, product_id).await?;

        let bid = Bid {
            id: 0,
            auction_id: auction.id,
            slot_id,
            seller_id,
            product_id: product.id,
            amount,
        };
        let bid_id = self.bids.create(&bid).await?;
        info!(slot_id, seller_id, bid_id, %amount, "bid placed");
        Ok(())
    }

    /// Withdraw a seller's stake in a slot.
    ///
    /// For the slot's occupant this cancels the pending moderation claim or
    /// retracts their bids and frees the slot. A non-occupant on an auction
    /// slot only retracts their own bids; the slot stays as it is.
    pub async fn withdraw(&self, seller_id: i64, slot_id: i64) -> Result<()> {
        let slot = self
            .slots
            .get(slot_id)
            .await?
            .ok_or_else(|| EngineError::not_found("slot not found"))?;

        if slot.seller_id == Some(seller_id) {
            if slot.status == SlotStatus::Moderation {
                // The pending application is left as is; resolving it later
                // conflicts on the drifted slot.
                self.slots
                    .set_occupant(slot_id, None, None, SlotStatus::Available)
                    .await?;
                info!(slot_id, seller_id, "moderation claim withdrawn");
                return Ok(());
            }
            if slot.auction_id.is_some() {
                self.bids.withdraw(slot_id, seller_id).await?;
                self.slots
                    .set_occupant(slot_id, None, None, SlotStatus::Available)
                    .await?;
                info!(slot_id, seller_id, "occupant bids withdrawn, slot freed");
                return Ok(());
            }
            return Err(EngineError::conflict("nothing to withdraw for this slot"));
        }

        if slot.auction_id.is_some() {
            self.bids.withdraw(slot_id, seller_id).await?;
            info!(slot_id, seller_id, "bids withdrawn");
            return Ok(());
        }

        Err(EngineError::validation("slot is not held by this seller"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use crate::common::errors::EngineError;
    use crate::common::types::{PromotionStatus, SlotStatus};
    use crate::engine::testutil::{auction_promotion, engine, seed_product, seed_promotion};
    use crate::engine::Engine;
    use crate::store::memory::MemoryStore;
    use crate::store::traits::{AuctionStore, BidStore, MockProductStore, SlotStore};

    use super::next_min_bid;

    /// Launch an auction promotion and return the id of its first slot.
    async fn launched_slot(engine: &Engine, store: &MemoryStore) -> i64 {
        let (promotion_id, _) = seed_promotion(store, &auction_promotion()).await;
        engine
            .change_status(promotion_id, PromotionStatus::ReadyToStart)
            .await
            .expect("launch");
        SlotStore::by_promotion(store, promotion_id)
            .await
            .expect("slots")[0]
            .id
    }

    #[test]
    fn test_next_min_bid() {
        assert_eq!(next_min_bid(dec!(100), dec!(20), dec!(0)), dec!(100));
        assert_eq!(next_min_bid(dec!(100), dec!(20), dec!(120)), dec!(140));
        assert_eq!(next_min_bid(dec!(100), dec!(0), dec!(120)), dec!(120));
    }

    #[tokio::test]
    async fn test_bid_floor_and_step_lattice() {
        let (engine, store) = engine();
        let mut promotion = auction_promotion();
        promotion.min_price = Some(dec!(100));
        promotion.bid_step = Some(dec!(20));
        let (promotion_id, _) = seed_promotion(&store, &promotion).await;
        engine
            .change_status(promotion_id, PromotionStatus::ReadyToStart)
            .await
            .expect("launch");
        let slot_id = SlotStore::by_promotion(&store, promotion_id)
            .await
            .expect("slots")[0]
            .id;
        let product_id = seed_product(&store, 7, 10);

        // Below the minimum price.
        assert!(matches!(
            engine.place_bid(7, slot_id, product_id, dec!(90)).await,
            Err(EngineError::Validation(_))
        ));
        // Exactly the minimum price.
        engine
            .place_bid(7, slot_id, product_id, dec!(100))
            .await
            .expect("opening bid");
        // Off the lattice relative to the new top (100 + 20k).
        assert!(matches!(
            engine.place_bid(7, slot_id, product_id, dec!(110)).await,
            Err(EngineError::Validation(_))
        ));
        engine
            .place_bid(7, slot_id, product_id, dec!(120))
            .await
            .expect("one step up");
        // Below the new floor of 140.
        assert!(matches!(
            engine.place_bid(7, slot_id, product_id, dec!(130)).await,
            Err(EngineError::Validation(_))
        ));
        engine
            .place_bid(7, slot_id, product_id, dec!(140))
            .await
            .expect("next step");

        let top = BidStore::top_by_slot(&store, slot_id)
            .await
            .expect("top")
            .expect("present");
        assert_eq!(top.amount, dec!(140));
    }

    #[tokio::test]
    async fn test_bid_off_lattice_above_min_without_top() {
        let (engine, store) = engine();
        let slot_id = launched_slot(&engine, &store).await;
        let product_id = seed_product(&store, 7, 10);

        // min 100 step 10: 105 clears the floor but misses the lattice.
        assert!(matches!(
            engine.place_bid(7, slot_id, product_id, dec!(105)).await,
            Err(EngineError::Validation(_))
        ));
        engine
            .place_bid(7, slot_id, product_id, dec!(110))
            .await
            .expect("on lattice");
    }

    #[tokio::test]
    async fn test_bid_requires_owned_product() {
        let (engine, store) = engine();
        let slot_id = launched_slot(&engine, &store).await;
        let product_id = seed_product(&store, 7, 10);

        let err = engine
            .place_bid(8, slot_id, product_id, dec!(100))
            .await
            .expect_err("foreign product");
        assert!(matches!(err, EngineError::NotFound(_)));
        assert!(BidStore::top_by_slot(&store, slot_id)
            .await
            .expect("top")
            .is_none());
    }

    #[tokio::test]
    async fn test_ownership_check_consults_product_store() {
        let store = MemoryStore::new();
        let mut products = MockProductStore::new();
        products
            .expect_get()
            .withf(|id| *id == 42)
            .returning(|_| Ok(None));
        let engine = Engine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(products),
            Arc::new(store.clone()),
        );

        let slot_id = launched_slot(&engine, &store).await;
        let err = engine
            .place_bid(7, slot_id, 42, dec!(100))
            .await
            .expect_err("missing product");
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_withdraw_frees_occupied_auction_slot() {
        let (engine, store) = engine();
        let slot_id = launched_slot(&engine, &store).await;
        let product_id = seed_product(&store, 7, 10);

        engine
            .place_bid(7, slot_id, product_id, dec!(100))
            .await
            .expect("bid");
        // Mark the seller as the slot's occupant, as settlement would.
        SlotStore::set_occupant(&store, slot_id, Some(7), Some(product_id), SlotStatus::Occupied)
            .await
            .expect("occupy");

        engine.withdraw(7, slot_id).await.expect("withdraw");

        let slot = SlotStore::get(&store, slot_id)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(slot.status, SlotStatus::Available);
        assert_eq!(slot.seller_id, None);
        assert!(BidStore::top_by_slot(&store, slot_id)
            .await
            .expect("top")
            .is_none());
    }

    #[tokio::test]
    async fn test_withdraw_by_non_occupant_keeps_slot() {
        let (engine, store) = engine();
        let slot_id = launched_slot(&engine, &store).await;
        let p7 = seed_product(&store, 7, 10);
        let p8 = seed_product(&store, 8, 10);

        engine.place_bid(7, slot_id, p7, dec!(100)).await.expect("bid 7");
        engine.place_bid(8, slot_id, p8, dec!(110)).await.expect("bid 8");

        // Seller 8 retracts; seller 7's bid becomes the top again.
        engine.withdraw(8, slot_id).await.expect("withdraw");

        let top = BidStore::top_by_slot(&store, slot_id)
            .await
            .expect("top")
            .expect("present");
        assert_eq!((top.seller_id, top.amount), (7, dec!(100)));
        let slot = SlotStore::get(&store, slot_id)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(slot.status, SlotStatus::Available);
    }

    #[tokio::test]
    async fn test_relaunch_reuses_existing_auction() {
        let (engine, store) = engine();
        let (promotion_id, _) = seed_promotion(&store, &auction_promotion()).await;
        engine
            .change_status(promotion_id, PromotionStatus::ReadyToStart)
            .await
            .expect("launch");
        let first = AuctionStore::by_promotion(&store, promotion_id)
            .await
            .expect("auction")
            .expect("present");

        engine
            .change_status(promotion_id, PromotionStatus::NotReady)
            .await
            .expect("pull back");
        engine
            .change_status(promotion_id, PromotionStatus::ReadyToStart)
            .await
            .expect("relaunch");

        let second = AuctionStore::by_promotion(&store, promotion_id)
            .await
            .expect("auction")
            .expect("present");
        assert_eq!(first.id, second.id);
    }
}
