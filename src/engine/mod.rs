//! Promotion lifecycle and slot/auction allocation engine
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  transport handlers (HTTP/RPC, out of scope)                 │
//! └───────────────┬──────────────────────────────────────────────┘
//!                 ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Engine                                                      │
//! │    lifecycle   status transitions + readiness gate           │
//! │    allocator   materializes (segment × position) slots       │
//! │    auction     one auction per promotion, bid acceptance     │
//! │    moderation  fixed-price claims, approve/reject            │
//! │    catalog     promotion/segment CRUD, curation, polls       │
//! └───────────────┬──────────────────────────────────────────────┘
//!                 ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  store traits (Postgres or in-memory backend)                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine holds no state between calls; every operation reads what it
//! needs, applies the business rules, and writes back through the store
//! traits. The only flow with explicit locking is moderation resolve, which
//! the store executes as one pessimistically-locked transaction.

mod allocator;
mod auction;
mod catalog;
mod lifecycle;
mod moderation;

pub use auction::next_min_bid;
pub use catalog::{AuctionSlotQuote, FixedSlotQuote, PromotionPoll, SegmentMarket};
pub use lifecycle::validate_transition;

use std::sync::Arc;

use crate::common::errors::{EngineError, Result};
use crate::common::types::{Product, Promotion};
use crate::store::traits::{
    AuctionStore, BidStore, ModerationStore, PollStore, ProductStore, PromotionStore,
    SegmentStore, SlotStore,
};

/// The engine over the persistence boundary
///
/// Construct with [`Engine::new`] for mixed backends, or
/// [`Engine::with_store`] when one backend implements every trait.
pub struct Engine {
    promotions: Arc<dyn PromotionStore>,
    segments: Arc<dyn SegmentStore>,
    slots: Arc<dyn SlotStore>,
    auctions: Arc<dyn AuctionStore>,
    bids: Arc<dyn BidStore>,
    moderation: Arc<dyn ModerationStore>,
    products: Arc<dyn ProductStore>,
    polls: Arc<dyn PollStore>,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        promotions: Arc<dyn PromotionStore>,
        segments: Arc<dyn SegmentStore>,
        slots: Arc<dyn SlotStore>,
        auctions: Arc<dyn AuctionStore>,
        bids: Arc<dyn BidStore>,
        moderation: Arc<dyn ModerationStore>,
        products: Arc<dyn ProductStore>,
        polls: Arc<dyn PollStore>,
    ) -> Self {
        Self {
            promotions,
            segments,
            slots,
            auctions,
            bids,
            moderation,
            products,
            polls,
        }
    }

    /// Build an engine over a single backend implementing every store trait
    pub fn with_store<S>(store: S) -> Self
    where
        S: PromotionStore
            + SegmentStore
            + SlotStore
            + AuctionStore
            + BidStore
            + ModerationStore
            + ProductStore
            + PollStore
            + Clone
            + 'static,
    {
        Self {
            promotions: Arc::new(store.clone()),
            segments: Arc::new(store.clone()),
            slots: Arc::new(store.clone()),
            auctions: Arc::new(store.clone()),
            bids: Arc::new(store.clone()),
            moderation: Arc::new(store.clone()),
            products: Arc::new(store.clone()),
            polls: Arc::new(store),
        }
    }

    /// Fetch a promotion or fail with not-found
    pub(crate) async fn promotion(&self, id: i64) -> Result<Promotion> {
        self.promotions
            .get(id)
            .await?
            .ok_or_else(|| EngineError::not_found("promotion not found"))
    }

    /// Resolve a product and verify the seller owns it
    pub(crate) async fn owned_product(&self, seller_id: i64, product_id: i64) -> Result<Product> {
        if product_id <= 0 {
            return Err(EngineError::validation("product_id is required"));
        }
        let product = self
            .products
            .get(product_id)
            .await?
            .ok_or_else(|| EngineError::not_found("product not found"))?;
        if product.seller_id != seller_id {
            return Err(EngineError::not_found("product not found or not yours"));
        }
        Ok(product)
    }
}
