//! Trait definitions for the persistence boundary
//!
//! All entities are owned by the persistence layer; the engine holds no
//! long-lived state between calls. Every lookup returns `Option` and the
//! engine maps absence to a not-found error, so the adapters never have to
//! invent business errors. The exception is [`ModerationStore::resolve`],
//! which owns the one atomic, pessimistically-locked transaction in the
//! system.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::common::errors::Result;
use crate::common::types::{
    Auction, Bid, ModerationApplication, ModerationDecision, ModerationStatus, PollOption,
    PollQuestion, Product, Promotion, PromotionStatus, Segment, Slot, SlotStatus,
};

/// Promotion aggregate storage
#[async_trait]
pub trait PromotionStore: Send + Sync {
    /// Fetch a promotion by id; soft-deleted rows are invisible
    async fn get(&self, id: i64) -> Result<Option<Promotion>>;

    /// The single running promotion whose date window contains `now`
    ///
    /// Resolved as a pure query against stored state, never cached, so
    /// concurrent campaigns cannot interfere through stale globals.
    async fn get_active(&self, now: DateTime<Utc>) -> Result<Option<Promotion>>;

    /// All non-deleted promotions
    async fn list(&self) -> Result<Vec<Promotion>>;

    /// Insert a new promotion, returning its id; the caller sets the status
    async fn create(&self, promotion: &Promotion) -> Result<i64>;

    /// Overwrite all mutable fields of an existing promotion
    async fn update(&self, promotion: &Promotion) -> Result<()>;

    /// Tombstone the promotion; it disappears from all read paths
    async fn soft_delete(&self, id: i64) -> Result<()>;

    async fn set_status(&self, id: i64, status: PromotionStatus) -> Result<()>;

    async fn set_fixed_prices(&self, id: i64, prices: &BTreeMap<i32, Decimal>) -> Result<()>;
}

/// Segment catalog storage
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// Segments of a promotion ordered by order_index, then id
    async fn by_promotion(&self, promotion_id: i64) -> Result<Vec<Segment>>;

    async fn get(&self, id: i64) -> Result<Option<Segment>>;

    /// Fetch a segment scoped to its promotion (guards cross-promotion edits)
    async fn get_for_promotion(&self, promotion_id: i64, segment_id: i64)
        -> Result<Option<Segment>>;

    async fn create(&self, segment: &Segment) -> Result<i64>;

    async fn update(&self, segment: &Segment) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Rotate category labels by one position across the promotion's segments
    async fn shuffle_categories(&self, promotion_id: i64) -> Result<()>;
}

/// Slot storage
#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Slots of a segment ordered by position
    async fn by_segment(&self, segment_id: i64, only_occupied: bool) -> Result<Vec<Slot>>;

    /// All slots of a promotion ordered by segment, then position
    async fn by_promotion(&self, promotion_id: i64) -> Result<Vec<Slot>>;

    /// Slots currently holding this seller as occupant
    async fn by_seller(&self, seller_id: i64, promotion_id: Option<i64>) -> Result<Vec<Slot>>;

    async fn get(&self, id: i64) -> Result<Option<Slot>>;

    async fn create(&self, slot: &Slot) -> Result<i64>;

    async fn update(&self, slot: &Slot) -> Result<()>;

    /// Atomically rewrite occupant and status in one statement
    async fn set_occupant(
        &self,
        slot_id: i64,
        seller_id: Option<i64>,
        product_id: Option<i64>,
        status: SlotStatus,
    ) -> Result<()>;
}

/// Auction storage
#[async_trait]
pub trait AuctionStore: Send + Sync {
    /// The promotion's active (non-deleted) auction, if one exists
    async fn by_promotion(&self, promotion_id: i64) -> Result<Option<Auction>>;

    async fn create(&self, auction: &Auction) -> Result<i64>;
}

/// Bid storage
#[async_trait]
pub trait BidStore: Send + Sync {
    /// Append a bid; previous bids are never overwritten
    async fn create(&self, bid: &Bid) -> Result<i64>;

    /// Highest non-withdrawn bid for the slot
    async fn top_by_slot(&self, slot_id: i64) -> Result<Option<Bid>>;

    /// Soft-delete all of the seller's bids on the slot
    async fn withdraw(&self, slot_id: i64, seller_id: i64) -> Result<()>;
}

/// Moderation application storage
#[async_trait]
pub trait ModerationStore: Send + Sync {
    async fn list_by_promotion(
        &self,
        promotion_id: i64,
        status: Option<ModerationStatus>,
    ) -> Result<Vec<ModerationApplication>>;

    async fn get(&self, id: i64) -> Result<Option<ModerationApplication>>;

    async fn create(&self, application: &ModerationApplication) -> Result<i64>;

    /// Resolve a pending application in one atomic transaction
    ///
    /// Both the application row and its slot row are locked for the duration
    /// of the transaction. Returns a conflict error when the application is
    /// already resolved, the slot is no longer in moderation, or the slot is
    /// held by a different seller; any failure before commit leaves both
    /// rows untouched.
    async fn resolve(
        &self,
        application_id: i64,
        decision: ModerationDecision,
        moderator_id: Option<i64>,
    ) -> Result<()>;
}

/// Product catalog storage (ownership checks and listings)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Fetch a product by id; soft-deleted rows are invisible
    async fn get(&self, id: i64) -> Result<Option<Product>>;

    /// Page through a seller's products, returning the page and total count
    async fn list_by_seller(
        &self,
        seller_id: i64,
        category: Option<String>,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Product>, u64)>;
}

/// Input for replacing a promotion's poll questions
#[derive(Debug, Clone, PartialEq)]
pub struct PollQuestionInput {
    pub text: String,
    pub options: Vec<PollOptionInput>,
}

/// Input for one answer option
#[derive(Debug, Clone, PartialEq)]
pub struct PollOptionInput {
    pub text: String,
    pub value: String,
}

/// Poll storage backing the `questions` identification mode
#[async_trait]
pub trait PollStore: Send + Sync {
    async fn questions_by_promotion(&self, promotion_id: i64) -> Result<Vec<PollQuestion>>;

    async fn options_by_questions(&self, question_ids: &[i64]) -> Result<Vec<PollOption>>;

    /// Replace the promotion's questions and options wholesale
    async fn save_questions(
        &self,
        promotion_id: i64,
        questions: &[PollQuestionInput],
    ) -> Result<()>;
}
