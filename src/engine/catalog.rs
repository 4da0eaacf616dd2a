//! Promotion and segment administration, seller-facing views, polls

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::common::errors::{EngineError, Result};
use crate::common::types::{
    PollOption, PollQuestion, PricingModel, Product, Promotion, PromotionStatus, Segment, Slot,
    SlotStatus,
};
use crate::store::traits::PollQuestionInput;

use super::auction::next_min_bid;
use super::Engine;

/// A buyable slot quote within one segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuctionSlotQuote {
    pub slot_id: i64,
    pub position: i32,
    pub status: SlotStatus,
    /// Highest standing bid, zero when none
    pub current_bid: Decimal,
    /// Smallest acceptable next bid
    pub min_bid: Decimal,
    pub bid_step: Decimal,
}

/// A fixed-priced slot quote within one segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixedSlotQuote {
    pub slot_id: i64,
    pub position: i32,
    pub status: SlotStatus,
    pub price: Decimal,
}

/// Market view of one segment: what a seller sees before bidding or claiming
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct SegmentMarket {
    pub auction: Vec<AuctionSlotQuote>,
    pub fixed: Vec<FixedSlotQuote>,
}

/// A promotion's poll: questions plus all their options
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromotionPoll {
    pub questions: Vec<PollQuestion>,
    pub options: Vec<PollOption>,
}

impl Engine {
    /// Create a promotion; it always starts as `NotReady` regardless of the
    /// status in the input.
    pub async fn create_promotion(&self, mut promotion: Promotion) -> Result<i64> {
        promotion.status = PromotionStatus::NotReady;
        let id = self.promotions.create(&promotion).await?;
        info!(promotion_id = id, name = %promotion.name, "promotion created");
        Ok(id)
    }

    pub async fn get_promotion(&self, id: i64) -> Result<Promotion> {
        self.promotion(id).await
    }

    pub async fn list_promotions(&self) -> Result<Vec<Promotion>> {
        self.promotions.list().await
    }

    /// The currently running promotion whose date window contains now, if any
    pub async fn active_promotion(&self) -> Result<Option<Promotion>> {
        self.promotions.get_active(Utc::now()).await
    }

    /// Overwrite a promotion's configuration; the status is managed through
    /// [`Engine::change_status`] and left untouched here.
    pub async fn update_promotion(&self, promotion: &Promotion) -> Result<()> {
        let current = self.promotion(promotion.id).await?;
        let mut updated = promotion.clone();
        updated.status = current.status;
        self.promotions.update(&updated).await
    }

    pub async fn delete_promotion(&self, id: i64) -> Result<()> {
        self.promotion(id).await?;
        self.promotions.soft_delete(id).await?;
        info!(promotion_id = id, "promotion deleted");
        Ok(())
    }

    /// Replace the fixed price table; existing slots keep their captured
    /// prices.
    pub async fn set_fixed_prices(
        &self,
        promotion_id: i64,
        prices: &BTreeMap<i32, Decimal>,
    ) -> Result<()> {
        let promotion = self.promotion(promotion_id).await?;
        if promotion.pricing_model != PricingModel::Fixed {
            return Err(EngineError::validation(
                "promotion does not use fixed pricing",
            ));
        }
        for (position, price) in prices {
            if *position <= 0 || *price <= Decimal::ZERO {
                return Err(EngineError::validation(
                    "fixed prices require positive positions and amounts",
                ));
            }
        }
        self.promotions.set_fixed_prices(promotion_id, prices).await
    }

    pub async fn segments_for_promotion(&self, promotion_id: i64) -> Result<Vec<Segment>> {
        self.promotion(promotion_id).await?;
        self.segments.by_promotion(promotion_id).await
    }

    pub async fn create_segment(
        &self,
        promotion_id: i64,
        name: &str,
        category_name: Option<String>,
        order_index: i32,
    ) -> Result<i64> {
        self.promotion(promotion_id).await?;
        if name.trim().is_empty() {
            return Err(EngineError::validation("segment name is required"));
        }
        let segment = Segment {
            id: 0,
            promotion_id,
            name: name.to_string(),
            category_name,
            order_index,
        };
        self.segments.create(&segment).await
    }

    /// Partially update a segment; `None` fields are left unchanged.
    pub async fn update_segment(
        &self,
        promotion_id: i64,
        segment_id: i64,
        name: Option<String>,
        category_name: Option<String>,
        order_index: Option<i32>,
    ) -> Result<()> {
        let mut segment = self
            .segments
            .get_for_promotion(promotion_id, segment_id)
            .await?
            .ok_or_else(|| EngineError::not_found("segment not found"))?;
        if let Some(name) = name {
            if name.trim().is_empty() {
                return Err(EngineError::validation("segment name is required"));
            }
            segment.name = name;
        }
        if let Some(category_name) = category_name {
            segment.category_name = Some(category_name);
        }
        if let Some(order_index) = order_index {
            segment.order_index = order_index;
        }
        self.segments.update(&segment).await
    }

    /// Delete a segment that has not been materialized yet.
    ///
    /// Once slots exist under the segment, deleting it would orphan bids and
    /// claims, so the request conflicts instead.
    pub async fn delete_segment(&self, promotion_id: i64, segment_id: i64) -> Result<()> {
        let segment = self
            .segments
            .get_for_promotion(promotion_id, segment_id)
            .await?
            .ok_or_else(|| EngineError::not_found("segment not found"))?;
        let slots = self.slots.by_segment(segment.id, false).await?;
        if !slots.is_empty() {
            return Err(EngineError::conflict("segment has materialized slots"));
        }
        self.segments.delete(segment.id).await
    }

    /// Rotate category labels by one position across the promotion's
    /// segments, preserving segment order.
    pub async fn shuffle_segment_categories(&self, promotion_id: i64) -> Result<()> {
        self.promotion(promotion_id).await?;
        self.segments.shuffle_categories(promotion_id).await?;
        info!(promotion_id, "segment categories shuffled");
        Ok(())
    }

    /// Curation override: pin a product into a slot without a seller claim.
    pub async fn set_slot_product(&self, slot_id: i64, product_id: i64) -> Result<()> {
        self.slots
            .get(slot_id)
            .await?
            .ok_or_else(|| EngineError::not_found("slot not found"))?;
        self.products
            .get(product_id)
            .await?
            .ok_or_else(|| EngineError::not_found("product not found"))?;
        self.slots
            .set_occupant(slot_id, None, Some(product_id), SlotStatus::Occupied)
            .await?;
        info!(slot_id, product_id, "slot pinned by curation");
        Ok(())
    }

    /// Slots currently held by a seller, optionally within one promotion.
    pub async fn seller_slots(
        &self,
        seller_id: i64,
        promotion_id: Option<i64>,
    ) -> Result<Vec<Slot>> {
        self.slots.by_seller(seller_id, promotion_id).await
    }

    /// Page through a seller's catalog, optionally filtered by category.
    /// Returns the requested page and the total match count.
    pub async fn seller_products(
        &self,
        seller_id: i64,
        category: Option<String>,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Product>, u64)> {
        if per_page == 0 {
            return Err(EngineError::validation("per_page must be greater than 0"));
        }
        self.products
            .list_by_seller(seller_id, category, page.max(1), per_page)
            .await
    }

    /// Build the market view of a segment: auction slots quoted with their
    /// current top bid and floor, fixed slots with their price.
    pub async fn segment_market(&self, segment_id: i64) -> Result<SegmentMarket> {
        let segment = self
            .segments
            .get(segment_id)
            .await?
            .ok_or_else(|| EngineError::not_found("segment not found"))?;
        let slots = self.slots.by_segment(segment_id, false).await?;
        let auction = self.auctions.by_promotion(segment.promotion_id).await?;

        let mut market = SegmentMarket::default();
        for slot in slots {
            match slot.pricing {
                PricingModel::Auction => {
                    let Some(auction) = auction.as_ref() else {
                        continue;
                    };
                    let current_bid = self
                        .bids
                        .top_by_slot(slot.id)
                        .await?
                        .map(|b| b.amount)
                        .unwrap_or(Decimal::ZERO);
                    market.auction.push(AuctionSlotQuote {
                        slot_id: slot.id,
                        position: slot.position,
                        status: slot.status,
                        current_bid,
                        min_bid: next_min_bid(auction.min_price, auction.bid_step, current_bid),
                        bid_step: auction.bid_step,
                    });
                }
                PricingModel::Fixed => {
                    market.fixed.push(FixedSlotQuote {
                        slot_id: slot.id,
                        position: slot.position,
                        status: slot.status,
                        price: slot.price.unwrap_or(Decimal::ZERO),
                    });
                }
            }
        }
        Ok(market)
    }

    /// The promotion's poll, as shown to buyers under the `questions`
    /// identification mode.
    pub async fn promotion_poll(&self, promotion_id: i64) -> Result<PromotionPoll> {
        self.promotion(promotion_id).await?;
        let questions = self.polls.questions_by_promotion(promotion_id).await?;
        let question_ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
        let options = self.polls.options_by_questions(&question_ids).await?;
        Ok(PromotionPoll { questions, options })
    }

    /// Replace the promotion's poll wholesale. Every question must carry at
    /// least one option.
    pub async fn save_poll_questions(
        &self,
        promotion_id: i64,
        questions: &[PollQuestionInput],
    ) -> Result<()> {
        self.promotion(promotion_id).await?;
        for question in questions {
            if question.text.trim().is_empty() {
                return Err(EngineError::validation("question text is required"));
            }
            if question.options.is_empty() {
                return Err(EngineError::validation(
                    "every question needs at least one option",
                ));
            }
        }
        self.polls.save_questions(promotion_id, questions).await
    }
}
