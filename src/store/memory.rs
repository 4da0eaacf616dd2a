//! Simple in-memory store implementation
//!
//! Backs the whole persistence boundary with one mutex-guarded state map,
//! which makes every multi-row operation (notably moderation resolve)
//! atomic by construction. Used by the test suites and by the binary when
//! no database is configured.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::common::errors::{EngineError, Result};
use crate::common::types::{
    parse_promotion_date, Auction, Bid, ModerationApplication, ModerationDecision,
    ModerationStatus, PollOption, PollQuestion, Product, Promotion, PromotionStatus, Segment,
    Slot, SlotStatus,
};

use super::traits::{
    AuctionStore, BidStore, ModerationStore, PollQuestionInput, PollStore, ProductStore,
    PromotionStore, SegmentStore, SlotStore,
};

#[derive(Debug, Clone)]
struct StoredPromotion {
    promotion: Promotion,
    deleted: bool,
}

#[derive(Debug, Clone)]
struct StoredBid {
    bid: Bid,
    deleted: bool,
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    promotions: BTreeMap<i64, StoredPromotion>,
    segments: BTreeMap<i64, Segment>,
    slots: BTreeMap<i64, Slot>,
    auctions: BTreeMap<i64, Auction>,
    bids: BTreeMap<i64, StoredBid>,
    applications: BTreeMap<i64, ModerationApplication>,
    products: BTreeMap<i64, Product>,
    questions: BTreeMap<i64, PollQuestion>,
    options: BTreeMap<i64, PollOption>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory implementation of every store trait
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a catalog product (the engine never creates products itself)
    pub fn add_product(&self, mut product: Product) -> i64 {
        let mut state = self.lock();
        if product.id == 0 {
            product.id = state.next_id();
        }
        let id = product.id;
        state.products.insert(id, product);
        id
    }
}

#[async_trait]
impl PromotionStore for MemoryStore {
    async fn get(&self, id: i64) -> Result<Option<Promotion>> {
        let state = self.lock();
        Ok(state
            .promotions
            .get(&id)
            .filter(|row| !row.deleted)
            .map(|row| row.promotion.clone()))
    }

    async fn get_active(&self, now: DateTime<Utc>) -> Result<Option<Promotion>> {
        let state = self.lock();
        for row in state.promotions.values() {
            if row.deleted || row.promotion.status != PromotionStatus::Running {
                continue;
            }
            let window = (
                parse_promotion_date(&row.promotion.date_from),
                parse_promotion_date(&row.promotion.date_to),
            );
            if let (Ok(from), Ok(to)) = window {
                if from <= now && now <= to {
                    return Ok(Some(row.promotion.clone()));
                }
            }
        }
        Ok(None)
    }

    async fn list(&self) -> Result<Vec<Promotion>> {
        let state = self.lock();
        Ok(state
            .promotions
            .values()
            .filter(|row| !row.deleted)
            .map(|row| row.promotion.clone())
            .collect())
    }

    async fn create(&self, promotion: &Promotion) -> Result<i64> {
        let mut state = self.lock();
        let id = state.next_id();
        let mut promotion = promotion.clone();
        promotion.id = id;
        state.promotions.insert(
            id,
            StoredPromotion {
                promotion,
                deleted: false,
            },
        );
        Ok(id)
    }

    async fn update(&self, promotion: &Promotion) -> Result<()> {
        let mut state = self.lock();
        if let Some(row) = state.promotions.get_mut(&promotion.id) {
            if !row.deleted {
                row.promotion = promotion.clone();
            }
        }
        Ok(())
    }

    async fn soft_delete(&self, id: i64) -> Result<()> {
        let mut state = self.lock();
        if let Some(row) = state.promotions.get_mut(&id) {
            row.deleted = true;
        }
        Ok(())
    }

    async fn set_status(&self, id: i64, status: PromotionStatus) -> Result<()> {
        let mut state = self.lock();
        if let Some(row) = state.promotions.get_mut(&id) {
            if !row.deleted {
                row.promotion.status = status;
            }
        }
        Ok(())
    }

    async fn set_fixed_prices(&self, id: i64, prices: &BTreeMap<i32, Decimal>) -> Result<()> {
        let mut state = self.lock();
        if let Some(row) = state.promotions.get_mut(&id) {
            if !row.deleted {
                row.promotion.fixed_prices = prices.clone();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SegmentStore for MemoryStore {
    async fn by_promotion(&self, promotion_id: i64) -> Result<Vec<Segment>> {
        let state = self.lock();
        let mut out: Vec<Segment> = state
            .segments
            .values()
            .filter(|s| s.promotion_id == promotion_id)
            .cloned()
            .collect();
        out.sort_by_key(|s| (s.order_index, s.id));
        Ok(out)
    }

    async fn get(&self, id: i64) -> Result<Option<Segment>> {
        Ok(self.lock().segments.get(&id).cloned())
    }

    async fn get_for_promotion(
        &self,
        promotion_id: i64,
        segment_id: i64,
    ) -> Result<Option<Segment>> {
        let state = self.lock();
        Ok(state
            .segments
            .get(&segment_id)
            .filter(|s| s.promotion_id == promotion_id)
            .cloned())
    }

    async fn create(&self, segment: &Segment) -> Result<i64> {
        let mut state = self.lock();
        let id = state.next_id();
        let mut segment = segment.clone();
        segment.id = id;
        state.segments.insert(id, segment);
        Ok(id)
    }

    async fn update(&self, segment: &Segment) -> Result<()> {
        let mut state = self.lock();
        if state.segments.contains_key(&segment.id) {
            state.segments.insert(segment.id, segment.clone());
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.lock().segments.remove(&id);
        Ok(())
    }

    async fn shuffle_categories(&self, promotion_id: i64) -> Result<()> {
        let mut state = self.lock();
        let mut ordered: Vec<(i32, i64, Option<String>)> = state
            .segments
            .values()
            .filter(|s| s.promotion_id == promotion_id)
            .map(|s| (s.order_index, s.id, s.category_name.clone()))
            .collect();
        ordered.sort_by_key(|(order, id, _)| (*order, *id));
        if ordered.len() < 2 {
            return Ok(());
        }
        let ids: Vec<i64> = ordered.iter().map(|(_, id, _)| *id).collect();
        let mut labels: Vec<Option<String>> =
            ordered.into_iter().map(|(_, _, label)| label).collect();
        labels.rotate_right(1);
        for (id, label) in ids.iter().zip(labels.drain(..)) {
            if let Some(segment) = state.segments.get_mut(id) {
                segment.category_name = label;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SlotStore for MemoryStore {
    async fn by_segment(&self, segment_id: i64, only_occupied: bool) -> Result<Vec<Slot>> {
        let state = self.lock();
        let mut out: Vec<Slot> = state
            .slots
            .values()
            .filter(|s| s.segment_id == segment_id)
            .filter(|s| !only_occupied || s.status == SlotStatus::Occupied)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.position);
        Ok(out)
    }

    async fn by_promotion(&self, promotion_id: i64) -> Result<Vec<Slot>> {
        let state = self.lock();
        let mut out: Vec<Slot> = state
            .slots
            .values()
            .filter(|s| s.promotion_id == promotion_id)
            .cloned()
            .collect();
        out.sort_by_key(|s| (s.segment_id, s.position));
        Ok(out)
    }

    async fn by_seller(&self, seller_id: i64, promotion_id: Option<i64>) -> Result<Vec<Slot>> {
        let state = self.lock();
        let mut out: Vec<Slot> = state
            .slots
            .values()
            .filter(|s| s.seller_id == Some(seller_id))
            .filter(|s| promotion_id.map_or(true, |p| s.promotion_id == p))
            .cloned()
            .collect();
        out.sort_by_key(|s| (s.promotion_id, s.segment_id, s.position));
        Ok(out)
    }

    async fn get(&self, id: i64) -> Result<Option<Slot>> {
        Ok(self.lock().slots.get(&id).cloned())
    }

    async fn create(&self, slot: &Slot) -> Result<i64> {
        let mut state = self.lock();
        let id = state.next_id();
        let mut slot = slot.clone();
        slot.id = id;
        state.slots.insert(id, slot);
        Ok(id)
    }

    async fn update(&self, slot: &Slot) -> Result<()> {
        let mut state = self.lock();
        if state.slots.contains_key(&slot.id) {
            state.slots.insert(slot.id, slot.clone());
        }
        Ok(())
    }

    async fn set_occupant(
        &self,
        slot_id: i64,
        seller_id: Option<i64>,
        product_id: Option<i64>,
        status: SlotStatus,
    ) -> Result<()> {
        let mut state = self.lock();
        if let Some(slot) = state.slots.get_mut(&slot_id) {
            slot.seller_id = seller_id;
            slot.product_id = product_id;
            slot.status = status;
        }
        Ok(())
    }
}

#[async_trait]
impl AuctionStore for MemoryStore {
    async fn by_promotion(&self, promotion_id: i64) -> Result<Option<Auction>> {
        let state = self.lock();
        Ok(state
            .auctions
            .values()
            .find(|a| a.promotion_id == promotion_id)
            .cloned())
    }

    async fn create(&self, auction: &Auction) -> Result<i64> {
        let mut state = self.lock();
        let id = state.next_id();
        let mut auction = auction.clone();
        auction.id = id;
        state.auctions.insert(id, auction);
        Ok(id)
    }
}

#[async_trait]
impl BidStore for MemoryStore {
    async fn create(&self, bid: &Bid) -> Result<i64> {
        let mut state = self.lock();
        let id = state.next_id();
        let mut bid = bid.clone();
        bid.id = id;
        state.bids.insert(
            id,
            StoredBid {
                bid,
                deleted: false,
            },
        );
        Ok(id)
    }

    async fn top_by_slot(&self, slot_id: i64) -> Result<Option<Bid>> {
        let state = self.lock();
        Ok(state
            .bids
            .values()
            .filter(|b| !b.deleted && b.bid.slot_id == slot_id)
            .max_by_key(|b| (b.bid.amount, b.bid.id))
            .map(|b| b.bid.clone()))
    }

    async fn withdraw(&self, slot_id: i64, seller_id: i64) -> Result<()> {
        let mut state = self.lock();
        for row in state.bids.values_mut() {
            if row.bid.slot_id == slot_id && row.bid.seller_id == seller_id {
                row.deleted = true;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ModerationStore for MemoryStore {
    async fn list_by_promotion(
        &self,
        promotion_id: i64,
        status: Option<ModerationStatus>,
    ) -> Result<Vec<ModerationApplication>> {
        let state = self.lock();
        Ok(state
            .applications
            .values()
            .filter(|a| a.promotion_id == promotion_id)
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect())
    }

    async fn get(&self, id: i64) -> Result<Option<ModerationApplication>> {
        Ok(self.lock().applications.get(&id).cloned())
    }

    async fn create(&self, application: &ModerationApplication) -> Result<i64> {
        let mut state = self.lock();
        let id = state.next_id();
        let mut application = application.clone();
        application.id = id;
        state.applications.insert(id, application);
        Ok(id)
    }

    async fn resolve(
        &self,
        application_id: i64,
        decision: ModerationDecision,
        moderator_id: Option<i64>,
    ) -> Result<()> {
        // The single lock stands in for the row locks of the SQL backend:
        // a concurrent resolve or claim observes the committed state only.
        let mut state = self.lock();

        let application = state
            .applications
            .get(&application_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("application not found"))?;
        if application.status != ModerationStatus::Pending {
            return Err(EngineError::conflict("application already resolved"));
        }

        let slot = state
            .slots
            .get(&application.slot_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("slot not found"))?;
        if slot.status != SlotStatus::Moderation {
            return Err(EngineError::conflict("slot is not in moderation"));
        }
        if slot.seller_id != Some(application.seller_id) {
            return Err(EngineError::conflict("slot claimed by another seller"));
        }

        if let Some(app) = state.applications.get_mut(&application_id) {
            app.status = decision.resolved_status();
            app.moderator_id = moderator_id;
            app.resolved_at = Some(Utc::now());
        }
        if let Some(slot) = state.slots.get_mut(&application.slot_id) {
            match decision {
                ModerationDecision::Approve => {
                    slot.status = SlotStatus::Occupied;
                }
                ModerationDecision::Reject => {
                    slot.status = SlotStatus::Available;
                    slot.seller_id = None;
                    slot.product_id = None;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn get(&self, id: i64) -> Result<Option<Product>> {
        Ok(self.lock().products.get(&id).cloned())
    }

    async fn list_by_seller(
        &self,
        seller_id: i64,
        category: Option<String>,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Product>, u64)> {
        let state = self.lock();
        let matching: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.seller_id == seller_id)
            .filter(|p| {
                category
                    .as_deref()
                    .map_or(true, |c| p.category_name.as_deref() == Some(c))
            })
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let per_page = per_page.max(1) as usize;
        let offset = page.saturating_sub(1) as usize * per_page;
        let out = matching.into_iter().skip(offset).take(per_page).collect();
        Ok((out, total))
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn questions_by_promotion(&self, promotion_id: i64) -> Result<Vec<PollQuestion>> {
        let state = self.lock();
        Ok(state
            .questions
            .values()
            .filter(|q| q.promotion_id == promotion_id)
            .cloned()
            .collect())
    }

    async fn options_by_questions(&self, question_ids: &[i64]) -> Result<Vec<PollOption>> {
        let state = self.lock();
        Ok(state
            .options
            .values()
            .filter(|o| question_ids.contains(&o.question_id))
            .cloned()
            .collect())
    }

    async fn save_questions(
        &self,
        promotion_id: i64,
        questions: &[PollQuestionInput],
    ) -> Result<()> {
        let mut state = self.lock();
        let old_question_ids: Vec<i64> = state
            .questions
            .values()
            .filter(|q| q.promotion_id == promotion_id)
            .map(|q| q.id)
            .collect();
        for id in &old_question_ids {
            state.questions.remove(id);
        }
        state
            .options
            .retain(|_, o| !old_question_ids.contains(&o.question_id));

        for question in questions {
            let question_id = state.next_id();
            state.questions.insert(
                question_id,
                PollQuestion {
                    id: question_id,
                    promotion_id,
                    text: question.text.clone(),
                },
            );
            for option in &question.options {
                let option_id = state.next_id();
                state.options.insert(
                    option_id,
                    PollOption {
                        id: option_id,
                        question_id,
                        text: option.text.clone(),
                        value: option.value.clone(),
                    },
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_bid(slot_id: i64, seller_id: i64, amount: Decimal) -> Bid {
        Bid {
            id: 0,
            auction_id: 1,
            slot_id,
            seller_id,
            product_id: 1,
            amount,
        }
    }

    #[tokio::test]
    async fn test_top_bid_ignores_withdrawn() {
        let store = MemoryStore::new();
        BidStore::create(&store, &sample_bid(7, 1, dec!(100))).await.unwrap();
        BidStore::create(&store, &sample_bid(7, 2, dec!(140))).await.unwrap();

        let top = store.top_by_slot(7).await.unwrap().unwrap();
        assert_eq!(top.amount, dec!(140));

        store.withdraw(7, 2).await.unwrap();
        let top = store.top_by_slot(7).await.unwrap().unwrap();
        assert_eq!(top.amount, dec!(100));
    }

    #[tokio::test]
    async fn test_soft_deleted_promotion_is_invisible() {
        let store = MemoryStore::new();
        let promo = crate::common::types::Promotion {
            id: 0,
            name: "spring".into(),
            description: String::new(),
            theme: String::new(),
            date_from: "2025-03-01".into(),
            date_to: "2025-03-10".into(),
            status: PromotionStatus::NotReady,
            identification_mode: crate::common::types::IdentificationMode::UserProfile,
            pricing_model: crate::common::types::PricingModel::Fixed,
            slot_count: 2,
            discount: 0,
            min_price: None,
            bid_step: None,
            fixed_prices: BTreeMap::new(),
            stop_factors: vec![],
        };
        let id = PromotionStore::create(&store, &promo).await.unwrap();
        assert!(PromotionStore::get(&store, id).await.unwrap().is_some());

        store.soft_delete(id).await.unwrap();
        assert!(PromotionStore::get(&store, id).await.unwrap().is_none());
        assert!(PromotionStore::list(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shuffle_rotates_category_labels() {
        let store = MemoryStore::new();
        for (i, label) in ["a", "b", "c"].iter().enumerate() {
            SegmentStore::create(
                &store,
                &Segment {
                    id: 0,
                    promotion_id: 1,
                    name: format!("segment {i}"),
                    category_name: Some((*label).to_string()),
                    order_index: i as i32,
                },
            )
            .await
            .unwrap();
        }
        store.shuffle_categories(1).await.unwrap();
        let labels: Vec<Option<String>> = SegmentStore::by_promotion(&store, 1)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.category_name)
            .collect();
        assert_eq!(
            labels,
            vec![
                Some("c".to_string()),
                Some("a".to_string()),
                Some("b".to_string())
            ]
        );
    }
}
