//! Shared fixtures for integration tests

use std::collections::BTreeMap;

use rust_decimal_macros::dec;

use slotmarket::store::{MemoryStore, PromotionStore, SegmentStore};
use slotmarket::{
    Engine, IdentificationMode, PricingModel, Product, Promotion, PromotionStatus, Segment,
};

/// Engine over a fresh in-memory store, plus the store for raw inspection
pub fn test_engine() -> (Engine, MemoryStore) {
    let store = MemoryStore::new();
    (Engine::with_store(store.clone()), store)
}

/// A launchable auction promotion: min price 100, bid step 20, two positions
pub fn auction_promotion() -> Promotion {
    Promotion {
        id: 0,
        name: "back to school".to_string(),
        description: "school supplies front page".to_string(),
        theme: "school".to_string(),
        date_from: "2025-08-15T00:00:00Z".to_string(),
        date_to: "2025-09-01T00:00:00Z".to_string(),
        status: PromotionStatus::NotReady,
        identification_mode: IdentificationMode::UserProfile,
        pricing_model: PricingModel::Auction,
        slot_count: 2,
        discount: 10,
        min_price: Some(dec!(100)),
        bid_step: Some(dec!(20)),
        fixed_prices: BTreeMap::new(),
        stop_factors: vec![],
    }
}

/// A launchable fixed-priced promotion with a price for every position
pub fn fixed_promotion() -> Promotion {
    let mut promotion = auction_promotion();
    promotion.name = "winter gifts".to_string();
    promotion.pricing_model = PricingModel::Fixed;
    promotion.min_price = None;
    promotion.bid_step = None;
    promotion.fixed_prices = BTreeMap::from([(1, dec!(800)), (2, dec!(450))]);
    promotion.stop_factors = vec!["counterfeit risk".to_string()];
    promotion
}

/// Persist a promotion with one segment, returning (promotion_id, segment_id)
pub async fn seed_promotion(store: &MemoryStore, promotion: &Promotion) -> (i64, i64) {
    let promotion_id = PromotionStore::create(store, promotion)
        .await
        .expect("create promotion");
    let segment_id = SegmentStore::create(
        store,
        &Segment {
            id: 0,
            promotion_id,
            name: "parents".to_string(),
            category_name: Some("stationery".to_string()),
            order_index: 0,
        },
    )
    .await
    .expect("create segment");
    (promotion_id, segment_id)
}

/// Seed a catalog product owned by `seller_id`
pub fn seed_product(store: &MemoryStore, seller_id: i64, discount: i32) -> i64 {
    store.add_product(Product {
        id: 0,
        seller_id,
        name: "notebook set".to_string(),
        price: dec!(900),
        discount,
        category_name: Some("stationery".to_string()),
    })
}
