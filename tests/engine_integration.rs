//! End-to-end engine flows over the in-memory store
//!
//! These tests drive the public engine surface only: campaign setup, launch,
//! bidding or moderated claims, and completion. Raw store access is limited
//! to fixtures and final-state assertions.
//!
//! To run these tests:
//! ```
//! cargo test --test engine_integration
//! ```

mod common;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

use slotmarket::store::SlotStore;
use slotmarket::{EngineError, ModerationStatus, PromotionStatus, SlotStatus};

use common::{auction_promotion, fixed_promotion, seed_product, seed_promotion, test_engine};

#[tokio::test]
async fn test_auction_campaign_end_to_end() {
    let (engine, store) = test_engine();
    let promotion_id = engine
        .create_promotion(auction_promotion())
        .await
        .expect("create");
    engine
        .create_segment(promotion_id, "parents", Some("stationery".to_string()), 0)
        .await
        .expect("segment");

    // NOT_READY -> READY_TO_START materializes slots and the auction.
    engine
        .change_status(promotion_id, PromotionStatus::ReadyToStart)
        .await
        .expect("launch");
    let segment_id = engine
        .segments_for_promotion(promotion_id)
        .await
        .expect("segments")[0]
        .id;
    let market = engine.segment_market(segment_id).await.expect("market");
    assert_eq!(market.auction.len(), 2);
    assert_eq!(market.auction[0].min_bid, dec!(100));

    // Two sellers outbid each other on the first slot.
    let slot_id = market.auction[0].slot_id;
    let p7 = seed_product(&store, 7, 10);
    let p8 = seed_product(&store, 8, 10);
    engine.place_bid(7, slot_id, p7, dec!(100)).await.expect("opening bid");
    engine.place_bid(8, slot_id, p8, dec!(120)).await.expect("counter bid");
    assert!(matches!(
        engine.place_bid(7, slot_id, p7, dec!(130)).await,
        Err(EngineError::Validation(_))
    ));
    engine.place_bid(7, slot_id, p7, dec!(140)).await.expect("raise");

    let market = engine.segment_market(segment_id).await.expect("market");
    assert_eq!(market.auction[0].current_bid, dec!(140));
    assert_eq!(market.auction[0].min_bid, dec!(160));

    // READY_TO_START -> RUNNING -> PAUSED -> RUNNING -> COMPLETED.
    for status in [
        PromotionStatus::Running,
        PromotionStatus::Paused,
        PromotionStatus::Running,
        PromotionStatus::Completed,
    ] {
        engine
            .change_status(promotion_id, status)
            .await
            .expect("lifecycle step");
    }
    let finished = engine.get_promotion(promotion_id).await.expect("get");
    assert_eq!(finished.status, PromotionStatus::Completed);
}

#[tokio::test]
async fn test_fixed_campaign_with_moderation() {
    let (engine, store) = test_engine();
    let (promotion_id, segment_id) = seed_promotion(&store, &fixed_promotion()).await;
    engine
        .change_status(promotion_id, PromotionStatus::ReadyToStart)
        .await
        .expect("launch");

    let market = engine.segment_market(segment_id).await.expect("market");
    assert_eq!(market.fixed.len(), 2);
    let first_slot = market.fixed[0].slot_id;
    let second_slot = market.fixed[1].slot_id;

    let p7 = seed_product(&store, 7, 25);
    let p8 = seed_product(&store, 8, 5);
    engine.place_claim(7, first_slot, p7).await.expect("first claim");
    engine.place_claim(8, second_slot, p8).await.expect("second claim");

    let pending = engine
        .applications(promotion_id, Some(ModerationStatus::Pending))
        .await
        .expect("pending");
    assert_eq!(pending.len(), 2);
    // Stop factors travel from the promotion into the snapshot.
    assert_eq!(pending[0].stop_factors, vec!["counterfeit risk".to_string()]);

    engine
        .approve_application(pending[0].id, Some(99))
        .await
        .expect("approve");
    engine
        .reject_application(pending[1].id, Some("discount too low"), Some(99))
        .await
        .expect("reject");

    let approved = SlotStore::get(&store, first_slot)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(approved.status, SlotStatus::Occupied);
    assert_eq!(approved.seller_id, Some(7));

    let freed = SlotStore::get(&store, second_slot)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(freed.status, SlotStatus::Available);
    assert_eq!(freed.seller_id, None);

    // Resolution is exactly-once.
    let err = engine
        .approve_application(pending[1].id, None)
        .await
        .expect_err("already resolved");
    assert!(err.is_conflict());

    let remaining = engine
        .applications(promotion_id, Some(ModerationStatus::Pending))
        .await
        .expect("pending");
    assert_eq!(remaining.len(), 0);
}

#[tokio::test]
async fn test_lifecycle_rejects_skipping_launch() {
    let (engine, store) = test_engine();
    let (promotion_id, _) = seed_promotion(&store, &auction_promotion()).await;

    let err = engine
        .change_status(promotion_id, PromotionStatus::Running)
        .await
        .expect_err("must launch first");
    assert!(matches!(err, EngineError::Conflict(_)));
    assert_eq!(
        engine.get_promotion(promotion_id).await.expect("get").status,
        PromotionStatus::NotReady
    );
}

#[tokio::test]
async fn test_active_promotion_tracks_running_window() {
    let (engine, store) = test_engine();
    let mut promotion = auction_promotion();
    let now = Utc::now();
    promotion.date_from = (now - Duration::days(1)).to_rfc3339();
    promotion.date_to = (now + Duration::days(1)).to_rfc3339();
    let (promotion_id, _) = seed_promotion(&store, &promotion).await;

    assert!(engine.active_promotion().await.expect("none yet").is_none());

    engine
        .change_status(promotion_id, PromotionStatus::ReadyToStart)
        .await
        .expect("launch");
    engine
        .change_status(promotion_id, PromotionStatus::Running)
        .await
        .expect("run");

    let active = engine
        .active_promotion()
        .await
        .expect("query")
        .expect("running promotion in window");
    assert_eq!(active.id, promotion_id);

    engine
        .change_status(promotion_id, PromotionStatus::Completed)
        .await
        .expect("complete");
    assert!(engine.active_promotion().await.expect("query").is_none());
}

#[tokio::test]
async fn test_withdrawn_claim_frees_slot_for_next_seller() {
    let (engine, store) = test_engine();
    let (promotion_id, segment_id) = seed_promotion(&store, &fixed_promotion()).await;
    engine
        .change_status(promotion_id, PromotionStatus::ReadyToStart)
        .await
        .expect("launch");
    let slot_id = engine.segment_market(segment_id).await.expect("market").fixed[0].slot_id;

    let p7 = seed_product(&store, 7, 25);
    engine.place_claim(7, slot_id, p7).await.expect("claim");
    engine.withdraw(7, slot_id).await.expect("withdraw");

    let p8 = seed_product(&store, 8, 30);
    engine.place_claim(8, slot_id, p8).await.expect("reclaim");

    let pending = engine
        .applications(promotion_id, Some(ModerationStatus::Pending))
        .await
        .expect("pending");
    // The withdrawn seller's application is still pending, but approving it
    // conflicts because the slot now belongs to the new claim.
    assert_eq!(pending.len(), 2);
    assert!(matches!(
        engine.approve_application(pending[0].id, None).await,
        Err(EngineError::Conflict(_))
    ));
    engine
        .approve_application(pending[1].id, None)
        .await
        .expect("approve new claim");

    let slot = SlotStore::get(&store, slot_id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(slot.seller_id, Some(8));
}
