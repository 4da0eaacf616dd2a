//! Promotion status transitions and the readiness gate
//!
//! The lifecycle is a small closed state machine:
//!
//! ```text
//! NOT_READY ⇄ READY_TO_START → RUNNING ⇄ PAUSED
//!                                  │        │
//!                                  └──→ COMPLETED ←┘
//! ```
//!
//! Entering `READY_TO_START` is the expensive edge: the promotion's full
//! configuration is validated, slots are materialized for every segment, and
//! (for auction pricing) the auction is created and linked. Only after all of
//! that succeeds is the new status persisted, so a failed launch leaves the
//! stored status untouched.

use rust_decimal::Decimal;
use tracing::info;

use crate::common::errors::{EngineError, Result};
use crate::common::types::{
    parse_promotion_date, IdentificationMode, PricingModel, Promotion, PromotionStatus,
};

use super::Engine;

/// Check that `from -> to` is a legal lifecycle edge.
///
/// `Unspecified` on either side is a validation error. A transition to the
/// current status is accepted as a no-op; any other pair outside the allowed
/// edge set is a conflict.
pub fn validate_transition(from: PromotionStatus, to: PromotionStatus) -> Result<()> {
    if to == PromotionStatus::Unspecified {
        return Err(EngineError::validation("invalid target status"));
    }
    if from == PromotionStatus::Unspecified {
        return Err(EngineError::validation("invalid current promotion status"));
    }
    if from == to {
        return Ok(());
    }
    use PromotionStatus::{Completed, NotReady, Paused, ReadyToStart, Running};
    let allowed = matches!(
        (from, to),
        (NotReady, ReadyToStart)
            | (ReadyToStart, NotReady)
            | (ReadyToStart, Running)
            | (Running, Paused)
            | (Running, Completed)
            | (Paused, Running)
            | (Paused, Completed)
    );
    if allowed {
        Ok(())
    } else {
        Err(EngineError::conflict(format!(
            "invalid status transition: {from} -> {to}"
        )))
    }
}

impl Engine {
    /// Move a promotion to `target` along the lifecycle state machine.
    ///
    /// Requesting the current status is a successful no-op. Entering
    /// `ReadyToStart` additionally runs the readiness checks, materializes
    /// slots and (for auction pricing) the auction before the status write.
    pub async fn change_status(
        &self,
        promotion_id: i64,
        target: PromotionStatus,
    ) -> Result<()> {
        let promotion = self.promotion(promotion_id).await?;
        validate_transition(promotion.status, target)?;
        if promotion.status == target {
            return Ok(());
        }

        if target == PromotionStatus::ReadyToStart {
            self.check_readiness(&promotion).await?;
            let created = self.ensure_slots(&promotion).await?;
            self.ensure_auction(&promotion).await?;
            self.promotions.set_status(promotion_id, target).await?;
            info!(
                promotion_id,
                created_slots = created,
                "promotion is ready to start"
            );
            return Ok(());
        }

        self.promotions.set_status(promotion_id, target).await?;
        info!(promotion_id, from = %promotion.status, to = %target, "promotion status changed");
        Ok(())
    }

    /// Validate the full configuration required to launch a promotion.
    async fn check_readiness(&self, promotion: &Promotion) -> Result<()> {
        let date_from = parse_promotion_date(&promotion.date_from)
            .map_err(|_| EngineError::validation("invalid date_from format"))?;
        let date_to = parse_promotion_date(&promotion.date_to)
            .map_err(|_| EngineError::validation("invalid date_to format"))?;
        if date_from >= date_to {
            return Err(EngineError::validation(
                "date_from must be earlier than date_to",
            ));
        }

        if promotion.slot_count <= 0 {
            return Err(EngineError::validation("slot_count must be greater than 0"));
        }

        let segments = self.segments.by_promotion(promotion.id).await?;
        if segments.is_empty() {
            return Err(EngineError::validation("at least one segment is required"));
        }

        match promotion.pricing_model {
            PricingModel::Auction => {
                let min_price = promotion
                    .min_price
                    .ok_or_else(|| EngineError::validation("min_price must be greater than 0"))?;
                if min_price <= Decimal::ZERO {
                    return Err(EngineError::validation("min_price must be greater than 0"));
                }
                let bid_step = promotion
                    .bid_step
                    .ok_or_else(|| EngineError::validation("bid_step must be greater than 0"))?;
                if bid_step <= Decimal::ZERO {
                    return Err(EngineError::validation("bid_step must be greater than 0"));
                }
            }
            PricingModel::Fixed => {
                for position in 1..=promotion.slot_count {
                    let price = promotion.fixed_prices.get(&position).copied();
                    match price {
                        Some(p) if p > Decimal::ZERO => {}
                        _ => {
                            return Err(EngineError::validation(format!(
                                "fixed price for position {position} must be greater than 0"
                            )))
                        }
                    }
                }
            }
        }

        if promotion.identification_mode == IdentificationMode::Questions {
            let questions = self.polls.questions_by_promotion(promotion.id).await?;
            if questions.is_empty() {
                return Err(EngineError::validation(
                    "questions identification requires at least one question",
                ));
            }
            let question_ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
            let options = self.polls.options_by_questions(&question_ids).await?;
            for question in &questions {
                if !options.iter().any(|o| o.question_id == question.id) {
                    return Err(EngineError::validation(format!(
                        "question {} must have at least one option",
                        question.id
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::common::errors::EngineError;
    use crate::common::types::{IdentificationMode, PromotionStatus};
    use crate::engine::testutil::{auction_promotion, engine, fixed_promotion, seed_promotion};
    use crate::store::traits::{PollQuestionInput, PollStore, PromotionStore, SlotStore};

    use super::validate_transition;

    use PromotionStatus::{Completed, NotReady, Paused, ReadyToStart, Running, Unspecified};

    #[test]
    fn test_transition_table() {
        let allowed = [
            (NotReady, ReadyToStart),
            (ReadyToStart, NotReady),
            (ReadyToStart, Running),
            (Running, Paused),
            (Running, Completed),
            (Paused, Running),
            (Paused, Completed),
        ];
        for (from, to) in allowed {
            assert!(
                validate_transition(from, to).is_ok(),
                "{from} -> {to} should be allowed"
            );
        }

        let statuses = [NotReady, ReadyToStart, Running, Paused, Completed];
        for from in statuses {
            for to in statuses {
                if from == to || allowed.contains(&(from, to)) {
                    continue;
                }
                let err = validate_transition(from, to).expect_err("edge must be rejected");
                assert!(
                    matches!(err, EngineError::Conflict(_)),
                    "{from} -> {to} should conflict, got {err:?}"
                );
            }
        }
    }

    #[test]
    fn test_transition_same_status_is_noop() {
        for status in [NotReady, ReadyToStart, Running, Paused, Completed] {
            assert!(validate_transition(status, status).is_ok());
        }
    }

    #[test]
    fn test_transition_unspecified_is_validation_error() {
        assert!(matches!(
            validate_transition(Unspecified, Running),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            validate_transition(NotReady, Unspecified),
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_launch_materializes_slots_and_sets_status() {
        let (engine, store) = engine();
        let (promotion_id, _) = seed_promotion(&store, &auction_promotion()).await;

        engine
            .change_status(promotion_id, ReadyToStart)
            .await
            .expect("launch");

        let stored = PromotionStore::get(&store, promotion_id)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(stored.status, ReadyToStart);

        let slots = SlotStore::by_promotion(&store, promotion_id)
            .await
            .expect("slots");
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|s| s.auction_id.is_some()));
    }

    #[tokio::test]
    async fn test_failed_readiness_leaves_status_untouched() {
        let (engine, store) = engine();
        // No segments seeded, so readiness must fail.
        let promotion_id = PromotionStore::create(&store, &auction_promotion())
            .await
            .expect("create");

        let err = engine
            .change_status(promotion_id, ReadyToStart)
            .await
            .expect_err("launch must fail");
        assert_eq!(
            err.to_string(),
            "validation error: at least one segment is required"
        );

        let stored = PromotionStore::get(&store, promotion_id)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(stored.status, NotReady);
        assert!(SlotStore::by_promotion(&store, promotion_id)
            .await
            .expect("slots")
            .is_empty());
    }

    #[tokio::test]
    async fn test_launch_rejects_missing_fixed_price() {
        let (engine, store) = engine();
        let mut promotion = fixed_promotion();
        promotion.fixed_prices.remove(&2);
        let (promotion_id, _) = seed_promotion(&store, &promotion).await;

        let err = engine
            .change_status(promotion_id, ReadyToStart)
            .await
            .expect_err("launch must fail");
        assert_eq!(
            err.to_string(),
            "validation error: fixed price for position 2 must be greater than 0"
        );
    }

    #[tokio::test]
    async fn test_launch_rejects_inverted_dates() {
        let (engine, store) = engine();
        let mut promotion = auction_promotion();
        promotion.date_from = "2025-03-10T00:00:00Z".to_string();
        promotion.date_to = "2025-03-01T00:00:00Z".to_string();
        let (promotion_id, _) = seed_promotion(&store, &promotion).await;

        let err = engine
            .change_status(promotion_id, ReadyToStart)
            .await
            .expect_err("launch must fail");
        assert_eq!(
            err.to_string(),
            "validation error: date_from must be earlier than date_to"
        );
    }

    #[tokio::test]
    async fn test_launch_questions_mode_requires_options() {
        let (engine, store) = engine();
        let mut promotion = auction_promotion();
        promotion.identification_mode = IdentificationMode::Questions;
        let (promotion_id, _) = seed_promotion(&store, &promotion).await;

        let err = engine
            .change_status(promotion_id, ReadyToStart)
            .await
            .expect_err("no questions yet");
        assert_eq!(
            err.to_string(),
            "validation error: questions identification requires at least one question"
        );

        PollStore::save_questions(
            &store,
            promotion_id,
            &[PollQuestionInput {
                text: "who is this gift for?".to_string(),
                options: vec![],
            }],
        )
        .await
        .expect("save questions");

        let err = engine
            .change_status(promotion_id, ReadyToStart)
            .await
            .expect_err("question without options");
        assert!(err
            .to_string()
            .contains("must have at least one option"));
    }

    #[tokio::test]
    async fn test_change_status_unknown_promotion_is_not_found() {
        let (engine, _) = engine();
        assert!(matches!(
            engine.change_status(404, Running).await,
            Err(EngineError::NotFound(_))
        ));
    }
}
