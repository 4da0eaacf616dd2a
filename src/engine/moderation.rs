//! Fixed-price claims and their moderation
//!
//! A seller claims an available fixed-priced slot, which creates a pending
//! application (snapshotting the product discount and the promotion's stop
//! factors) and parks the slot in moderation with the seller as tentative
//! occupant. Approve and reject both go through the store's single locked
//! resolve transaction, so each application is resolved exactly once.

use tracing::{debug, info};

use crate::common::errors::{EngineError, Result};
use crate::common::types::{
    ModerationApplication, ModerationDecision, ModerationStatus, PricingModel, SlotStatus,
};

use super::Engine;

impl Engine {
    /// Claim an available fixed-priced slot for a seller's product.
    pub async fn place_claim(&self, seller_id: i64, slot_id: i64, product_id: i64) -> Result<()> {
        let slot = self
            .slots
            .get(slot_id)
            .await?
            .ok_or_else(|| EngineError::not_found("slot not found"))?;
        if slot.status != SlotStatus::Available {
            return Err(EngineError::conflict("slot not available"));
        }
        if slot.pricing != PricingModel::Fixed {
            return Err(EngineError::validation(
                "promotion does not use fixed pricing",
            ));
        }
        let promotion = self.promotion(slot.promotion_id).await?;
        let product = self.owned_product(seller_id, product_id).await?;

        let application = ModerationApplication {
            id: 0,
            promotion_id: promotion.id,
            segment_id: slot.segment_id,
            slot_id,
            seller_id,
            product_id: product.id,
            discount: product.discount,
            stop_factors: promotion.stop_factors.clone(),
            status: ModerationStatus::Pending,
            moderator_id: None,
            resolved_at: None,
        };
        let application_id = self.moderation.create(&application).await?;
        self.slots
            .set_occupant(slot_id, Some(seller_id), Some(product_id), SlotStatus::Moderation)
            .await?;
        info!(slot_id, seller_id, application_id, "claim placed, slot in moderation");
        Ok(())
    }

    /// Applications of a promotion, optionally filtered by status.
    pub async fn applications(
        &self,
        promotion_id: i64,
        status: Option<ModerationStatus>,
    ) -> Result<Vec<ModerationApplication>> {
        self.promotion(promotion_id).await?;
        self.moderation.list_by_promotion(promotion_id, status).await
    }

    /// Approve a pending application; the slot becomes occupied by the
    /// claiming seller.
    pub async fn approve_application(
        &self,
        application_id: i64,
        moderator_id: Option<i64>,
    ) -> Result<()> {
        self.moderation
            .resolve(application_id, ModerationDecision::Approve, moderator_id)
            .await?;
        info!(application_id, "application approved");
        Ok(())
    }

    /// Reject a pending application; the slot is freed back to available.
    ///
    /// The reason travels back to the seller over the transport layer but is
    /// not persisted.
    pub async fn reject_application(
        &self,
        application_id: i64,
        reason: Option<&str>,
        moderator_id: Option<i64>,
    ) -> Result<()> {
        if let Some(reason) = reason {
            debug!(application_id, reason, "rejecting application");
        }
        self.moderation
            .resolve(application_id, ModerationDecision::Reject, moderator_id)
            .await?;
        info!(application_id, "application rejected");
        Ok(())
    }
}
