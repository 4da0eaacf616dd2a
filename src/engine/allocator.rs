//! Slot materialization
//!
//! A promotion's inventory is the cross product of its segments and the
//! positions `1..=slot_count`. Materialization is additive and idempotent:
//! slots already present (keyed by segment, position and pricing model) are
//! left alone, so launching twice or adding a segment and relaunching only
//! fills the gaps.

use std::collections::HashSet;

use tracing::debug;

use crate::common::errors::Result;
use crate::common::types::{PricingModel, Promotion, Slot, SlotStatus};

use super::Engine;

impl Engine {
    /// Create the missing slots for every (segment, position) pair.
    ///
    /// Fixed-priced slots capture their price from the promotion's price
    /// table at creation; later edits to the table do not touch existing
    /// slots. Returns the number of slots created.
    pub(crate) async fn ensure_slots(&self, promotion: &Promotion) -> Result<usize> {
        if promotion.slot_count <= 0 {
            return Ok(0);
        }
        let segments = self.segments.by_promotion(promotion.id).await?;
        if segments.is_empty() {
            return Ok(0);
        }

        let existing = self.slots.by_promotion(promotion.id).await?;
        let mut seen: HashSet<(i64, i32, PricingModel)> = existing
            .iter()
            .map(|s| (s.segment_id, s.position, s.pricing))
            .collect();

        let mut created = 0usize;
        for segment in &segments {
            for position in 1..=promotion.slot_count {
                if !seen.insert((segment.id, position, promotion.pricing_model)) {
                    continue;
                }
                let price = match promotion.pricing_model {
                    PricingModel::Fixed => promotion.fixed_prices.get(&position).copied(),
                    PricingModel::Auction => None,
                };
                let slot = Slot {
                    id: 0,
                    promotion_id: promotion.id,
                    segment_id: segment.id,
                    position,
                    pricing: promotion.pricing_model,
                    price,
                    auction_id: None,
                    status: SlotStatus::Available,
                    seller_id: None,
                    product_id: None,
                };
                self.slots.create(&slot).await?;
                created += 1;
            }
        }

        if created > 0 {
            debug!(promotion_id = promotion.id, created, "materialized slots");
        }
        Ok(created)
    }
}
