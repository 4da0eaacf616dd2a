//! Postgres store adapters
//!
//! Runtime-bound sqlx queries over the schema in `migrations/0001_init.sql`.
//! Soft deletes are `deleted_at` tombstones checked by every read path.
//! Campaign dates live in `timestamptz` columns and travel as text, which is
//! why the entities keep them as strings.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::common::errors::{EngineError, Result};
use crate::common::types::{
    Auction, Bid, IdentificationMode, ModerationApplication, ModerationDecision,
    ModerationStatus, PollOption, PollQuestion, PricingModel, Product, Promotion,
    PromotionStatus, Segment, Slot, SlotStatus,
};
use crate::config::DatabaseConfig;

use super::traits::{
    AuctionStore, BidStore, ModerationStore, PollQuestionInput, PollStore, ProductStore,
    PromotionStore, SegmentStore, SlotStore,
};

/// Postgres-backed implementation of every store trait
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .connect(&config.url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_pricing(value: &str) -> Result<PricingModel> {
    PricingModel::parse(value)
        .ok_or_else(|| EngineError::validation(format!("unknown pricing model: {value:?}")))
}

fn parse_identification(value: &str) -> Result<IdentificationMode> {
    IdentificationMode::parse(value)
        .ok_or_else(|| EngineError::validation(format!("unknown identification mode: {value:?}")))
}

fn parse_slot_status(value: &str) -> Result<SlotStatus> {
    SlotStatus::parse(value)
        .ok_or_else(|| EngineError::validation(format!("unknown slot status: {value:?}")))
}

fn parse_moderation_status(value: &str) -> Result<ModerationStatus> {
    ModerationStatus::parse(value)
        .ok_or_else(|| EngineError::validation(format!("unknown application status: {value:?}")))
}

fn promotion_from_row(row: &PgRow) -> Result<Promotion> {
    let status: String = row.try_get("status")?;
    let identification: String = row.try_get("identification_mode")?;
    let pricing: String = row.try_get("pricing_model")?;
    let stop_factors: Option<Json<Vec<String>>> = row.try_get("stop_factors")?;
    let fixed_prices: Option<Json<BTreeMap<i32, Decimal>>> = row.try_get("fixed_prices")?;
    Ok(Promotion {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        theme: row.try_get("theme")?,
        date_from: row.try_get("date_from")?,
        date_to: row.try_get("date_to")?,
        status: PromotionStatus::parse(&status),
        identification_mode: parse_identification(&identification)?,
        pricing_model: parse_pricing(&pricing)?,
        slot_count: row.try_get("slot_count")?,
        discount: row.try_get("discount")?,
        min_price: row.try_get("min_price")?,
        bid_step: row.try_get("bid_step")?,
        fixed_prices: fixed_prices.map(|j| j.0).unwrap_or_default(),
        stop_factors: stop_factors.map(|j| j.0).unwrap_or_default(),
    })
}

fn segment_from_row(row: &PgRow) -> Result<Segment> {
    Ok(Segment {
        id: row.try_get("id")?,
        promotion_id: row.try_get("promotion_id")?,
        name: row.try_get("name")?,
        category_name: row.try_get("category_name")?,
        order_index: row.try_get("order_index")?,
    })
}

fn slot_from_row(row: &PgRow) -> Result<Slot> {
    let pricing: String = row.try_get("pricing_type")?;
    let status: String = row.try_get("status")?;
    Ok(Slot {
        id: row.try_get("id")?,
        promotion_id: row.try_get("promotion_id")?,
        segment_id: row.try_get("segment_id")?,
        position: row.try_get("position")?,
        pricing: parse_pricing(&pricing)?,
        price: row.try_get("price")?,
        auction_id: row.try_get("auction_id")?,
        status: parse_slot_status(&status)?,
        seller_id: row.try_get("seller_id")?,
        product_id: row.try_get("product_id")?,
    })
}

fn application_from_row(row: &PgRow) -> Result<ModerationApplication> {
    let status: String = row.try_get("status")?;
    let stop_factors: Option<Json<Vec<String>>> = row.try_get("stop_factors")?;
    Ok(ModerationApplication {
        id: row.try_get("id")?,
        promotion_id: row.try_get("promotion_id")?,
        segment_id: row.try_get("segment_id")?,
        slot_id: row.try_get("slot_id")?,
        seller_id: row.try_get("seller_id")?,
        product_id: row.try_get("product_id")?,
        discount: row.try_get("discount")?,
        stop_factors: stop_factors.map(|j| j.0).unwrap_or_default(),
        status: parse_moderation_status(&status)?,
        moderator_id: row.try_get("moderator_id")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

const PROMOTION_COLUMNS: &str = "id, name, description, theme, date_from::text, date_to::text, \
     status, identification_mode, pricing_model, slot_count, discount, min_price, bid_step, \
     stop_factors, fixed_prices";

const SLOT_COLUMNS: &str =
    "id, promotion_id, segment_id, position, pricing_type, price, auction_id, status, \
     seller_id, product_id";

const APPLICATION_COLUMNS: &str =
    "id, promotion_id, segment_id, slot_id, seller_id, product_id, discount, stop_factors, \
     status, moderator_id, resolved_at";

#[async_trait]
impl PromotionStore for PgStore {
    async fn get(&self, id: i64) -> Result<Option<Promotion>> {
        let query = format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotion WHERE id = $1 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&query).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(promotion_from_row).transpose()
    }

    async fn get_active(&self, now: DateTime<Utc>) -> Result<Option<Promotion>> {
        let query = format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotion \
             WHERE status = 'RUNNING' AND date_from <= $1 AND date_to >= $1 \
             AND deleted_at IS NULL LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(promotion_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<Promotion>> {
        let query = format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotion WHERE deleted_at IS NULL ORDER BY id"
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(promotion_from_row).collect()
    }

    async fn create(&self, promotion: &Promotion) -> Result<i64> {
        let row = sqlx::query(
            "INSERT INTO promotion (name, description, theme, date_from, date_to, status, \
             identification_mode, pricing_model, slot_count, discount, min_price, bid_step, \
             stop_factors, fixed_prices) \
             VALUES ($1, $2, $3, $4::timestamptz, $5::timestamptz, $6, $7, $8, $9, $10, $11, \
             $12, $13, $14) RETURNING id",
        )
        .bind(&promotion.name)
        .bind(&promotion.description)
        .bind(&promotion.theme)
        .bind(&promotion.date_from)
        .bind(&promotion.date_to)
        .bind(promotion.status.as_str())
        .bind(promotion.identification_mode.as_str())
        .bind(promotion.pricing_model.as_str())
        .bind(promotion.slot_count)
        .bind(promotion.discount)
        .bind(promotion.min_price)
        .bind(promotion.bid_step)
        .bind(Json(&promotion.stop_factors))
        .bind(Json(&promotion.fixed_prices))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("id")?)
    }

    async fn update(&self, promotion: &Promotion) -> Result<()> {
        sqlx::query(
            "UPDATE promotion SET name = $2, description = $3, theme = $4, \
             date_from = $5::timestamptz, date_to = $6::timestamptz, status = $7, \
             identification_mode = $8, pricing_model = $9, slot_count = $10, discount = $11, \
             min_price = $12, bid_step = $13, stop_factors = $14, fixed_prices = $15, \
             updated_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(promotion.id)
        .bind(&promotion.name)
        .bind(&promotion.description)
        .bind(&promotion.theme)
        .bind(&promotion.date_from)
        .bind(&promotion.date_to)
        .bind(promotion.status.as_str())
        .bind(promotion.identification_mode.as_str())
        .bind(promotion.pricing_model.as_str())
        .bind(promotion.slot_count)
        .bind(promotion.discount)
        .bind(promotion.min_price)
        .bind(promotion.bid_step)
        .bind(Json(&promotion.stop_factors))
        .bind(Json(&promotion.fixed_prices))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn soft_delete(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE promotion SET deleted_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_status(&self, id: i64, status: PromotionStatus) -> Result<()> {
        sqlx::query("UPDATE promotion SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_fixed_prices(&self, id: i64, prices: &BTreeMap<i32, Decimal>) -> Result<()> {
        sqlx::query("UPDATE promotion SET fixed_prices = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(Json(prices))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SegmentStore for PgStore {
    async fn by_promotion(&self, promotion_id: i64) -> Result<Vec<Segment>> {
        let rows = sqlx::query(
            "SELECT id, promotion_id, name, category_name, order_index FROM segment \
             WHERE promotion_id = $1 ORDER BY order_index, id",
        )
        .bind(promotion_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(segment_from_row).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<Segment>> {
        let row = sqlx::query(
            "SELECT id, promotion_id, name, category_name, order_index FROM segment \
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(segment_from_row).transpose()
    }

    async fn get_for_promotion(
        &self,
        promotion_id: i64,
        segment_id: i64,
    ) -> Result<Option<Segment>> {
        let row = sqlx::query(
            "SELECT id, promotion_id, name, category_name, order_index FROM segment \
             WHERE promotion_id = $1 AND id = $2",
        )
        .bind(promotion_id)
        .bind(segment_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(segment_from_row).transpose()
    }

    async fn create(&self, segment: &Segment) -> Result<i64> {
        let row = sqlx::query(
            "INSERT INTO segment (promotion_id, name, category_name, order_index) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(segment.promotion_id)
        .bind(&segment.name)
        .bind(&segment.category_name)
        .bind(segment.order_index)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("id")?)
    }

    async fn update(&self, segment: &Segment) -> Result<()> {
        sqlx::query(
            "UPDATE segment SET name = $2, category_name = $3, order_index = $4, \
             updated_at = now() WHERE id = $1",
        )
        .bind(segment.id)
        .bind(&segment.name)
        .bind(&segment.category_name)
        .bind(segment.order_index)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM segment WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn shuffle_categories(&self, promotion_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(
            "SELECT id, category_name FROM segment WHERE promotion_id = $1 \
             ORDER BY order_index, id FOR UPDATE",
        )
        .bind(promotion_id)
        .fetch_all(&mut *tx)
        .await?;
        if rows.len() < 2 {
            return Ok(());
        }
        let ids: Vec<i64> = rows
            .iter()
            .map(|r| r.try_get("id"))
            .collect::<std::result::Result<_, _>>()?;
        let mut labels: Vec<Option<String>> = rows
            .iter()
            .map(|r| r.try_get("category_name"))
            .collect::<std::result::Result<_, _>>()?;
        labels.rotate_right(1);
        for (id, label) in ids.iter().zip(labels) {
            sqlx::query("UPDATE segment SET category_name = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(label)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl SlotStore for PgStore {
    async fn by_segment(&self, segment_id: i64, only_occupied: bool) -> Result<Vec<Slot>> {
        let mut query = format!("SELECT {SLOT_COLUMNS} FROM slot WHERE segment_id = $1");
        if only_occupied {
            query.push_str(" AND status = 'occupied'");
        }
        query.push_str(" ORDER BY position");
        let rows = sqlx::query(&query)
            .bind(segment_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(slot_from_row).collect()
    }

    async fn by_promotion(&self, promotion_id: i64) -> Result<Vec<Slot>> {
        let query = format!(
            "SELECT {SLOT_COLUMNS} FROM slot WHERE promotion_id = $1 \
             ORDER BY segment_id, position"
        );
        let rows = sqlx::query(&query)
            .bind(promotion_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(slot_from_row).collect()
    }

    async fn by_seller(&self, seller_id: i64, promotion_id: Option<i64>) -> Result<Vec<Slot>> {
        let rows = match promotion_id {
            Some(promotion_id) => {
                let query = format!(
                    "SELECT {SLOT_COLUMNS} FROM slot WHERE seller_id = $1 AND promotion_id = $2 \
                     ORDER BY promotion_id, segment_id, position"
                );
                sqlx::query(&query)
                    .bind(seller_id)
                    .bind(promotion_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let query = format!(
                    "SELECT {SLOT_COLUMNS} FROM slot WHERE seller_id = $1 \
                     ORDER BY promotion_id, segment_id, position"
                );
                sqlx::query(&query)
                    .bind(seller_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(slot_from_row).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<Slot>> {
        let query = format!("SELECT {SLOT_COLUMNS} FROM slot WHERE id = $1");
        let row = sqlx::query(&query).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(slot_from_row).transpose()
    }

    async fn create(&self, slot: &Slot) -> Result<i64> {
        let row = sqlx::query(
            "INSERT INTO slot (promotion_id, segment_id, position, pricing_type, price, \
             auction_id, status, seller_id, product_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
        )
        .bind(slot.promotion_id)
        .bind(slot.segment_id)
        .bind(slot.position)
        .bind(slot.pricing.as_str())
        .bind(slot.price)
        .bind(slot.auction_id)
        .bind(slot.status.as_str())
        .bind(slot.seller_id)
        .bind(slot.product_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("id")?)
    }

    async fn update(&self, slot: &Slot) -> Result<()> {
        sqlx::query(
            "UPDATE slot SET pricing_type = $2, price = $3, auction_id = $4, status = $5, \
             seller_id = $6, product_id = $7, updated_at = now() WHERE id = $1",
        )
        .bind(slot.id)
        .bind(slot.pricing.as_str())
        .bind(slot.price)
        .bind(slot.auction_id)
        .bind(slot.status.as_str())
        .bind(slot.seller_id)
        .bind(slot.product_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_occupant(
        &self,
        slot_id: i64,
        seller_id: Option<i64>,
        product_id: Option<i64>,
        status: SlotStatus,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE slot SET seller_id = $2, product_id = $3, status = $4, updated_at = now() \
             WHERE id = $1",
        )
        .bind(slot_id)
        .bind(seller_id)
        .bind(product_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AuctionStore for PgStore {
    async fn by_promotion(&self, promotion_id: i64) -> Result<Option<Auction>> {
        let row = sqlx::query(
            "SELECT id, promotion_id, date_from::text, date_to::text, min_price, bid_step \
             FROM auction WHERE promotion_id = $1 AND deleted_at IS NULL",
        )
        .bind(promotion_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else { return Ok(None) };
        Ok(Some(Auction {
            id: row.try_get("id")?,
            promotion_id: row.try_get("promotion_id")?,
            date_from: row.try_get("date_from")?,
            date_to: row.try_get("date_to")?,
            min_price: row.try_get("min_price")?,
            bid_step: row.try_get("bid_step")?,
        }))
    }

    async fn create(&self, auction: &Auction) -> Result<i64> {
        let row = sqlx::query(
            "INSERT INTO auction (promotion_id, date_from, date_to, min_price, bid_step) \
             VALUES ($1, $2::timestamptz, $3::timestamptz, $4, $5) RETURNING id",
        )
        .bind(auction.promotion_id)
        .bind(&auction.date_from)
        .bind(&auction.date_to)
        .bind(auction.min_price)
        .bind(auction.bid_step)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("id")?)
    }
}

#[async_trait]
impl BidStore for PgStore {
    async fn create(&self, bid: &Bid) -> Result<i64> {
        let row = sqlx::query(
            "INSERT INTO bid (auction_id, slot_id, seller_id, product_id, amount) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(bid.auction_id)
        .bind(bid.slot_id)
        .bind(bid.seller_id)
        .bind(bid.product_id)
        .bind(bid.amount)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("id")?)
    }

    async fn top_by_slot(&self, slot_id: i64) -> Result<Option<Bid>> {
        let row = sqlx::query(
            "SELECT id, auction_id, slot_id, seller_id, product_id, amount FROM bid \
             WHERE slot_id = $1 AND deleted_at IS NULL ORDER BY amount DESC, id DESC LIMIT 1",
        )
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else { return Ok(None) };
        Ok(Some(Bid {
            id: row.try_get("id")?,
            auction_id: row.try_get("auction_id")?,
            slot_id: row.try_get("slot_id")?,
            seller_id: row.try_get("seller_id")?,
            product_id: row.try_get("product_id")?,
            amount: row.try_get("amount")?,
        }))
    }

    async fn withdraw(&self, slot_id: i64, seller_id: i64) -> Result<()> {
        sqlx::query("UPDATE bid SET deleted_at = now() WHERE slot_id = $1 AND seller_id = $2")
            .bind(slot_id)
            .bind(seller_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ModerationStore for PgStore {
    async fn list_by_promotion(
        &self,
        promotion_id: i64,
        status: Option<ModerationStatus>,
    ) -> Result<Vec<ModerationApplication>> {
        let rows = match status {
            Some(status) => {
                let query = format!(
                    "SELECT {APPLICATION_COLUMNS} FROM moderation_application \
                     WHERE promotion_id = $1 AND status = $2 ORDER BY id"
                );
                sqlx::query(&query)
                    .bind(promotion_id)
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let query = format!(
                    "SELECT {APPLICATION_COLUMNS} FROM moderation_application \
                     WHERE promotion_id = $1 ORDER BY id"
                );
                sqlx::query(&query)
                    .bind(promotion_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(application_from_row).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<ModerationApplication>> {
        let query = format!(
            "SELECT {APPLICATION_COLUMNS} FROM moderation_application WHERE id = $1"
        );
        let row = sqlx::query(&query).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(application_from_row).transpose()
    }

    async fn create(&self, application: &ModerationApplication) -> Result<i64> {
        let row = sqlx::query(
            "INSERT INTO moderation_application (promotion_id, segment_id, slot_id, seller_id, \
             product_id, discount, stop_factors, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
        )
        .bind(application.promotion_id)
        .bind(application.segment_id)
        .bind(application.slot_id)
        .bind(application.seller_id)
        .bind(application.product_id)
        .bind(application.discount)
        .bind(Json(&application.stop_factors))
        .bind(application.status.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("id")?)
    }

    async fn resolve(
        &self,
        application_id: i64,
        decision: ModerationDecision,
        moderator_id: Option<i64>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Lock the application row first, then its slot, so a concurrent
        // resolve or claim serializes behind this transaction.
        let application = sqlx::query(
            "SELECT id, slot_id, seller_id, status FROM moderation_application \
             WHERE id = $1 FOR UPDATE",
        )
        .bind(application_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| EngineError::not_found("application not found"))?;

        let status: String = application.try_get("status")?;
        if parse_moderation_status(&status)? != ModerationStatus::Pending {
            return Err(EngineError::conflict("application already resolved"));
        }
        let slot_id: i64 = application.try_get("slot_id")?;
        let applicant: i64 = application.try_get("seller_id")?;

        let slot = sqlx::query("SELECT id, status, seller_id FROM slot WHERE id = $1 FOR UPDATE")
            .bind(slot_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| EngineError::not_found("slot not found"))?;
        let slot_status: String = slot.try_get("status")?;
        if parse_slot_status(&slot_status)? != SlotStatus::Moderation {
            return Err(EngineError::conflict("slot is not in moderation"));
        }
        let occupant: Option<i64> = slot.try_get("seller_id")?;
        if occupant != Some(applicant) {
            return Err(EngineError::conflict("slot claimed by another seller"));
        }

        sqlx::query(
            "UPDATE moderation_application SET status = $2, moderator_id = $3, \
             resolved_at = now() WHERE id = $1",
        )
        .bind(application_id)
        .bind(decision.resolved_status().as_str())
        .bind(moderator_id)
        .execute(&mut *tx)
        .await?;

        match decision {
            ModerationDecision::Approve => {
                sqlx::query(
                    "UPDATE slot SET status = 'occupied', updated_at = now() WHERE id = $1",
                )
                .bind(slot_id)
                .execute(&mut *tx)
                .await?;
            }
            ModerationDecision::Reject => {
                sqlx::query(
                    "UPDATE slot SET status = 'available', seller_id = NULL, \
                     product_id = NULL, updated_at = now() WHERE id = $1",
                )
                .bind(slot_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ProductStore for PgStore {
    async fn get(&self, id: i64) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, seller_id, name, price, discount, category_name FROM product \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else { return Ok(None) };
        Ok(Some(Product {
            id: row.try_get("id")?,
            seller_id: row.try_get("seller_id")?,
            name: row.try_get("name")?,
            price: row.try_get("price")?,
            discount: row.try_get("discount")?,
            category_name: row.try_get("category_name")?,
        }))
    }

    async fn list_by_seller(
        &self,
        seller_id: i64,
        category: Option<String>,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Product>, u64)> {
        let per_page = per_page.max(1) as i64;
        let offset = (page.saturating_sub(1) as i64) * per_page;

        let (count_query, list_query) = match category {
            Some(_) => (
                "SELECT count(*) AS total FROM product \
                 WHERE seller_id = $1 AND category_name = $2 AND deleted_at IS NULL",
                "SELECT id, seller_id, name, price, discount, category_name FROM product \
                 WHERE seller_id = $1 AND category_name = $2 AND deleted_at IS NULL \
                 ORDER BY id LIMIT $3 OFFSET $4",
            ),
            None => (
                "SELECT count(*) AS total FROM product \
                 WHERE seller_id = $1 AND deleted_at IS NULL",
                "SELECT id, seller_id, name, price, discount, category_name FROM product \
                 WHERE seller_id = $1 AND deleted_at IS NULL \
                 ORDER BY id LIMIT $2 OFFSET $3",
            ),
        };

        let total: i64 = match &category {
            Some(category) => sqlx::query(count_query)
                .bind(seller_id)
                .bind(category)
                .fetch_one(&self.pool)
                .await?
                .try_get("total")?,
            None => sqlx::query(count_query)
                .bind(seller_id)
                .fetch_one(&self.pool)
                .await?
                .try_get("total")?,
        };

        let rows = match &category {
            Some(category) => {
                sqlx::query(list_query)
                    .bind(seller_id)
                    .bind(category)
                    .bind(per_page)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query(list_query)
                    .bind(seller_id)
                    .bind(per_page)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(Product {
                id: row.try_get("id")?,
                seller_id: row.try_get("seller_id")?,
                name: row.try_get("name")?,
                price: row.try_get("price")?,
                discount: row.try_get("discount")?,
                category_name: row.try_get("category_name")?,
            });
        }
        Ok((out, total.max(0) as u64))
    }
}

#[async_trait]
impl PollStore for PgStore {
    async fn questions_by_promotion(&self, promotion_id: i64) -> Result<Vec<PollQuestion>> {
        let rows = sqlx::query(
            "SELECT id, promotion_id, text FROM poll_question WHERE promotion_id = $1 \
             ORDER BY id",
        )
        .bind(promotion_id)
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(PollQuestion {
                id: row.try_get("id")?,
                promotion_id: row.try_get("promotion_id")?,
                text: row.try_get("text")?,
            });
        }
        Ok(out)
    }

    async fn options_by_questions(&self, question_ids: &[i64]) -> Result<Vec<PollOption>> {
        if question_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT id, question_id, text, value FROM poll_option \
             WHERE question_id = ANY($1) ORDER BY id",
        )
        .bind(question_ids)
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(PollOption {
                id: row.try_get("id")?,
                question_id: row.try_get("question_id")?,
                text: row.try_get("text")?,
                value: row.try_get("value")?,
            });
        }
        Ok(out)
    }

    async fn save_questions(
        &self,
        promotion_id: i64,
        questions: &[PollQuestionInput],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "DELETE FROM poll_option WHERE question_id IN \
             (SELECT id FROM poll_question WHERE promotion_id = $1)",
        )
        .bind(promotion_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM poll_question WHERE promotion_id = $1")
            .bind(promotion_id)
            .execute(&mut *tx)
            .await?;

        for question in questions {
            let row = sqlx::query(
                "INSERT INTO poll_question (promotion_id, text) VALUES ($1, $2) RETURNING id",
            )
            .bind(promotion_id)
            .bind(&question.text)
            .fetch_one(&mut *tx)
            .await?;
            let question_id: i64 = row.try_get("id")?;
            for option in &question.options {
                sqlx::query(
                    "INSERT INTO poll_option (question_id, text, value) VALUES ($1, $2, $3)",
                )
                .bind(question_id)
                .bind(&option.text)
                .bind(&option.value)
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }
}
