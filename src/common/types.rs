//! Unified domain types used across the engine and store adapters

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::{EngineError, Result};

/// Promotion lifecycle status
///
/// `Unspecified` is the parse fallback for unknown wire strings and is never
/// a valid endpoint of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromotionStatus {
    Unspecified,
    NotReady,
    ReadyToStart,
    Running,
    Paused,
    Completed,
}

impl PromotionStatus {
    /// Parse an API string (e.g. "NOT_READY", "running"); unknown values
    /// map to `Unspecified` rather than failing, matching the wire contract.
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "NOT_READY" => PromotionStatus::NotReady,
            "READY_TO_START" => PromotionStatus::ReadyToStart,
            "RUNNING" => PromotionStatus::Running,
            "PAUSED" => PromotionStatus::Paused,
            "COMPLETED" => PromotionStatus::Completed,
            _ => PromotionStatus::Unspecified,
        }
    }

    /// Wire string as stored and served
    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionStatus::Unspecified => "UNSPECIFIED",
            PromotionStatus::NotReady => "NOT_READY",
            PromotionStatus::ReadyToStart => "READY_TO_START",
            PromotionStatus::Running => "RUNNING",
            PromotionStatus::Paused => "PAUSED",
            PromotionStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for PromotionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How sellers pay for placement: competitive bidding or preset prices
///
/// Closed set on purpose: pricing behavior is dispatched through exhaustive
/// matches in the state machine and allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingModel {
    Auction,
    Fixed,
}

impl PricingModel {
    /// Parse an API string ("auction" / "fixed"), case-insensitive
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auction" => Some(PricingModel::Auction),
            "fixed" => Some(PricingModel::Fixed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PricingModel::Auction => "auction",
            PricingModel::Fixed => "fixed",
        }
    }
}

impl std::fmt::Display for PricingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a buyer is routed to a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentificationMode {
    /// Poll-based routing; requires questions with options before launch
    Questions,
    /// Implicit routing from the buyer profile; no further prerequisites
    UserProfile,
}

impl IdentificationMode {
    /// Parse an API string ("questions" / "user_profile"), case-insensitive
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "questions" => Some(IdentificationMode::Questions),
            "user_profile" => Some(IdentificationMode::UserProfile),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentificationMode::Questions => "questions",
            IdentificationMode::UserProfile => "user_profile",
        }
    }
}

impl std::fmt::Display for IdentificationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Slot booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    /// Free for bids or claims
    Available,
    /// A fixed-price claim is pending moderation
    Moderation,
    /// Committed to an occupant
    Occupied,
}

impl SlotStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "available" => Some(SlotStatus::Available),
            "moderation" => Some(SlotStatus::Moderation),
            "occupied" => Some(SlotStatus::Occupied),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Moderation => "moderation",
            SlotStatus::Occupied => "occupied",
        }
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Moderation application status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ModerationStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(ModerationStatus::Pending),
            "approved" => Some(ModerationStatus::Approved),
            "rejected" => Some(ModerationStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationStatus::Pending => "pending",
            ModerationStatus::Approved => "approved",
            ModerationStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Moderator verdict for a pending application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationDecision {
    Approve,
    Reject,
}

impl ModerationDecision {
    /// The terminal application status this decision writes
    pub fn resolved_status(&self) -> ModerationStatus {
        match self {
            ModerationDecision::Approve => ModerationStatus::Approved,
            ModerationDecision::Reject => ModerationStatus::Rejected,
        }
    }
}

/// The aggregate root: campaign configuration and current lifecycle status
///
/// Campaign dates are kept as the free-form strings the admin API accepts;
/// they are parsed tolerantly by the readiness check (see
/// [`parse_promotion_date`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub theme: String,
    pub date_from: String,
    pub date_to: String,
    pub status: PromotionStatus,
    pub identification_mode: IdentificationMode,
    pub pricing_model: PricingModel,
    /// Positions per segment; must be > 0 before launch
    pub slot_count: i32,
    /// Campaign discount percentage (display and snapshotting only)
    #[serde(default)]
    pub discount: i32,
    /// Auction pricing: floor for the first bid
    #[serde(default)]
    pub min_price: Option<Decimal>,
    /// Auction pricing: minimum increment between successive bids
    #[serde(default)]
    pub bid_step: Option<Decimal>,
    /// Fixed pricing: price per position, 1..=slot_count
    #[serde(default)]
    pub fixed_prices: BTreeMap<i32, Decimal>,
    /// Free-form disqualification reasons, snapshotted into applications
    #[serde(default)]
    pub stop_factors: Vec<String>,
}

/// An audience bucket within a promotion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: i64,
    pub promotion_id: i64,
    pub name: String,
    #[serde(default)]
    pub category_name: Option<String>,
    /// Display and iteration order; not enforced unique
    #[serde(default)]
    pub order_index: i32,
}

/// One bookable placement unit at a (segment, position) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: i64,
    pub promotion_id: i64,
    pub segment_id: i64,
    /// 1-based position within the segment
    pub position: i32,
    /// Pricing model inherited from the promotion at materialization time
    pub pricing: PricingModel,
    /// Fixed pricing only; copied from the promotion's price map at creation
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Auction pricing only; set once an auction exists
    #[serde(default)]
    pub auction_id: Option<i64>,
    pub status: SlotStatus,
    /// Absent while available; absent under curation even when occupied
    #[serde(default)]
    pub seller_id: Option<i64>,
    #[serde(default)]
    pub product_id: Option<i64>,
}

/// At most one active auction per promotion, created lazily at launch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub id: i64,
    pub promotion_id: i64,
    /// Campaign window mirrored from the promotion at creation
    pub date_from: String,
    pub date_to: String,
    pub min_price: Decimal,
    pub bid_step: Decimal,
}

/// A seller's bid on an auction slot
///
/// Bids are append-only; only the highest non-withdrawn bid per slot is
/// binding at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: i64,
    pub auction_id: i64,
    pub slot_id: i64,
    pub seller_id: i64,
    pub product_id: i64,
    pub amount: Decimal,
}

/// A pending fixed-price claim awaiting approve/reject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationApplication {
    pub id: i64,
    pub promotion_id: i64,
    pub segment_id: i64,
    pub slot_id: i64,
    pub seller_id: i64,
    pub product_id: i64,
    /// Product discount at claim time
    pub discount: i32,
    /// Promotion stop factors at claim time
    #[serde(default)]
    pub stop_factors: Vec<String>,
    pub status: ModerationStatus,
    #[serde(default)]
    pub moderator_id: Option<i64>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Catalog product, consulted for seller ownership checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub seller_id: i64,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub discount: i32,
    #[serde(default)]
    pub category_name: Option<String>,
}

/// One poll question backing the `questions` identification mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollQuestion {
    pub id: i64,
    pub promotion_id: i64,
    pub text: String,
}

/// An answer option belonging to a poll question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    #[serde(default)]
    pub value: String,
}

/// Tolerant campaign-date parser
///
/// Accepts RFC 3339 with or without fractional seconds, the space-separated
/// Postgres text forms with a zone offset (full or hour-only), and a bare
/// date taken as midnight UTC.
pub fn parse_promotion_date(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    const LAYOUTS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S%.f%#z",
        "%Y-%m-%d %H:%M:%S%#z",
    ];
    for layout in LAYOUTS {
        if let Ok(dt) = DateTime::parse_from_str(value, layout) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }
    Err(EngineError::validation(format!(
        "unsupported date format: {value:?}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_roundtrip() {
        for status in [
            PromotionStatus::NotReady,
            PromotionStatus::ReadyToStart,
            PromotionStatus::Running,
            PromotionStatus::Paused,
            PromotionStatus::Completed,
        ] {
            assert_eq!(PromotionStatus::parse(status.as_str()), status);
        }
        assert_eq!(
            PromotionStatus::parse("running"),
            PromotionStatus::Running
        );
        assert_eq!(
            PromotionStatus::parse("garbage"),
            PromotionStatus::Unspecified
        );
    }

    #[test]
    fn test_enum_wire_forms_match_serde() {
        // The serde rename rules must agree with as_str(), since the
        // adapters store as_str() and the API serializes through serde.
        assert_eq!(
            serde_json::to_string(&PromotionStatus::ReadyToStart).unwrap(),
            "\"READY_TO_START\""
        );
        assert_eq!(
            serde_json::to_string(&PricingModel::Auction).unwrap(),
            "\"auction\""
        );
        assert_eq!(
            serde_json::to_string(&IdentificationMode::UserProfile).unwrap(),
            "\"user_profile\""
        );
        assert_eq!(
            serde_json::to_string(&SlotStatus::Moderation).unwrap(),
            "\"moderation\""
        );
        assert_eq!(
            serde_json::to_string(&ModerationStatus::Pending).unwrap(),
            "\"pending\""
        );

        let status: PromotionStatus = serde_json::from_str("\"RUNNING\"").unwrap();
        assert_eq!(status, PromotionStatus::Running);
        let pricing: PricingModel = serde_json::from_str("\"fixed\"").unwrap();
        assert_eq!(pricing, PricingModel::Fixed);
    }

    #[test]
    fn test_pricing_model_parse() {
        assert_eq!(PricingModel::parse("AUCTION"), Some(PricingModel::Auction));
        assert_eq!(PricingModel::parse("fixed"), Some(PricingModel::Fixed));
        assert_eq!(PricingModel::parse("unspecified"), None);
    }

    #[test]
    fn test_parse_promotion_date_formats() {
        for value in [
            "2025-03-01T10:00:00Z",
            "2025-03-01T10:00:00.123456Z",
            "2025-03-01T10:00:00+03:00",
            "2025-03-01 10:00:00+03:00",
            "2025-03-01 10:00:00.5+03:00",
            "2025-03-01 10:00:00+03",
            "2025-03-01",
        ] {
            assert!(
                parse_promotion_date(value).is_ok(),
                "should parse {value:?}"
            );
        }
    }

    #[test]
    fn test_parse_promotion_date_rejects_garbage() {
        assert!(parse_promotion_date("next tuesday").is_err());
        assert!(parse_promotion_date("").is_err());
    }

    #[test]
    fn test_bare_date_is_midnight_utc() {
        let dt = parse_promotion_date("2025-03-01").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-03-01T00:00:00+00:00");
    }
}
