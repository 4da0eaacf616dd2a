//! Slotmarket Library
//!
//! A promotion lifecycle and slot/auction allocation engine for time-boxed
//! marketplace campaigns: segmented slot inventory, auction or fixed pricing,
//! and moderated fixed-price claims.

pub mod common;
pub mod config;
pub mod engine;
pub mod store;

// Re-export commonly used types
pub use common::errors::{EngineError, Result};
pub use common::types::{
    Auction, Bid, IdentificationMode, ModerationApplication, ModerationDecision,
    ModerationStatus, PollOption, PollQuestion, PricingModel, Product, Promotion,
    PromotionStatus, Segment, Slot, SlotStatus,
};
pub use config::types::AppConfig;
pub use engine::{
    next_min_bid, validate_transition, AuctionSlotQuote, Engine, FixedSlotQuote, PromotionPoll,
    SegmentMarket,
};
pub use store::{MemoryStore, PgStore, PollOptionInput, PollQuestionInput};
