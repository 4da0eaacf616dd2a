//! Persistence boundary: store traits and their backends

pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use traits::{
    AuctionStore, BidStore, ModerationStore, PollOptionInput, PollQuestionInput, PollStore,
    ProductStore, PromotionStore, SegmentStore, SlotStore,
};
