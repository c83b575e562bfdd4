//! Read path: filter translation and the query cache

pub mod cache;
pub mod filter;

pub use cache::{Clock, ManualClock, QueryCache, SystemClock};
pub use filter::{
    equipment_category, region_for_country, region_matches, EQUIPMENT_TYPES, NOT_ASSIGNED,
    REGION_OPTIONS,
};
