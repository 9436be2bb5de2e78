//! Calendar navigation over archived conversations
//!
//! A calendar UI asks three questions about a chat: which years have
//! messages, which months of a year, which days of a month. This module
//! answers them without scanning the archive on every request:
//!
//! - **`range`**: calendar zone, date decomposition and half-open period ranges
//! - **`cache`**: per-chat year/month/day sets, only ever grown
//! - **`population`**: bounded worker pool that fills the cache in the background
//! - **`service`**: [`CalendarIndex`], the cache-or-archive lookups
//! - **`config`**: environment-driven settings
//!
//! The cache may lag the archive. It never holds a date that was not seen
//! on a stored message.

pub mod cache;
pub mod config;
pub mod population;
pub mod range;
pub mod service;

pub use cache::{CalendarCache, CalendarCacheStats, ConversationIndex};
pub use config::CalendarConfig;
pub use population::PopulationQueue;
pub use range::{CalendarDate, CalendarZone, TimeRange};
pub use service::{CalendarError, CalendarIndex};
