//! In-memory calendar index for archived conversations.
//!
//! ## Design
//!
//! - One [`ConversationIndex`] per chat, holding the years, months per year
//!   and days per month that have at least one message
//! - Chats are looked up through a `DashMap`; each chat's index sits behind
//!   its own `RwLock`, so all three sets of one chat change together
//! - Entries are only ever added. There is no eviction, and the cache is
//!   rebuilt from the archive after a restart

use super::range::CalendarDate;
use dashmap::DashMap;
use parking_lot::RwLock;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Calendar entries observed for a single chat.
#[derive(Debug, Default, Clone)]
pub struct ConversationIndex {
    years: BTreeSet<i32>,
    months: BTreeMap<i32, BTreeSet<u32>>,
    days: BTreeMap<(i32, u32), BTreeSet<u32>>,
}

impl ConversationIndex {
    /// Record one message date. Returns `true` if any set grew.
    pub fn insert(&mut self, date: CalendarDate) -> bool {
        let mut added = self.years.insert(date.year);
        added |= self.months.entry(date.year).or_default().insert(date.month);
        added |= self
            .days
            .entry((date.year, date.month))
            .or_default()
            .insert(date.day);
        added
    }

    fn entry_counts(&self) -> (usize, usize, usize) {
        (
            self.years.len(),
            self.months.values().map(BTreeSet::len).sum(),
            self.days.values().map(BTreeSet::len).sum(),
        )
    }
}

/// Cache statistics, exposed on the stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalendarCacheStats {
    /// Chats with at least one cached date.
    pub conversations: usize,
    /// Cached (chat, year) entries.
    pub years: usize,
    /// Cached (chat, year, month) entries.
    pub months: usize,
    /// Cached (chat, year, month, day) entries.
    pub days: usize,
}

/// Calendar index for every chat served by this process.
#[derive(Debug, Default)]
pub struct CalendarCache {
    conversations: DashMap<i64, Arc<RwLock<ConversationIndex>>>,
}

impl CalendarCache {
    pub fn new() -> Self {
        Self::default()
    }

    // Clone the Arc out so the shard guard is released before locking.
    fn existing(&self, chat_id: i64) -> Option<Arc<RwLock<ConversationIndex>>> {
        self.conversations
            .get(&chat_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    fn conversation(&self, chat_id: i64) -> Arc<RwLock<ConversationIndex>> {
        Arc::clone(self.conversations.entry(chat_id).or_default().value())
    }

    /// Cached years for a chat, ascending.
    pub fn years(&self, chat_id: i64) -> Vec<i32> {
        self.existing(chat_id)
            .map(|index| index.read().years.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Cached months of `year` for a chat, ascending.
    pub fn months(&self, chat_id: i64, year: i32) -> Vec<u32> {
        self.existing(chat_id)
            .and_then(|index| {
                index
                    .read()
                    .months
                    .get(&year)
                    .map(|months| months.iter().copied().collect())
            })
            .unwrap_or_default()
    }

    /// Cached days of `year`/`month` for a chat, ascending.
    pub fn days(&self, chat_id: i64, year: i32, month: u32) -> Vec<u32> {
        self.existing(chat_id)
            .and_then(|index| {
                index
                    .read()
                    .days
                    .get(&(year, month))
                    .map(|days| days.iter().copied().collect())
            })
            .unwrap_or_default()
    }

    /// Insert a single date (thread-safe, idempotent).
    pub fn insert(&self, chat_id: i64, date: CalendarDate) -> bool {
        self.conversation(chat_id).write().insert(date)
    }

    /// Merge many dates under one lock acquisition.
    ///
    /// Returns how many of the dates added at least one new entry.
    pub fn insert_many<I>(&self, chat_id: i64, dates: I) -> usize
    where
        I: IntoIterator<Item = CalendarDate>,
    {
        let conversation = self.conversation(chat_id);
        let mut index = conversation.write();
        dates
            .into_iter()
            .filter(|date| index.insert(*date))
            .count()
    }

    pub fn stats(&self) -> CalendarCacheStats {
        let indexes: Vec<_> = self
            .conversations
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        indexes
            .iter()
            .fold(CalendarCacheStats::default(), |mut stats, index| {
                let (years, months, days) = index.read().entry_counts();
                stats.conversations += 1;
                stats.years += years;
                stats.months += months;
                stats.days += days;
                stats
            })
    }
}
