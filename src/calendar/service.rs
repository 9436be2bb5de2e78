use super::cache::CalendarCache;
use super::config::CalendarConfig;
use super::population::{PopulationQueue, distinct_dates};
use super::range::{CalendarZone, TimeRange};
use crate::store::{StoreError, TimestampSource};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by calendar navigation.
#[derive(Debug, Error)]
pub enum CalendarError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("month {0} is outside 1..=12")]
    InvalidMonth(u32),
    #[error("year {0} is outside the supported calendar range")]
    InvalidYear(i32),
}

/// Years, months and days with messages, per chat.
///
/// Answers come from [`CalendarCache`] when the requested level is already
/// known; otherwise the archive is queried over the matching calendar period.
/// A cold year listing also queues the whole history for background
/// population, which warms the month and day levels for later requests.
///
/// Every listing is deduplicated and ascending.
pub struct CalendarIndex {
    source: Arc<dyn TimestampSource>,
    cache: Arc<CalendarCache>,
    population: PopulationQueue,
    zone: CalendarZone,
}

impl CalendarIndex {
    /// Build an index with an empty cache. Must be called inside a Tokio runtime.
    pub fn new(source: Arc<dyn TimestampSource>, config: &CalendarConfig) -> Self {
        Self::with_cache(source, Arc::new(CalendarCache::new()), config)
    }

    pub fn with_cache(
        source: Arc<dyn TimestampSource>,
        cache: Arc<CalendarCache>,
        config: &CalendarConfig,
    ) -> Self {
        let population = PopulationQueue::start(Arc::clone(&cache), config);
        Self {
            source,
            cache,
            population,
            zone: config.zone,
        }
    }

    pub fn zone(&self) -> CalendarZone {
        self.zone
    }

    pub fn cache(&self) -> &CalendarCache {
        &self.cache
    }

    pub fn population(&self) -> &PopulationQueue {
        &self.population
    }

    /// Years with at least one message in the chat.
    pub async fn years(&self, chat_id: i64) -> Result<Vec<i32>, CalendarError> {
        let cached = self.cache.years(chat_id);
        if !cached.is_empty() {
            log::debug!("chat {}: years served from cache", chat_id);
            return Ok(cached);
        }

        log::debug!("chat {}: years cache miss, scanning history", chat_id);
        let timestamps = self.source.timestamps(chat_id, TimeRange::All).await?;

        let years: BTreeSet<i32> = distinct_dates(self.zone, chat_id, &timestamps)
            .into_iter()
            .map(|date| date.year)
            .collect();

        self.population.submit(chat_id, timestamps);

        Ok(years.into_iter().collect())
    }

    /// Months of `year` with at least one message, 1 = January.
    pub async fn months(&self, chat_id: i64, year: i32) -> Result<Vec<u32>, CalendarError> {
        let range = self
            .zone
            .year_range(year)
            .ok_or(CalendarError::InvalidYear(year))?;

        let cached = self.cache.months(chat_id, year);
        if !cached.is_empty() {
            log::debug!("chat {}: months of {} served from cache", chat_id, year);
            return Ok(cached);
        }

        log::debug!("chat {}: months of {} cache miss", chat_id, year);
        let timestamps = self.source.timestamps(chat_id, range).await?;

        let months: BTreeSet<u32> = distinct_dates(self.zone, chat_id, &timestamps)
            .into_iter()
            .filter(|date| date.year == year)
            .map(|date| date.month)
            .collect();

        Ok(months.into_iter().collect())
    }

    /// Days of `year`/`month` with at least one message.
    pub async fn days(&self, chat_id: i64, year: i32, month: u32) -> Result<Vec<u32>, CalendarError> {
        if !(1..=12).contains(&month) {
            return Err(CalendarError::InvalidMonth(month));
        }
        let range = self
            .zone
            .month_range(year, month)
            .ok_or(CalendarError::InvalidYear(year))?;

        let cached = self.cache.days(chat_id, year, month);
        if !cached.is_empty() {
            log::debug!("chat {}: days of {}-{:02} served from cache", chat_id, year, month);
            return Ok(cached);
        }

        log::debug!("chat {}: days of {}-{:02} cache miss", chat_id, year, month);
        let timestamps = self.source.timestamps(chat_id, range).await?;

        let days: BTreeSet<u32> = distinct_dates(self.zone, chat_id, &timestamps)
            .into_iter()
            .filter(|date| date.year == year && date.month == month)
            .map(|date| date.day)
            .collect();

        Ok(days.into_iter().collect())
    }

    /// Record one message timestamp in the cache right away.
    ///
    /// Idempotent and safe to call concurrently. Returns `true` if the
    /// timestamp added a new year, month or day.
    pub fn populate(&self, chat_id: i64, timestamp: i64) -> bool {
        match self.zone.date_of(timestamp) {
            Some(date) => self.cache.insert(chat_id, date),
            None => {
                log::warn!(
                    "chat {}: skipping timestamp {} outside the calendar range",
                    chat_id,
                    timestamp
                );
                false
            }
        }
    }

    /// Stop background population.
    pub async fn shutdown(&self) {
        self.population.shutdown().await;
    }
}
