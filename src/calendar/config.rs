use super::range::CalendarZone;
use std::env;

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn env_zone(key: &str) -> CalendarZone {
    match env::var(key) {
        Ok(value) => CalendarZone::parse(&value).unwrap_or_else(|| {
            log::warn!("invalid {}='{}', falling back to local time", key, value);
            CalendarZone::Local
        }),
        Err(_) => CalendarZone::Local,
    }
}

fn default_workers() -> usize {
    num_cpus::get().clamp(1, 4)
}

/// Runtime configuration for the calendar index.
#[derive(Debug, Clone)]
pub struct CalendarConfig {
    /// Zone used to split message timestamps into dates.
    pub zone: CalendarZone,
    /// Background population worker count.
    pub population_workers: usize,
    /// Batches that may wait in the population queue.
    pub queue_capacity: usize,
    /// Timestamps merged per cache lock acquisition.
    pub batch_size: usize,
}

impl CalendarConfig {
    pub fn from_env() -> Self {
        Self {
            zone: env_zone("CALENDAR_TIMEZONE"),
            population_workers: env_usize("CALENDAR_POPULATION_WORKERS", default_workers()),
            queue_capacity: env_usize("CALENDAR_POPULATION_QUEUE", 256),
            batch_size: env_usize("CALENDAR_POPULATION_BATCH", 1024),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
