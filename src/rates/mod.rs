//! Daily exchange-rate cache and resolver
//!
//! Both engines value movements with the PTAX daily quote pair. The resolver
//! fetches quotes lazily per date, walking back up to a week when the
//! requested day has no quote (weekends, holidays), and caches the pair under
//! the originally requested date. The cache is owned by the resolver instance
//! rather than shared process-wide, so concurrent sessions stay isolated.

pub mod bcb;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::cambial::{Movement, MovementKind};
use crate::error::Result;

pub use bcb::BcbClient;

/// How many days before the requested date the resolver will search
const LOOKBACK_DAYS: i64 = 6;

/// Buy/sell quote pair for one calendar day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatePair {
    pub buy: Decimal,
    pub sell: Decimal,
}

/// Which side of the daily quote pair to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSide {
    Buy,
    Sell,
}

impl RateSide {
    /// Side used to value a movement: money sent abroad is bought at the
    /// market's sell quote, and sold back at the buy quote when withdrawn.
    pub fn for_kind(kind: MovementKind) -> Self {
        match kind {
            MovementKind::Inflow => RateSide::Sell,
            MovementKind::Outflow | MovementKind::HeldOver => RateSide::Buy,
        }
    }
}

/// Source of daily quote pairs
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetch the quote pair for one calendar day. `Ok(None)` means the
    /// provider has no data for that day, which is distinct from a transport
    /// or protocol failure.
    async fn fetch_daily(&self, date: NaiveDate) -> Result<Option<RatePair>>;
}

/// Per-session cache of daily rates, keyed by the ISO date they were
/// requested for (not the date the provider actually matched).
#[derive(Debug, Default)]
pub struct RateCache {
    buy: Mutex<HashMap<NaiveDate, Decimal>>,
    sell: Mutex<HashMap<NaiveDate, Decimal>>,
}

impl RateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the cached rate for a date on the given side.
    pub fn get(&self, date: NaiveDate, side: RateSide) -> Option<Decimal> {
        let map = match side {
            RateSide::Buy => self.buy.lock().unwrap(),
            RateSide::Sell => self.sell.lock().unwrap(),
        };
        map.get(&date).copied()
    }

    /// Whether a date has already been resolved.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.buy.lock().unwrap().contains_key(&date)
    }

    /// Store both sides of a quote pair under one date.
    pub fn insert_pair(&self, date: NaiveDate, pair: RatePair) {
        self.buy.lock().unwrap().insert(date, pair.buy);
        self.sell.lock().unwrap().insert(date, pair.sell);
    }

    /// Pre-seed the cache from previously persisted movements that carry a
    /// stored rate. The rate lands on the side implied by the movement kind;
    /// an already-cached date is left untouched. Returns how many rates were
    /// actually inserted.
    pub fn seed_from_movements(&self, movements: &[Movement]) -> usize {
        let mut seeded = 0usize;
        for movement in movements {
            let Some(rate) = movement.rate else { continue };
            let mut map = match RateSide::for_kind(movement.kind) {
                RateSide::Buy => self.buy.lock().unwrap(),
                RateSide::Sell => self.sell.lock().unwrap(),
            };
            if let Entry::Vacant(entry) = map.entry(movement.date) {
                entry.insert(rate);
                seeded += 1;
            }
        }
        if seeded > 0 {
            debug!("Seeded rate cache from {} stored movements", seeded);
        }
        seeded
    }

    /// Snapshot of the buy-side map, the shape the IR engine consumes.
    pub fn buy_snapshot(&self) -> HashMap<NaiveDate, Decimal> {
        self.buy.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.buy.lock().unwrap().clear();
        self.sell.lock().unwrap().clear();
        info!("Rate cache cleared");
    }

    pub fn len(&self) -> usize {
        self.buy.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fetch-and-cache resolver over a quote provider
pub struct RateResolver<P> {
    provider: P,
    cache: RateCache,
}

impl<P: RateProvider> RateResolver<P> {
    pub fn new(provider: P) -> Self {
        Self::with_cache(provider, RateCache::new())
    }

    /// Build a resolver around an existing (possibly pre-seeded) cache.
    pub fn with_cache(provider: P, cache: RateCache) -> Self {
        Self { provider, cache }
    }

    pub fn cache(&self) -> &RateCache {
        &self.cache
    }

    /// Ensure the cache holds a quote pair for `date`.
    ///
    /// A cache hit returns without touching the network, so repeated calls
    /// for the same date are cheap. On a miss the provider is queried for
    /// `date` and then one day earlier per attempt, covering the requested
    /// day plus the six before it; the first pair found is stored under the
    /// requested date. Exhausting the search leaves the date unresolved and
    /// only logs a warning; transport failures propagate immediately.
    pub async fn resolve(&self, date: NaiveDate) -> Result<()> {
        if self.cache.contains(date) {
            debug!("Rate for {} already cached", date);
            return Ok(());
        }

        let mut search = date;
        for _ in 0..=LOOKBACK_DAYS {
            match self.provider.fetch_daily(search).await? {
                Some(pair) => {
                    info!(
                        "Quote for {} resolved from {} (buy {}, sell {})",
                        date, search, pair.buy, pair.sell
                    );
                    self.cache.insert_pair(date, pair);
                    return Ok(());
                }
                None => {
                    search = search - Duration::days(1);
                }
            }
        }

        warn!(
            "No quote found for {} or the {} previous days",
            date, LOOKBACK_DAYS
        );
        Ok(())
    }
}
