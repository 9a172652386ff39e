//! Market price quotes
//!
//! Listing prices follow an external quote per (market, strategy). The quote
//! source is a collaborator: it may answer with a price, with "unavailable",
//! or fail outright. Callers treat the last two the same way.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use cached::{Cached, TimedCache};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core_types::MarketId;
use crate::error::{MarketError, MarketResult};
use crate::models::PricingStrategy;

#[async_trait]
pub trait PriceQuoteProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Current quote; `Ok(None)` when the market has none
    async fn quote(
        &self,
        market: MarketId,
        strategy: PricingStrategy,
    ) -> MarketResult<Option<Decimal>>;
}

/// Fixed quote table
#[derive(Default)]
pub struct StaticQuotes {
    quotes: RwLock<HashMap<(MarketId, PricingStrategy), Decimal>>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl StaticQuotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(self, market: MarketId, strategy: PricingStrategy, price: Decimal) -> Self {
        self.set(market, strategy, price);
        self
    }

    pub fn set(&self, market: MarketId, strategy: PricingStrategy, price: Decimal) {
        if let Ok(mut quotes) = self.quotes.write() {
            quotes.insert((market, strategy), price);
        }
    }

    /// Make every lookup fail as an unreachable source would
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceQuoteProvider for StaticQuotes {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn quote(
        &self,
        market: MarketId,
        strategy: PricingStrategy,
    ) -> MarketResult<Option<Decimal>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(MarketError::ExternalService(
                "price source unreachable".into(),
            ));
        }
        let quotes = self
            .quotes
            .read()
            .map_err(|_| MarketError::ExternalService("quote table poisoned".into()))?;
        Ok(quotes.get(&(market, strategy)).copied())
    }
}

/// Remembers successful quotes for a fixed lifespan
pub struct CachedQuoteProvider<P> {
    inner: P,
    cache: Mutex<TimedCache<(MarketId, PricingStrategy), Decimal>>,
}

impl<P: PriceQuoteProvider> CachedQuoteProvider<P> {
    pub fn new(inner: P, ttl_secs: u64) -> Self {
        Self {
            inner,
            cache: Mutex::new(TimedCache::with_lifespan(ttl_secs)),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: PriceQuoteProvider> PriceQuoteProvider for CachedQuoteProvider<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn quote(
        &self,
        market: MarketId,
        strategy: PricingStrategy,
    ) -> MarketResult<Option<Decimal>> {
        let key = (market, strategy);
        if let Some(price) = self.cache.lock().await.cache_get(&key).copied() {
            return Ok(Some(price));
        }

        // Unavailable and failed lookups are not cached
        let quote = self.inner.quote(market, strategy).await?;
        if let Some(price) = quote {
            debug!(market, %strategy, %price, source = self.inner.name(), "Quote cached");
            self.cache.lock().await.cache_set(key, price);
        }
        Ok(quote)
    }
}
