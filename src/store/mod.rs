//! Persistence layer
//!
//! Every multi-step settlement runs inside one [`StoreTx`]. A transaction is
//! only made visible by [`StoreTx::commit`]; dropping it rolls everything
//! back, so a failure halfway through an operation leaves no partial state
//! (e.g. `billed = true` with a stale balance is never committed).
//!
//! # Implementations
//!
//! - [`MemoryStore`]: serialised in-process store (tests, local runs)
//! - [`PgStore`]: PostgreSQL via `sqlx` transactions

pub mod memory;
pub mod postgres;

pub use memory::{MarketState, MemoryStore};
pub use postgres::PgStore;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::core_types::{ListingId, MarketId, OrderId, PartyId};
use crate::error::MarketResult;
use crate::ledger::PayoutTarget;
use crate::models::{
    BreakdownRow, CommissionRates, Listing, Market, NewBreakdown, Order, OrderRef, Party,
    RateAssignment, StockChange,
};

/// Transactional store entry point
#[async_trait]
pub trait Store: Send + Sync {
    /// Store name for logging
    fn name(&self) -> &'static str;

    /// Open a unit of work
    async fn begin(&self) -> MarketResult<Box<dyn StoreTx>>;
}

/// One unit of work against the marketplace data
#[async_trait]
pub trait StoreTx: Send {
    // === Rates ===
    async fn commission_rates(&mut self) -> MarketResult<Option<CommissionRates>>;
    async fn set_commission_rates(&mut self, rates: &CommissionRates) -> MarketResult<()>;
    async fn rate_assignment(
        &mut self,
        party: PartyId,
        market: MarketId,
    ) -> MarketResult<Option<RateAssignment>>;
    async fn upsert_rate_assignment(&mut self, assignment: &RateAssignment) -> MarketResult<()>;
    /// Assignments where `provider` is the renter (either tier)
    async fn assignments_rented_by(
        &mut self,
        provider: PartyId,
    ) -> MarketResult<Vec<RateAssignment>>;

    // === Parties & Markets ===
    async fn party(&mut self, id: PartyId) -> MarketResult<Option<Party>>;
    async fn insert_party(&mut self, party: &Party) -> MarketResult<()>;
    async fn parties_mentored_by(&mut self, mentor: PartyId) -> MarketResult<Vec<Party>>;
    async fn parties_recruited_by(&mut self, recruiter: PartyId) -> MarketResult<Vec<Party>>;
    async fn set_party_balance(&mut self, id: PartyId, balance: Decimal) -> MarketResult<()>;
    async fn market(&mut self, id: MarketId) -> MarketResult<Option<Market>>;
    async fn insert_market(&mut self, market: &Market) -> MarketResult<()>;

    // === Listings ===
    async fn listing(&mut self, id: ListingId) -> MarketResult<Option<Listing>>;
    async fn listing_for(
        &mut self,
        party: PartyId,
        market: MarketId,
    ) -> MarketResult<Option<Listing>>;
    async fn active_listings(&mut self) -> MarketResult<Vec<Listing>>;
    async fn insert_listing(&mut self, listing: &Listing) -> MarketResult<ListingId>;
    async fn update_listing(&mut self, listing: &Listing) -> MarketResult<()>;
    async fn delete_listing(&mut self, id: ListingId) -> MarketResult<()>;
    async fn record_stock_change(&mut self, change: &StockChange) -> MarketResult<()>;

    // === Orders ===
    /// Insert an order of the flavor given by its buyer; `order.id` is ignored
    async fn insert_order(&mut self, order: &Order) -> MarketResult<OrderId>;
    async fn order(&mut self, order: OrderRef) -> MarketResult<Option<Order>>;
    async fn update_order(&mut self, order: &Order) -> MarketResult<()>;
    async fn delete_order(&mut self, order: OrderRef) -> MarketResult<()>;
    /// Orders of both flavors sold by `seller`
    async fn orders_by_seller(&mut self, seller: PartyId) -> MarketResult<Vec<Order>>;
    /// Billed orders of both flavors, any seller
    async fn billed_orders(&mut self) -> MarketResult<Vec<Order>>;
    /// Internal-market orders bought by `buyer`
    async fn orders_by_buyer(&mut self, buyer: PartyId) -> MarketResult<Vec<Order>>;
    /// Orders of both flavors on (seller, market) still awaiting delivery
    async fn open_orders(&mut self, seller: PartyId, market: MarketId)
    -> MarketResult<Vec<Order>>;

    // === Commission Breakdown ===
    /// Insert a row; `None` when (order, service_type) already exists
    async fn insert_breakdown(&mut self, row: &NewBreakdown) -> MarketResult<Option<BreakdownRow>>;
    async fn breakdowns_for_order(&mut self, order: OrderRef) -> MarketResult<Vec<BreakdownRow>>;
    async fn breakdowns_for_party(&mut self, party: PartyId) -> MarketResult<Vec<BreakdownRow>>;
    /// Set `billed` on every row of the order; returns rows changed
    async fn mark_breakdowns_billed(&mut self, order: OrderRef) -> MarketResult<u64>;
    /// Set `paid_out` on billed, unpaid rows matching the target; returns rows changed
    async fn mark_breakdowns_paid(&mut self, target: &PayoutTarget) -> MarketResult<u64>;
    async fn delete_breakdowns_for_order(&mut self, order: OrderRef) -> MarketResult<u64>;

    /// Make every change of this unit of work visible
    async fn commit(self: Box<Self>) -> MarketResult<()>;
}
