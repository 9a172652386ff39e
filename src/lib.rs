//! g2g_settlement - Commission & Balance Engine
//!
//! Settlement core of a multi-seller game-currency marketplace: splits every
//! order between seller, platform and referrers, keeps the commission ledger
//! and reconciles balances.
//!
//! # Modules
//!
//! - [`core_types`] - Id aliases (PartyId, MarketId, etc.)
//! - [`money`] - Decimal scales, percent math, rounding
//! - [`models`] - Parties, markets, listings, orders, breakdown rows
//! - [`rates`] - Rate configuration and referral chains
//! - [`commission`] - Commission split for one order
//! - [`ledger`] - Referral breakdown rows (record, bill, pay)
//! - [`balance`] - Balance reconciliation
//! - [`listing`] - Listing feed and listing edits
//! - [`service`] - Order lifecycle controller
//! - [`store`] - Transactional persistence (memory, PostgreSQL)
//! - [`notify`] - Post-commit notifications
//! - [`pricing`] - Market price quotes

// Core types - must be first!
pub mod core_types;

pub mod error;
pub mod models;
pub mod money;
pub mod order_number;

// Settlement components
pub mod balance;
pub mod commission;
pub mod ledger;
pub mod listing;
pub mod rates;
pub mod service;

// Collaborators
pub mod db;
pub mod notify;
pub mod pricing;
pub mod store;

// Runtime
pub mod config;
pub mod logging;

// Convenient re-exports at crate root
pub use balance::{AccountKind, BalanceBreakdown, PlatformAccounts};
pub use commission::CommissionSplit;
pub use core_types::{BreakdownId, ListingId, MarketId, OrderId, OrderNumber, PartyId};
pub use error::{MarketError, MarketResult};
pub use listing::{EnrichedListing, ListingField};
pub use models::{
    BreakdownRow, Buyer, CommissionRates, DeliveryMethod, Listing, Market, Order, OrderKind,
    OrderRef, OrderStatus, Party, PricingStrategy, RateAssignment, RenterAssignment, ServiceType,
};
pub use service::{MarketService, NewOrder, PayoutSummary, StatusMessage};
pub use store::{MemoryStore, PgStore, Store, StoreTx};
