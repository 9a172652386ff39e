//! Core type definitions for the marketplace
//!
//! These aliases are used throughout the codebase. Changing one here changes
//! it everywhere (stores included).

/// Party (seller) ID - sellers, referrers and the platform accounts alike
pub type PartyId = i64;

/// Market (game server / region) ID
pub type MarketId = i64;

/// Listing (offer) ID
pub type ListingId = i64;

/// Order ID - row id, unique within one order kind only
pub type OrderId = i64;

/// Globally unique, time-ordered order number shown to sellers and buyers
pub type OrderNumber = i64;

/// Commission breakdown row ID
pub type BreakdownId = i64;
