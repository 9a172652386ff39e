//! Listing surface
//!
//! Feed enrichment with live quotes and the owner-side edits of a listing.
//! Every stock or visibility change leaves a [`StockChange`] audit row.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::core_types::{ListingId, MarketId, PartyId};
use crate::error::{MarketError, MarketResult};
use crate::models::{CommissionRates, Listing, Market, PricingStrategy, StockChange};
use crate::money::{self, AMOUNT_SCALE};
use crate::pricing::PriceQuoteProvider;
use crate::rates;
use crate::store::StoreTx;

/// Listing as shown to a viewing party
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedListing {
    pub listing: Listing,
    pub market_label: String,
    pub seller_name: String,
    /// Raw quote for the listing's strategy; `None` when unavailable
    pub quote: Option<Decimal>,
    /// Quote minus the exchange commission
    pub price_after_exchange: Option<Decimal>,
    /// `quote × (viewer_rate − exchange) / 100`
    pub viewer_price: Option<Decimal>,
    pub viewer_interest_rate: u8,
    pub seller_interest_rate: u8,
    /// `price_after_exchange × stock`
    pub full_cost: Option<Decimal>,
}

/// Prices derived from one quote, all 3 dp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotePrices {
    pub price_after_exchange: Decimal,
    pub viewer_price: Decimal,
    pub full_cost: Decimal,
}

pub fn quote_prices(
    rates: &CommissionRates,
    quote: Decimal,
    viewer_interest_rate: u8,
    stock: u32,
) -> MarketResult<QuotePrices> {
    let price_after_exchange =
        money::round_to(money::remove_percent(quote, rates.exchange)?, AMOUNT_SCALE);
    let viewer_share = Decimal::from(viewer_interest_rate) - rates.exchange;
    let viewer_price = money::round_to(money::percent_of(quote, viewer_share)?, AMOUNT_SCALE);
    let full_cost = price_after_exchange
        .checked_mul(Decimal::from(stock))
        .map(|v| money::round_to(v, AMOUNT_SCALE))
        .ok_or_else(|| MarketError::Validation("full cost overflow".into()))?;

    Ok(QuotePrices {
        price_after_exchange,
        viewer_price,
        full_cost,
    })
}

async fn lookup_quote(
    quotes: &dyn PriceQuoteProvider,
    market: MarketId,
    strategy: PricingStrategy,
) -> Option<Decimal> {
    match quotes.quote(market, strategy).await {
        Ok(Some(price)) => Some(price),
        Ok(None) => {
            warn!(market, %strategy, "No quote for market, price unavailable");
            None
        }
        Err(e) => {
            warn!(market, %strategy, error = %e, source = quotes.name(), "Quote lookup failed");
            None
        }
    }
}

async fn enrich(
    tx: &mut dyn StoreTx,
    quotes: &dyn PriceQuoteProvider,
    rates: &CommissionRates,
    viewer: PartyId,
    listing: Listing,
) -> MarketResult<(Market, EnrichedListing)> {
    let market = tx
        .market(listing.market)
        .await?
        .ok_or_else(|| MarketError::not_found("Market", listing.market))?;
    let seller_name = tx
        .party(listing.party)
        .await?
        .map(|p| p.name)
        .ok_or_else(|| MarketError::not_found("Party", listing.party))?;
    let viewer_interest_rate = rates::interest_rate(tx, viewer, listing.market).await?;
    let seller_interest_rate = rates::interest_rate(tx, listing.party, listing.market).await?;

    let quote = lookup_quote(quotes, listing.market, listing.strategy).await;
    let prices = quote
        .map(|q| quote_prices(rates, q, viewer_interest_rate, listing.stock))
        .transpose()?;

    let enriched = EnrichedListing {
        market_label: market.label(),
        seller_name,
        quote,
        price_after_exchange: prices.map(|p| p.price_after_exchange),
        viewer_price: prices.map(|p| p.viewer_price),
        viewer_interest_rate,
        seller_interest_rate,
        full_cost: prices.map(|p| p.full_cost),
        listing,
    };
    Ok((market, enriched))
}

/// Active listings of other parties that have no order awaiting delivery,
/// ordered by server name.
///
/// A row that cannot be enriched is skipped with a warning; store failures
/// still fail the whole feed.
pub async fn get_listing_feed(
    tx: &mut dyn StoreTx,
    quotes: &dyn PriceQuoteProvider,
    viewer: PartyId,
) -> MarketResult<Vec<EnrichedListing>> {
    let snapshot = rates::global_rates(tx).await?;
    let candidates: Vec<Listing> = tx
        .active_listings()
        .await?
        .into_iter()
        .filter(|l| l.party != viewer && !l.has_open_order)
        .collect();

    let mut rows = Vec::with_capacity(candidates.len());
    for listing in candidates {
        let id = listing.id;
        match enrich(tx, quotes, &snapshot, viewer, listing).await {
            Ok(row) => rows.push(row),
            Err(e @ MarketError::Database(_)) => return Err(e),
            Err(e) => warn!(listing = id, error = %e, "Listing skipped in feed"),
        }
    }

    rows.sort_by(|(a, ea), (b, eb)| {
        a.server_name
            .cmp(&b.server_name)
            .then(ea.listing.id.cmp(&eb.listing.id))
    });
    Ok(rows.into_iter().map(|(_, row)| row).collect())
}

/// One editable listing field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingField {
    Stock(u32),
    Strategy(PricingStrategy),
    FaceToFace(bool),
    MailDelivery(bool),
    AuctionHouse(bool),
    MinUnitsPerOrder(u32),
    Active(bool),
}

async fn record_stock(tx: &mut dyn StoreTx, listing: &Listing, description: &str) -> MarketResult<()> {
    tx.record_stock_change(&StockChange {
        party: listing.party,
        market: listing.market,
        stock: listing.stock,
        active: listing.active,
        description: description.to_string(),
        created_at: Utc::now(),
    })
    .await
}

async fn load_listing(tx: &mut dyn StoreTx, id: ListingId) -> MarketResult<Listing> {
    tx.listing(id)
        .await?
        .ok_or_else(|| MarketError::not_found("Listing", id))
}

/// Apply one edit; returns the updated listing
pub async fn update_listing_field(
    tx: &mut dyn StoreTx,
    id: ListingId,
    field: ListingField,
) -> MarketResult<Listing> {
    let mut listing = load_listing(tx, id).await?;

    let audit = match field {
        ListingField::Stock(stock) => {
            if listing.has_open_order {
                return Err(MarketError::Validation(format!(
                    "stock of listing {} is locked while an order awaits delivery",
                    id
                )));
            }
            listing.stock = stock;
            Some("stock changed")
        }
        ListingField::Strategy(strategy) => {
            listing.strategy = strategy;
            None
        }
        ListingField::FaceToFace(on) => {
            listing.face_to_face = on;
            None
        }
        ListingField::MailDelivery(on) => {
            listing.mail_delivery = on;
            None
        }
        ListingField::AuctionHouse(on) => {
            listing.auction_house = on;
            None
        }
        ListingField::MinUnitsPerOrder(units) => {
            listing.min_units_per_order = units;
            None
        }
        ListingField::Active(active) => {
            listing.active = active;
            Some(if active { "listing resumed" } else { "listing paused" })
        }
    };

    tx.update_listing(&listing).await?;
    if let Some(description) = audit {
        record_stock(tx, &listing, description).await?;
    }
    info!(listing = id, ?field, "Listing updated");
    Ok(listing)
}

/// Put a party on a market with default settings (inactive, no stock)
pub async fn add_listing(
    tx: &mut dyn StoreTx,
    party: PartyId,
    market: MarketId,
) -> MarketResult<Listing> {
    if tx.party(party).await?.is_none() {
        return Err(MarketError::not_found("Party", party));
    }
    if tx.market(market).await?.is_none() {
        return Err(MarketError::not_found("Market", market));
    }
    if tx.listing_for(party, market).await?.is_some() {
        return Err(MarketError::Validation(format!(
            "party {} already lists market {}",
            party, market
        )));
    }

    let mut listing = Listing::new(party, market);
    listing.id = tx.insert_listing(&listing).await?;
    info!(listing = listing.id, party, market, "Listing added");
    Ok(listing)
}

/// Remove a listing, leaving an inactive audit row behind
pub async fn delete_listing(tx: &mut dyn StoreTx, id: ListingId) -> MarketResult<()> {
    let mut listing = load_listing(tx, id).await?;
    if listing.has_open_order {
        return Err(MarketError::Validation(format!(
            "listing {} has an order awaiting delivery",
            id
        )));
    }
    listing.active = false;
    record_stock(tx, &listing, "listing deleted").await?;
    tx.delete_listing(id).await?;
    info!(listing = id, "Listing deleted");
    Ok(())
}
