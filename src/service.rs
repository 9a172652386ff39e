//! Order Lifecycle Controller
//!
//! [`MarketService`] is the entry point the web layer calls. Every mutating
//! operation runs in one store transaction and queues its notifications in an
//! [`Outbox`] that is dispatched only after a successful commit.
//!
//! ```text
//! create_order ──► DELIVERING ──confirm_delivery──► DELIVERED ──complete_order──► COMPLETED
//!                      │
//!                      ├──request_cancel──► CANCEL_REQUESTED
//!                      └──cancel_order────► CANCELLED
//! ```

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::balance::{self, AccountKind, PlatformAccounts};
use crate::commission;
use crate::core_types::{ListingId, MarketId, PartyId};
use crate::error::{MarketError, MarketResult};
use crate::ledger::{self, PayoutTarget};
use crate::listing::{self, EnrichedListing, ListingField};
use crate::models::{
    BreakdownRow, Buyer, CommissionRates, DeliveryMethod, Listing, Market, Order, OrderKind,
    OrderRef, OrderStatus, Party, RateAssignment, StockChange,
};
use crate::money::{self, AMOUNT_SCALE};
use crate::notify::{NotificationDispatcher, Outbox};
use crate::order_number::OrderNumberGenerator;
use crate::pricing::PriceQuoteProvider;
use crate::rates::{self, ServiceRelations};
use crate::store::{Store, StoreTx};

/// Order request from the web layer
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub buyer: Buyer,
    pub seller: PartyId,
    pub market: MarketId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub delivery: DeliveryMethod,
    pub character_name: String,
}

impl NewOrder {
    fn validate(&self) -> MarketResult<()> {
        if self.quantity == 0 {
            return Err(MarketError::Validation("quantity must be positive".into()));
        }
        if self.unit_price <= Decimal::ZERO {
            return Err(MarketError::Validation(format!(
                "unit price must be positive, got {}",
                self.unit_price
            )));
        }
        money::validate_amount(self.unit_price, AMOUNT_SCALE)?;
        if self.character_name.trim().is_empty() {
            return Err(MarketError::Validation("character name is required".into()));
        }
        if self.buyer.party() == Some(self.seller) {
            return Err(MarketError::Validation(
                "a party cannot buy its own listing".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a delivery confirmation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusMessage {
    pub order: OrderRef,
    pub order_number: i64,
    pub status: OrderStatus,
    /// The order had already been confirmed; nothing changed
    pub already_confirmed: bool,
    /// Listing's open-order flag was cleared
    pub listing_released: bool,
    pub seller_balance: Decimal,
    pub message: String,
}

/// Outcome of a payout approval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoutSummary {
    pub party: PartyId,
    pub kind: AccountKind,
    pub orders_paid: usize,
    pub breakdowns_paid: u64,
    pub paid_amount: Decimal,
    /// Balance after the payout (2 dp)
    pub balance: Decimal,
}

/// Marketplace settlement service
pub struct MarketService {
    store: Arc<dyn Store>,
    quotes: Arc<dyn PriceQuoteProvider>,
    dispatcher: NotificationDispatcher,
    accounts: PlatformAccounts,
    order_numbers: Mutex<OrderNumberGenerator>,
}

impl MarketService {
    pub fn new(
        store: Arc<dyn Store>,
        quotes: Arc<dyn PriceQuoteProvider>,
        dispatcher: NotificationDispatcher,
        accounts: PlatformAccounts,
        node_id: u8,
    ) -> Self {
        info!(
            store = store.name(),
            quotes = quotes.name(),
            owner = accounts.owner,
            technical = accounts.technical,
            node_id,
            "Market service ready"
        );
        Self {
            store,
            quotes,
            dispatcher,
            accounts,
            order_numbers: Mutex::new(OrderNumberGenerator::new(node_id)),
        }
    }

    pub fn accounts(&self) -> &PlatformAccounts {
        &self.accounts
    }

    /// Commit, then hand the outbox to the dispatcher
    async fn commit(&self, tx: Box<dyn StoreTx>, outbox: Outbox) -> MarketResult<()> {
        tx.commit().await?;
        if !outbox.is_empty() {
            self.dispatcher.dispatch(outbox);
        }
        Ok(())
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// Place an order: split the proceeds, record referral rows, reserve
    /// stock and notify the seller.
    pub async fn create_order(&self, request: NewOrder) -> MarketResult<Order> {
        request.validate()?;

        let mut tx = self.store.begin().await?;
        let seller = load_party(tx.as_mut(), request.seller).await?;
        if let Buyer::Party(buyer) = request.buyer {
            load_party(tx.as_mut(), buyer).await?;
        }
        let market = load_market(tx.as_mut(), request.market).await?;

        let mut listing = tx
            .listing_for(request.seller, request.market)
            .await?
            .ok_or_else(|| {
                MarketError::not_found("Listing", format!("{}/{}", request.seller, request.market))
            })?;
        if !listing.active {
            return Err(MarketError::Validation(format!(
                "listing {} is not active",
                listing.id
            )));
        }
        if request.quantity < listing.min_units_per_order {
            return Err(MarketError::Validation(format!(
                "listing {} sells at least {} units per order, got {}",
                listing.id, listing.min_units_per_order, request.quantity
            )));
        }
        if listing.stock < request.quantity {
            return Err(MarketError::InsufficientStock {
                requested: request.quantity,
                available: listing.stock,
            });
        }

        let total_amount = request
            .unit_price
            .checked_mul(Decimal::from(request.quantity))
            .map(|v| money::round_to(v, AMOUNT_SCALE))
            .ok_or_else(|| MarketError::Validation("order total overflow".into()))?;

        let kind = request.buyer.order_kind();
        let (split, profile) = commission::calculate_for_seller(
            tx.as_mut(),
            request.seller,
            request.market,
            total_amount,
            kind.exchange_commission_applies(),
        )
        .await?;

        let order_number = self.order_numbers.lock().await.generate();
        let mut order = Order {
            id: 0,
            order_number,
            market: request.market,
            seller: request.seller,
            buyer: request.buyer,
            character_name: request.character_name.trim().to_string(),
            delivery: request.delivery,
            quantity: request.quantity,
            sent_quantity: 0,
            unit_price: request.unit_price,
            total_amount,
            base_amount: split.base_amount,
            seller_net: split.seller_net,
            owner_cut: split.owner_cut,
            technical_cut: split.technical_cut,
            interest_rate: split.interest_rate,
            status: OrderStatus::Delivering,
            proof_location: None,
            proof_recorded: false,
            billed: false,
            paid_to_seller: false,
            paid_to_owner: false,
            paid_to_technical: false,
            created_at: Utc::now(),
        };
        order.id = tx.insert_order(&order).await?;
        let order_ref = order.order_ref();

        ledger::record_referral_payouts(
            tx.as_mut(),
            &profile.chain,
            &split.referral_cuts,
            order_ref,
        )
        .await?;

        listing.stock -= request.quantity;
        listing.reserved_stock += request.quantity;
        listing.has_open_order = true;
        tx.update_listing(&listing).await?;
        record_stock(
            tx.as_mut(),
            &listing,
            format!("order {} reserved {}", order_number, request.quantity),
        )
        .await?;

        let mut outbox = Outbox::new();
        outbox.notify_party(&seller, new_order_text(&order, &market));

        self.commit(tx, outbox).await?;
        info!(
            %order_ref,
            order_number,
            seller = order.seller,
            market = order.market,
            kind = kind.as_str(),
            total = %order.total_amount,
            seller_net = %order.seller_net,
            "Order created"
        );
        Ok(order)
    }

    /// Record delivery proof, bill the order, recompute balances and release
    /// the listing when nothing else is pending on it.
    pub async fn confirm_delivery(
        &self,
        order_ref: OrderRef,
        proof_location: &str,
        quantity_delivered: u32,
    ) -> MarketResult<StatusMessage> {
        let proof_location = proof_location.trim();
        if proof_location.is_empty() {
            return Err(MarketError::Validation("proof location is required".into()));
        }

        let mut tx = self.store.begin().await?;
        let mut order = load_order(tx.as_mut(), order_ref).await?;

        if order.proof_recorded || order.billed {
            let seller_balance =
                balance::compute_balance(tx.as_mut(), &self.accounts, order.seller)
                    .await?
                    .balance;
            info!(%order_ref, "Delivery already confirmed");
            return Ok(StatusMessage {
                order: order_ref,
                order_number: order.order_number,
                status: order.status,
                already_confirmed: true,
                listing_released: false,
                seller_balance,
                message: format!("Order {} was already confirmed", order.order_number),
            });
        }

        ensure_transition(&order, OrderStatus::Delivered)?;
        if quantity_delivered == 0 || quantity_delivered > order.quantity {
            return Err(MarketError::Validation(format!(
                "delivered quantity must be within 1..={}, got {}",
                order.quantity, quantity_delivered
            )));
        }

        // Confirmations on one listing run one at a time from here on
        tx.listing_for(order.seller, order.market).await?;

        order.proof_location = Some(proof_location.to_string());
        order.proof_recorded = true;
        order.sent_quantity = quantity_delivered;
        order.billed = true;
        order.status = OrderStatus::Delivered;
        tx.update_order(&order).await?;
        ledger::mark_billed(tx.as_mut(), order_ref).await?;

        let seller_balance = self.refresh_balances(tx.as_mut(), order.seller).await?;
        let listing_released = release_listing(tx.as_mut(), &order).await?;

        let mut outbox = Outbox::new();
        if order.kind() == OrderKind::Internal
            && order.delivery == DeliveryMethod::Mail
            && let Buyer::Party(buyer_id) = order.buyer
        {
            match tx.party(buyer_id).await? {
                Some(buyer) => outbox.notify_party(
                    &buyer,
                    format!(
                        "Order {} was sent by mail to {}: {} units",
                        order.order_number, order.character_name, quantity_delivered
                    ),
                ),
                None => warn!(%order_ref, buyer = buyer_id, "Buyer missing, mail notice skipped"),
            }
        }

        self.commit(tx, outbox).await?;
        info!(
            %order_ref,
            order_number = order.order_number,
            sent = quantity_delivered,
            listing_released,
            seller_balance = %seller_balance,
            "Delivery confirmed"
        );
        Ok(StatusMessage {
            order: order_ref,
            order_number: order.order_number,
            status: order.status,
            already_confirmed: false,
            listing_released,
            seller_balance,
            message: format!("Order {} delivered", order.order_number),
        })
    }

    /// Delivered → Completed
    pub async fn complete_order(&self, order_ref: OrderRef) -> MarketResult<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = load_order(tx.as_mut(), order_ref).await?;
        ensure_transition(&order, OrderStatus::Completed)?;
        order.status = OrderStatus::Completed;
        tx.update_order(&order).await?;
        self.commit(tx, Outbox::new()).await?;
        info!(%order_ref, "Order completed");
        Ok(order)
    }

    /// Delivering → CancelRequested; settled later by an administrator
    pub async fn request_cancel(&self, order_ref: OrderRef) -> MarketResult<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = load_order(tx.as_mut(), order_ref).await?;
        ensure_transition(&order, OrderStatus::CancelRequested)?;
        order.status = OrderStatus::CancelRequested;
        tx.update_order(&order).await?;
        release_listing(tx.as_mut(), &order).await?;

        let mut outbox = Outbox::new();
        if let Some(seller) = tx.party(order.seller).await? {
            outbox.notify_party(
                &seller,
                format!("Cancellation requested for order {}", order.order_number),
            );
        }
        self.commit(tx, outbox).await?;
        info!(%order_ref, "Order cancellation requested");
        Ok(order)
    }

    /// Delivering → Cancelled; ordered units go back on the listing
    pub async fn cancel_order(&self, order_ref: OrderRef) -> MarketResult<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = load_order(tx.as_mut(), order_ref).await?;
        ensure_transition(&order, OrderStatus::Cancelled)?;
        order.status = OrderStatus::Cancelled;
        tx.update_order(&order).await?;

        if let Some(mut listing) = tx.listing_for(order.seller, order.market).await? {
            listing.stock += order.quantity;
            tx.update_listing(&listing).await?;
            record_stock(
                tx.as_mut(),
                &listing,
                format!("order {} cancelled", order.order_number),
            )
            .await?;
        }
        release_listing(tx.as_mut(), &order).await?;

        self.commit(tx, Outbox::new()).await?;
        info!(%order_ref, quantity = order.quantity, "Order cancelled");
        Ok(order)
    }

    /// Administrative correction: drop an order with its breakdown rows
    pub async fn delete_order(&self, order_ref: OrderRef) -> MarketResult<()> {
        let mut tx = self.store.begin().await?;
        let order = load_order(tx.as_mut(), order_ref).await?;

        let removed = ledger::remove_for_order(tx.as_mut(), order_ref).await?;
        tx.delete_order(order_ref).await?;
        if order.is_open() {
            release_listing(tx.as_mut(), &order).await?;
        }
        if order.billed {
            self.refresh_balances(tx.as_mut(), order.seller).await?;
        }

        self.commit(tx, Outbox::new()).await?;
        warn!(%order_ref, order_number = order.order_number, removed, "Order deleted");
        Ok(())
    }

    // ========================================================================
    // Balances & payouts
    // ========================================================================

    /// Recompute, cache and return a party's balance
    pub async fn get_balance(&self, party: PartyId) -> MarketResult<Decimal> {
        let mut tx = self.store.begin().await?;
        let balance = balance::get_balance(tx.as_mut(), &self.accounts, party).await?;
        self.commit(tx, Outbox::new()).await?;
        Ok(balance)
    }

    /// Mark everything the party is currently owed as paid out
    pub async fn approve_payout(&self, party: PartyId) -> MarketResult<PayoutSummary> {
        let mut tx = self.store.begin().await?;
        let recipient = load_party(tx.as_mut(), party).await?;
        let before = balance::compute_balance(tx.as_mut(), &self.accounts, party).await?;
        let kind = before.kind;

        let candidates = match kind {
            AccountKind::Seller => tx.orders_by_seller(party).await?,
            AccountKind::Owner | AccountKind::Technical => tx.billed_orders().await?,
        };
        let mut orders_paid = 0;
        for mut order in candidates {
            if balance::unpaid_earning(&order, kind).is_none() {
                continue;
            }
            match kind {
                AccountKind::Seller => order.paid_to_seller = true,
                AccountKind::Owner => order.paid_to_owner = true,
                AccountKind::Technical => order.paid_to_technical = true,
            }
            tx.update_order(&order).await?;
            orders_paid += 1;
        }
        let breakdowns_paid = ledger::mark_paid(tx.as_mut(), &PayoutTarget::Party(party)).await?;

        let paid_amount = before.order_earnings + before.referral_earnings;
        let balance = balance::get_balance(tx.as_mut(), &self.accounts, party).await?;

        let mut outbox = Outbox::new();
        if !paid_amount.is_zero() {
            outbox.notify_party(
                &recipient,
                format!("Payout approved: {}", money::format_amount(paid_amount, 2)),
            );
        }
        self.commit(tx, outbox).await?;
        info!(
            party,
            kind = ?kind,
            orders_paid,
            breakdowns_paid,
            paid = %paid_amount,
            balance = %balance,
            "Payout approved"
        );
        Ok(PayoutSummary {
            party,
            kind,
            orders_paid,
            breakdowns_paid,
            paid_amount,
            balance,
        })
    }

    /// Referral rows credited to a party ("my services")
    pub async fn my_services(&self, party: PartyId) -> MarketResult<Vec<BreakdownRow>> {
        let mut tx = self.store.begin().await?;
        load_party(tx.as_mut(), party).await?;
        ledger::breakdowns_for_party(tx.as_mut(), party).await
    }

    pub async fn service_relations(&self, party: PartyId) -> MarketResult<ServiceRelations> {
        let mut tx = self.store.begin().await?;
        rates::service_relations(tx.as_mut(), party).await
    }

    // ========================================================================
    // Listings
    // ========================================================================

    pub async fn get_listing_feed(&self, viewer: PartyId) -> MarketResult<Vec<EnrichedListing>> {
        let mut tx = self.store.begin().await?;
        listing::get_listing_feed(tx.as_mut(), self.quotes.as_ref(), viewer).await
    }

    pub async fn update_listing_field(
        &self,
        listing_id: ListingId,
        field: ListingField,
    ) -> MarketResult<Listing> {
        let mut tx = self.store.begin().await?;
        let listing = listing::update_listing_field(tx.as_mut(), listing_id, field).await?;
        self.commit(tx, Outbox::new()).await?;
        Ok(listing)
    }

    pub async fn add_listing(&self, party: PartyId, market: MarketId) -> MarketResult<Listing> {
        let mut tx = self.store.begin().await?;
        let listing = listing::add_listing(tx.as_mut(), party, market).await?;
        self.commit(tx, Outbox::new()).await?;
        Ok(listing)
    }

    pub async fn delete_listing(&self, listing_id: ListingId) -> MarketResult<()> {
        let mut tx = self.store.begin().await?;
        listing::delete_listing(tx.as_mut(), listing_id).await?;
        self.commit(tx, Outbox::new()).await
    }

    // ========================================================================
    // Administration
    // ========================================================================

    pub async fn register_party(&self, party: &Party) -> MarketResult<()> {
        let mut tx = self.store.begin().await?;
        tx.insert_party(party).await?;
        self.commit(tx, Outbox::new()).await
    }

    pub async fn register_market(&self, market: &Market) -> MarketResult<()> {
        let mut tx = self.store.begin().await?;
        tx.insert_market(market).await?;
        self.commit(tx, Outbox::new()).await
    }

    pub async fn set_commission_rates(&self, new_rates: &CommissionRates) -> MarketResult<()> {
        rates::validate_rates(new_rates)?;
        let mut tx = self.store.begin().await?;
        tx.set_commission_rates(new_rates).await?;
        self.commit(tx, Outbox::new()).await?;
        info!(rates = ?new_rates, "Commission rates updated");
        Ok(())
    }

    pub async fn set_rate_assignment(&self, assignment: &RateAssignment) -> MarketResult<()> {
        rates::validate_rate_assignment(assignment)?;
        let mut tx = self.store.begin().await?;
        load_party(tx.as_mut(), assignment.party).await?;
        load_market(tx.as_mut(), assignment.market).await?;
        if let Some(renter) = assignment.renter {
            load_party(tx.as_mut(), renter.provider()).await?;
        }
        tx.upsert_rate_assignment(assignment).await?;
        self.commit(tx, Outbox::new()).await?;
        info!(
            party = assignment.party,
            market = assignment.market,
            interest_rate = assignment.interest_rate,
            "Rate assignment updated"
        );
        Ok(())
    }

    /// Seller, owner and technical balances after a settlement change;
    /// returns the seller's
    async fn refresh_balances(&self, tx: &mut dyn StoreTx, seller: PartyId) -> MarketResult<Decimal> {
        let seller_balance = balance::get_balance(tx, &self.accounts, seller).await?;
        for platform in [self.accounts.owner, self.accounts.technical] {
            if platform == seller {
                continue;
            }
            balance::get_balance(tx, &self.accounts, platform)
                .await
                .map_err(|e| match e {
                    MarketError::NotFound { .. } => MarketError::Configuration(format!(
                        "platform account {} does not exist",
                        platform
                    )),
                    other => other,
                })?;
        }
        Ok(seller_balance)
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn load_party(tx: &mut dyn StoreTx, id: PartyId) -> MarketResult<Party> {
    tx.party(id)
        .await?
        .ok_or_else(|| MarketError::not_found("Party", id))
}

async fn load_market(tx: &mut dyn StoreTx, id: MarketId) -> MarketResult<Market> {
    tx.market(id)
        .await?
        .ok_or_else(|| MarketError::not_found("Market", id))
}

async fn load_order(tx: &mut dyn StoreTx, order: OrderRef) -> MarketResult<Order> {
    tx.order(order)
        .await?
        .ok_or_else(|| MarketError::not_found("Order", order))
}

fn ensure_transition(order: &Order, next: OrderStatus) -> MarketResult<()> {
    if order.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(MarketError::InvalidStateTransition {
            from: order.status.as_str(),
            to: next.as_str(),
        })
    }
}

async fn record_stock(
    tx: &mut dyn StoreTx,
    listing: &Listing,
    description: String,
) -> MarketResult<()> {
    tx.record_stock_change(&StockChange {
        party: listing.party,
        market: listing.market,
        stock: listing.stock,
        active: listing.active,
        description,
        created_at: Utc::now(),
    })
    .await
}

/// Clear the listing's open-order flag and reserved stock once no order on
/// (seller, market) awaits delivery. Returns true when released.
///
/// The listing row is locked before open orders are counted, so concurrent
/// confirmations on the same listing see each other's writes.
async fn release_listing(tx: &mut dyn StoreTx, order: &Order) -> MarketResult<bool> {
    let Some(mut listing) = tx.listing_for(order.seller, order.market).await? else {
        warn!(order = %order.order_ref(), "Listing gone, nothing to release");
        return Ok(false);
    };

    let pending = tx.open_orders(order.seller, order.market).await?;
    if !pending.is_empty() {
        info!(
            order = %order.order_ref(),
            pending = pending.len(),
            "Other orders still open, listing stays reserved"
        );
        return Ok(false);
    }

    listing.has_open_order = false;
    listing.reserved_stock = 0;
    tx.update_listing(&listing).await?;
    Ok(true)
}

fn new_order_text(order: &Order, market: &Market) -> String {
    let buyer = match &order.buyer {
        Buyer::External(name) => name.clone(),
        Buyer::Party(id) => format!("party {}", id),
    };
    format!(
        "New order {} on {}: {} units for {} to {} ({}), buyer {}",
        order.order_number,
        market.label(),
        order.quantity,
        money::format_amount(order.total_amount, AMOUNT_SCALE),
        order.character_name,
        order.delivery.as_str(),
        buyer
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{RecordingNotifier, notification_channel};
    use crate::pricing::StaticQuotes;
    use crate::store::MemoryStore;

    fn service(store: MemoryStore) -> MarketService {
        let (dispatcher, _worker) =
            notification_channel(16, Arc::new(RecordingNotifier::new()), Vec::new());
        MarketService::new(
            Arc::new(store),
            Arc::new(StaticQuotes::new()),
            dispatcher,
            PlatformAccounts::default(),
            1,
        )
    }

    #[test]
    fn test_new_order_validation() {
        let mut request = NewOrder {
            buyer: Buyer::Party(5),
            seller: 6,
            market: 1,
            quantity: 3,
            unit_price: Decimal::ONE,
            delivery: DeliveryMethod::Mail,
            character_name: "Jaina".into(),
        };
        assert!(request.validate().is_ok());

        request.quantity = 0;
        assert!(request.validate().is_err());
        request.quantity = 3;

        request.unit_price = Decimal::new(1, 4);
        assert!(request.validate().is_err());
        request.unit_price = Decimal::ONE;

        request.character_name = "  ".into();
        assert!(request.validate().is_err());
        request.character_name = "Jaina".into();

        request.buyer = Buyer::Party(6);
        assert!(request.validate().is_err());
    }

    #[tokio::test]
    async fn test_missing_references_are_not_found() {
        let svc = service(MemoryStore::new());
        let err = svc
            .confirm_delivery(OrderRef::Sold(42), "proofs/42.mp4", 1)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(svc.get_balance(7).await.unwrap_err().code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_rate_validation_before_write() {
        let store = MemoryStore::new();
        let svc = service(store.clone());
        let rates = CommissionRates {
            exchange: Decimal::from(7),
            owner: Decimal::from(70),
            technical: Decimal::from(40),
            mentor: Decimal::ZERO,
            renter_lvl1: Decimal::ZERO,
            renter_lvl2: Decimal::ZERO,
            recruiter: Decimal::ZERO,
        };
        assert!(svc.set_commission_rates(&rates).await.is_err());
        assert!(store.snapshot().await.rates.is_none());
    }
}
