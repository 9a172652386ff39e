//! In-memory store
//!
//! Transactions hold an owned lock on the shared state and work on a copy;
//! commit swaps the copy in. Transactions are therefore fully serialised,
//! which also rules out two confirmations racing on the same listing.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Store, StoreTx};
use crate::core_types::{BreakdownId, ListingId, MarketId, OrderId, PartyId};
use crate::error::{MarketError, MarketResult};
use crate::ledger::PayoutTarget;
use crate::models::{
    BreakdownRow, CommissionRates, Listing, Market, NewBreakdown, Order, OrderKind, OrderRef,
    Party, RateAssignment, StockChange,
};

/// Whole marketplace state
#[derive(Debug, Clone, Default)]
pub struct MarketState {
    pub rates: Option<CommissionRates>,
    pub parties: BTreeMap<PartyId, Party>,
    pub markets: BTreeMap<MarketId, Market>,
    pub listings: BTreeMap<ListingId, Listing>,
    pub rate_assignments: BTreeMap<(PartyId, MarketId), RateAssignment>,
    pub orders: BTreeMap<OrderRef, Order>,
    pub breakdowns: BTreeMap<BreakdownId, BreakdownRow>,
    pub stock_history: Vec<StockChange>,
    next_listing_id: ListingId,
    next_sold_id: OrderId,
    next_internal_id: OrderId,
    next_breakdown_id: BreakdownId,
}

impl MarketState {
    fn next_order_id(&mut self, kind: OrderKind) -> OrderId {
        let counter = match kind {
            OrderKind::Sold => &mut self.next_sold_id,
            OrderKind::Internal => &mut self.next_internal_id,
        };
        *counter += 1;
        *counter
    }
}

/// Serialised in-process store
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MarketState>>,
    fail_balance_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the committed state
    pub async fn snapshot(&self) -> MarketState {
        self.state.lock().await.clone()
    }

    /// Make every balance write fail (exercises rollback paths)
    pub fn set_fail_balance_writes(&self, fail: bool) {
        self.fail_balance_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> MarketResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            work,
            fail_balance_writes: self.fail_balance_writes.load(Ordering::SeqCst),
        }))
    }
}

/// Unit of work over a private copy of the state
pub struct MemoryTx {
    guard: OwnedMutexGuard<MarketState>,
    work: MarketState,
    fail_balance_writes: bool,
}

impl MemoryTx {
    fn breakdowns_where<F>(&self, pred: F) -> Vec<BreakdownRow>
    where
        F: Fn(&BreakdownRow) -> bool,
    {
        self.work
            .breakdowns
            .values()
            .filter(|row| pred(row))
            .cloned()
            .collect()
    }

    fn orders_where<F>(&self, pred: F) -> Vec<Order>
    where
        F: Fn(&Order) -> bool,
    {
        self.work
            .orders
            .values()
            .filter(|order| pred(order))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    // === Rates ===

    async fn commission_rates(&mut self) -> MarketResult<Option<CommissionRates>> {
        Ok(self.work.rates.clone())
    }

    async fn set_commission_rates(&mut self, rates: &CommissionRates) -> MarketResult<()> {
        self.work.rates = Some(rates.clone());
        Ok(())
    }

    async fn rate_assignment(
        &mut self,
        party: PartyId,
        market: MarketId,
    ) -> MarketResult<Option<RateAssignment>> {
        Ok(self.work.rate_assignments.get(&(party, market)).cloned())
    }

    async fn upsert_rate_assignment(&mut self, assignment: &RateAssignment) -> MarketResult<()> {
        self.work
            .rate_assignments
            .insert((assignment.party, assignment.market), assignment.clone());
        Ok(())
    }

    async fn assignments_rented_by(
        &mut self,
        provider: PartyId,
    ) -> MarketResult<Vec<RateAssignment>> {
        Ok(self
            .work
            .rate_assignments
            .values()
            .filter(|a| a.renter.is_some_and(|r| r.provider() == provider))
            .cloned()
            .collect())
    }

    // === Parties & Markets ===

    async fn party(&mut self, id: PartyId) -> MarketResult<Option<Party>> {
        Ok(self.work.parties.get(&id).cloned())
    }

    async fn insert_party(&mut self, party: &Party) -> MarketResult<()> {
        self.work.parties.insert(party.id, party.clone());
        Ok(())
    }

    async fn parties_mentored_by(&mut self, mentor: PartyId) -> MarketResult<Vec<Party>> {
        Ok(self
            .work
            .parties
            .values()
            .filter(|p| p.mentor == Some(mentor))
            .cloned()
            .collect())
    }

    async fn parties_recruited_by(&mut self, recruiter: PartyId) -> MarketResult<Vec<Party>> {
        Ok(self
            .work
            .parties
            .values()
            .filter(|p| p.recruiter == Some(recruiter))
            .cloned()
            .collect())
    }

    async fn set_party_balance(&mut self, id: PartyId, balance: Decimal) -> MarketResult<()> {
        if self.fail_balance_writes {
            return Err(MarketError::Database("balance write rejected".into()));
        }
        match self.work.parties.get_mut(&id) {
            Some(party) => {
                party.balance = balance;
                Ok(())
            }
            None => Err(MarketError::not_found("Party", id)),
        }
    }

    async fn market(&mut self, id: MarketId) -> MarketResult<Option<Market>> {
        Ok(self.work.markets.get(&id).cloned())
    }

    async fn insert_market(&mut self, market: &Market) -> MarketResult<()> {
        self.work.markets.insert(market.id, market.clone());
        Ok(())
    }

    // === Listings ===

    async fn listing(&mut self, id: ListingId) -> MarketResult<Option<Listing>> {
        Ok(self.work.listings.get(&id).cloned())
    }

    async fn listing_for(
        &mut self,
        party: PartyId,
        market: MarketId,
    ) -> MarketResult<Option<Listing>> {
        Ok(self
            .work
            .listings
            .values()
            .find(|l| l.party == party && l.market == market)
            .cloned())
    }

    async fn active_listings(&mut self) -> MarketResult<Vec<Listing>> {
        Ok(self
            .work
            .listings
            .values()
            .filter(|l| l.active)
            .cloned()
            .collect())
    }

    async fn insert_listing(&mut self, listing: &Listing) -> MarketResult<ListingId> {
        self.work.next_listing_id += 1;
        let id = self.work.next_listing_id;
        let mut row = listing.clone();
        row.id = id;
        self.work.listings.insert(id, row);
        Ok(id)
    }

    async fn update_listing(&mut self, listing: &Listing) -> MarketResult<()> {
        match self.work.listings.get_mut(&listing.id) {
            Some(row) => {
                *row = listing.clone();
                Ok(())
            }
            None => Err(MarketError::not_found("Listing", listing.id)),
        }
    }

    async fn delete_listing(&mut self, id: ListingId) -> MarketResult<()> {
        self.work.listings.remove(&id);
        Ok(())
    }

    async fn record_stock_change(&mut self, change: &StockChange) -> MarketResult<()> {
        self.work.stock_history.push(change.clone());
        Ok(())
    }

    // === Orders ===

    async fn insert_order(&mut self, order: &Order) -> MarketResult<OrderId> {
        if self
            .work
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(MarketError::Database(format!(
                "duplicate order number {}",
                order.order_number
            )));
        }
        let id = self.work.next_order_id(order.kind());
        let mut row = order.clone();
        row.id = id;
        self.work.orders.insert(row.order_ref(), row);
        Ok(id)
    }

    async fn order(&mut self, order: OrderRef) -> MarketResult<Option<Order>> {
        Ok(self.work.orders.get(&order).cloned())
    }

    async fn update_order(&mut self, order: &Order) -> MarketResult<()> {
        match self.work.orders.get_mut(&order.order_ref()) {
            Some(row) => {
                *row = order.clone();
                Ok(())
            }
            None => Err(MarketError::not_found("Order", order.order_ref())),
        }
    }

    async fn delete_order(&mut self, order: OrderRef) -> MarketResult<()> {
        self.work.orders.remove(&order);
        Ok(())
    }

    async fn orders_by_seller(&mut self, seller: PartyId) -> MarketResult<Vec<Order>> {
        Ok(self.orders_where(|o| o.seller == seller))
    }

    async fn billed_orders(&mut self) -> MarketResult<Vec<Order>> {
        Ok(self.orders_where(|o| o.billed))
    }

    async fn orders_by_buyer(&mut self, buyer: PartyId) -> MarketResult<Vec<Order>> {
        Ok(self.orders_where(|o| o.buyer.party() == Some(buyer)))
    }

    async fn open_orders(
        &mut self,
        seller: PartyId,
        market: MarketId,
    ) -> MarketResult<Vec<Order>> {
        Ok(self.orders_where(|o| o.seller == seller && o.market == market && o.is_open()))
    }

    // === Commission Breakdown ===

    async fn insert_breakdown(&mut self, row: &NewBreakdown) -> MarketResult<Option<BreakdownRow>> {
        let exists = self
            .work
            .breakdowns
            .values()
            .any(|b| b.order == row.order && b.service_type == row.service_type);
        if exists {
            return Ok(None);
        }
        self.work.next_breakdown_id += 1;
        let stored = BreakdownRow {
            id: self.work.next_breakdown_id,
            order: row.order,
            party: row.party,
            service_type: row.service_type,
            amount: row.amount,
            billed: false,
            paid_out: false,
            created_at: chrono::Utc::now(),
        };
        self.work.breakdowns.insert(stored.id, stored.clone());
        Ok(Some(stored))
    }

    async fn breakdowns_for_order(&mut self, order: OrderRef) -> MarketResult<Vec<BreakdownRow>> {
        Ok(self.breakdowns_where(|b| b.order == order))
    }

    async fn breakdowns_for_party(&mut self, party: PartyId) -> MarketResult<Vec<BreakdownRow>> {
        Ok(self.breakdowns_where(|b| b.party == party))
    }

    async fn mark_breakdowns_billed(&mut self, order: OrderRef) -> MarketResult<u64> {
        let mut changed = 0;
        for row in self.work.breakdowns.values_mut() {
            if row.order == order && !row.billed {
                row.billed = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn mark_breakdowns_paid(&mut self, target: &PayoutTarget) -> MarketResult<u64> {
        let mut changed = 0;
        for row in self.work.breakdowns.values_mut() {
            if row.billed && !row.paid_out && target.matches(row) {
                row.paid_out = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete_breakdowns_for_order(&mut self, order: OrderRef) -> MarketResult<u64> {
        let before = self.work.breakdowns.len();
        self.work.breakdowns.retain(|_, b| b.order != order);
        Ok((before - self.work.breakdowns.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> MarketResult<()> {
        let MemoryTx {
            mut guard, work, ..
        } = *self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_uncommitted_changes_are_discarded() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_party(&Party::new(1, "alice")).await.unwrap();
            // dropped without commit
        }
        assert!(store.snapshot().await.parties.is_empty());

        let mut tx = store.begin().await.unwrap();
        tx.insert_party(&Party::new(1, "alice")).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.snapshot().await.parties.len(), 1);
    }

    #[tokio::test]
    async fn test_breakdown_unique_per_order_and_service() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let row = NewBreakdown {
            order: OrderRef::Sold(1),
            party: 5,
            service_type: crate::models::ServiceType::Mentor,
            amount: Decimal::ONE,
        };
        assert!(tx.insert_breakdown(&row).await.unwrap().is_some());
        assert!(tx.insert_breakdown(&row).await.unwrap().is_none());

        // Same row id on the other flavor is a different order
        let internal = NewBreakdown {
            order: OrderRef::Internal(1),
            ..row
        };
        assert!(tx.insert_breakdown(&internal).await.unwrap().is_some());
        assert_eq!(tx.breakdowns_for_party(5).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_paid_requires_billed() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let row = NewBreakdown {
            order: OrderRef::Sold(1),
            party: 5,
            service_type: crate::models::ServiceType::Recruiter,
            amount: Decimal::ONE,
        };
        tx.insert_breakdown(&row).await.unwrap();

        let target = PayoutTarget::Party(5);
        assert_eq!(tx.mark_breakdowns_paid(&target).await.unwrap(), 0);
        assert_eq!(tx.mark_breakdowns_billed(OrderRef::Sold(1)).await.unwrap(), 1);
        assert_eq!(tx.mark_breakdowns_billed(OrderRef::Sold(1)).await.unwrap(), 0);
        assert_eq!(tx.mark_breakdowns_paid(&target).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_balance_write_failure_injection() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_party(&Party::new(1, "alice")).await.unwrap();
        tx.commit().await.unwrap();

        store.set_fail_balance_writes(true);
        let mut tx = store.begin().await.unwrap();
        let err = tx.set_party_balance(1, Decimal::TEN).await.unwrap_err();
        assert_eq!(err.code(), "DATABASE_ERROR");
    }
}
