//! Ledger - Referral commission breakdown
//!
//! Records one append-only row per (order, referral role) when a sale is
//! split. Rows are never recomputed; they only move `billed → paid_out`, and
//! disappear solely with their parent order.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core_types::{BreakdownId, PartyId};
use crate::error::MarketResult;
use crate::models::{BreakdownRow, NewBreakdown, OrderRef, ServiceType};
use crate::rates::ReferralChain;
use crate::store::StoreTx;

/// Selects breakdown rows for payout approval
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutTarget {
    /// Every row credited to one party
    Party(PartyId),
    /// Specific rows
    Rows(Vec<BreakdownId>),
}

impl PayoutTarget {
    pub fn matches(&self, row: &BreakdownRow) -> bool {
        match self {
            PayoutTarget::Party(party) => row.party == *party,
            PayoutTarget::Rows(ids) => ids.contains(&row.id),
        }
    }
}

/// What `record_referral_payouts` did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordOutcome {
    pub recorded: Vec<BreakdownRow>,
    /// Roles with a cut that produced no row
    pub skipped: Vec<ServiceType>,
}

impl RecordOutcome {
    pub fn recorded_total(&self) -> Decimal {
        self.recorded.iter().map(|row| row.amount).sum()
    }
}

/// Write one breakdown row per referral role with a nonzero cut.
///
/// Best effort per role: a holder that no longer exists is logged and
/// skipped, and a role already recorded for this order is left untouched.
/// Store failures still abort the surrounding transaction.
pub async fn record_referral_payouts(
    tx: &mut dyn StoreTx,
    chain: &ReferralChain,
    cuts: &BTreeMap<ServiceType, Decimal>,
    order: OrderRef,
) -> MarketResult<RecordOutcome> {
    let mut outcome = RecordOutcome::default();

    for (&service, &amount) in cuts {
        if amount.is_zero() {
            continue;
        }
        let Some(party) = chain.holder(service) else {
            warn!(%order, service = %service, "Cut without a role holder, skipped");
            outcome.skipped.push(service);
            continue;
        };
        if tx.party(party).await?.is_none() {
            warn!(%order, service = %service, party, "Role holder not found, skipped");
            outcome.skipped.push(service);
            continue;
        }

        let row = NewBreakdown {
            order,
            party,
            service_type: service,
            amount,
        };
        match tx.insert_breakdown(&row).await? {
            Some(stored) => {
                debug!(%order, service = %service, party, %amount, "Breakdown recorded");
                outcome.recorded.push(stored);
            }
            None => {
                debug!(%order, service = %service, "Breakdown already recorded");
                outcome.skipped.push(service);
            }
        }
    }

    if !outcome.recorded.is_empty() {
        info!(
            %order,
            rows = outcome.recorded.len(),
            total = %outcome.recorded_total(),
            "Referral payouts recorded"
        );
    }
    Ok(outcome)
}

/// Flag every row of the order as billed; repeat calls change nothing
pub async fn mark_billed(tx: &mut dyn StoreTx, order: OrderRef) -> MarketResult<u64> {
    let changed = tx.mark_breakdowns_billed(order).await?;
    debug!(%order, changed, "Breakdowns billed");
    Ok(changed)
}

/// Flag billed, unpaid rows matching `target` as paid out
pub async fn mark_paid(tx: &mut dyn StoreTx, target: &PayoutTarget) -> MarketResult<u64> {
    let changed = tx.mark_breakdowns_paid(target).await?;
    info!(?target, changed, "Breakdowns paid out");
    Ok(changed)
}

/// Every row credited to a party, oldest first
pub async fn breakdowns_for_party(
    tx: &mut dyn StoreTx,
    party: PartyId,
) -> MarketResult<Vec<BreakdownRow>> {
    let mut rows = tx.breakdowns_for_party(party).await?;
    rows.sort_by_key(|row| (row.created_at, row.id));
    Ok(rows)
}

/// Drop the rows of a deleted order
pub async fn remove_for_order(tx: &mut dyn StoreTx, order: OrderRef) -> MarketResult<u64> {
    let removed = tx.delete_breakdowns_for_order(order).await?;
    if removed > 0 {
        warn!(%order, removed, "Breakdown rows removed with their order");
    }
    Ok(removed)
}
