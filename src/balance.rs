//! Balance aggregation
//!
//! A party's balance is never stored as a running total. It is recomputed
//! from billed, unpaid order earnings and referral breakdown rows, minus what
//! the party spent on the internal market, then cached on the party row.
//!
//! ```text
//! balance = Σ unpaid order earnings + Σ unpaid breakdown rows − Σ internal purchases
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core_types::PartyId;
use crate::error::{MarketError, MarketResult};
use crate::models::{BreakdownRow, Order};
use crate::money;
use crate::store::StoreTx;

/// Which order column a party earns from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Seller,
    Owner,
    Technical,
}

/// Platform party ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformAccounts {
    pub owner: PartyId,
    pub technical: PartyId,
}

impl Default for PlatformAccounts {
    fn default() -> Self {
        Self {
            owner: 1,
            technical: 2,
        }
    }
}

impl PlatformAccounts {
    pub fn kind_of(&self, party: PartyId) -> AccountKind {
        if party == self.owner {
            AccountKind::Owner
        } else if party == self.technical {
            AccountKind::Technical
        } else {
            AccountKind::Seller
        }
    }
}

/// Components of one balance computation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceBreakdown {
    pub party: PartyId,
    pub kind: AccountKind,
    pub order_earnings: Decimal,
    pub referral_earnings: Decimal,
    pub internal_spend: Decimal,
    /// Rounded to 2 dp
    pub balance: Decimal,
}

/// Earnings an order still owes to an account of `kind`
pub fn unpaid_earning(order: &Order, kind: AccountKind) -> Option<Decimal> {
    if !order.billed {
        return None;
    }
    match kind {
        AccountKind::Seller if !order.paid_to_seller && order.status.counts_for_seller() => {
            Some(order.seller_net)
        }
        AccountKind::Owner if !order.paid_to_owner && order.status.counts_for_platform() => {
            Some(order.owner_cut)
        }
        AccountKind::Technical
            if !order.paid_to_technical && order.status.counts_for_platform() =>
        {
            Some(order.technical_cut)
        }
        _ => None,
    }
}

/// Pure aggregation over already-loaded rows.
///
/// `earning_orders` are the candidate orders for this account (the party's
/// own sales for a seller, every billed order for a platform account),
/// `purchases` are the internal orders the party bought.
pub fn aggregate(
    party: PartyId,
    kind: AccountKind,
    earning_orders: &[Order],
    breakdowns: &[BreakdownRow],
    purchases: &[Order],
) -> BalanceBreakdown {
    let order_earnings: Decimal = earning_orders
        .iter()
        .filter_map(|order| unpaid_earning(order, kind))
        .sum();
    let referral_earnings: Decimal = breakdowns
        .iter()
        .filter(|row| row.party == party && row.billed && !row.paid_out)
        .map(|row| row.amount)
        .sum();
    let internal_spend: Decimal = purchases.iter().map(|order| order.total_amount).sum();

    BalanceBreakdown {
        party,
        kind,
        order_earnings,
        referral_earnings,
        internal_spend,
        balance: money::round_balance(order_earnings + referral_earnings - internal_spend),
    }
}

/// Recompute without touching the cached balance
pub async fn compute_balance(
    tx: &mut dyn StoreTx,
    accounts: &PlatformAccounts,
    party: PartyId,
) -> MarketResult<BalanceBreakdown> {
    if tx.party(party).await?.is_none() {
        return Err(MarketError::not_found("Party", party));
    }

    let kind = accounts.kind_of(party);
    let earning_orders = match kind {
        AccountKind::Seller => tx.orders_by_seller(party).await?,
        AccountKind::Owner | AccountKind::Technical => tx.billed_orders().await?,
    };
    let breakdowns = tx.breakdowns_for_party(party).await?;
    let purchases = tx.orders_by_buyer(party).await?;

    Ok(aggregate(
        party,
        kind,
        &earning_orders,
        &breakdowns,
        &purchases,
    ))
}

/// Recompute, cache on the party row and return the 2 dp balance
pub async fn get_balance(
    tx: &mut dyn StoreTx,
    accounts: &PlatformAccounts,
    party: PartyId,
) -> MarketResult<Decimal> {
    let breakdown = compute_balance(tx, accounts, party).await?;
    tx.set_party_balance(party, breakdown.balance).await?;
    debug!(
        party,
        kind = ?breakdown.kind,
        orders = %breakdown.order_earnings,
        referrals = %breakdown.referral_earnings,
        spend = %breakdown.internal_spend,
        balance = %breakdown.balance,
        "Balance recomputed"
    );
    Ok(breakdown.balance)
}
