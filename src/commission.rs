//! Commission calculation
//!
//! Pure functions turning a gross sale amount and a rate snapshot into the
//! split of the proceeds. All rates are plain percentages (`5` = 5%).
//!
//! ```text
//! base          = gross × (1 − exchange/100)      (cross-market sales only)
//! seller_net    = base × interest_rate/100
//! technical_cut = base × technical/100
//! owner_cut     = base × owner/100
//! role_cut      = base × role_rate/100            (per filled referral role)
//! ```
//!
//! Every split is taken from the exact base and rounded half-even: 3
//! decimals for the base and top-level splits, 6 for referral cuts.
//!
//! The seller's interest rate is configured independently of the
//! derived `seller_total_rate`, so the rates may claim more than the base.
//! The sale still goes through; only when the splits would exceed the
//! gross amount is `seller_net` cut back to what is left.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::core_types::{MarketId, PartyId};
use crate::error::{MarketError, MarketResult};
use crate::models::{CommissionRates, ServiceType};
use crate::money::{self, AMOUNT_SCALE, REFERRAL_SCALE};
use crate::rates::{self, ReferralChain, SellerProfile};
use crate::store::StoreTx;

/// Result of splitting one sale
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionSplit {
    pub gross_amount: Decimal,
    /// Proceeds after the exchange cut
    pub base_amount: Decimal,
    pub seller_net: Decimal,
    pub technical_cut: Decimal,
    pub owner_cut: Decimal,
    /// Only the roles the seller actually has
    pub referral_cuts: BTreeMap<ServiceType, Decimal>,
    /// Seller's interest rate used for `seller_net`
    pub interest_rate: u8,
}

impl CommissionSplit {
    pub fn referral_total(&self) -> Decimal {
        self.referral_cuts.values().copied().sum()
    }

    /// Everything paid out of the base
    pub fn distributed(&self) -> Decimal {
        self.seller_net + self.technical_cut + self.owner_cut + self.referral_total()
    }

    /// Part of the base nobody is credited with; negative when the rates
    /// claim more than the base
    pub fn undistributed(&self) -> Decimal {
        self.base_amount - self.distributed()
    }
}

/// Proceeds left after the exchange commission, unrounded
fn exact_base(
    rates: &CommissionRates,
    gross_amount: Decimal,
    exchange_commission_applies: bool,
) -> MarketResult<Decimal> {
    if exchange_commission_applies {
        Ok(money::remove_percent(gross_amount, rates.exchange)?)
    } else {
        Ok(gross_amount)
    }
}

/// Proceeds left after the exchange commission (3 dp)
pub fn exchange_base(
    rates: &CommissionRates,
    gross_amount: Decimal,
    exchange_commission_applies: bool,
) -> MarketResult<Decimal> {
    let base = exact_base(rates, gross_amount, exchange_commission_applies)?;
    Ok(money::round_to(base, AMOUNT_SCALE))
}

/// Cut of `base` for every filled referral role (6 dp)
pub fn referral_cuts(
    rates: &CommissionRates,
    chain: &ReferralChain,
    base_amount: Decimal,
) -> MarketResult<BTreeMap<ServiceType, Decimal>> {
    let mut cuts = BTreeMap::new();
    for (service, _holder) in chain.roles() {
        let cut = money::percent_of(base_amount, rates.rate_for(service))?;
        cuts.insert(service, money::round_to(cut, REFERRAL_SCALE));
    }
    Ok(cuts)
}

/// Split a sale.
///
/// A seller without a rate assignment arrives here with `interest_rate = 0`:
/// the sale still goes through and the seller earns nothing.
pub fn calculate_commissions(
    rates: &CommissionRates,
    profile: &SellerProfile,
    gross_amount: Decimal,
    exchange_commission_applies: bool,
) -> MarketResult<CommissionSplit> {
    if gross_amount <= Decimal::ZERO {
        return Err(MarketError::Validation(format!(
            "gross amount must be positive, got {}",
            gross_amount
        )));
    }

    let interest_rate = Decimal::from(profile.interest_rate);
    let total_rate = rates::seller_total_rate(rates, &profile.chain);
    if interest_rate > total_rate {
        warn!(
            party = profile.party,
            market = profile.market,
            interest_rate = profile.interest_rate,
            seller_total_rate = %total_rate,
            "Interest rate exceeds the seller's share left by commissions"
        );
    }

    let exact = exact_base(rates, gross_amount, exchange_commission_applies)?;
    let share = |rate: Decimal| -> MarketResult<Decimal> {
        Ok(money::round_to(money::percent_of(exact, rate)?, AMOUNT_SCALE))
    };

    let mut split = CommissionSplit {
        gross_amount,
        base_amount: money::round_to(exact, AMOUNT_SCALE),
        seller_net: share(interest_rate)?,
        technical_cut: share(rates.technical)?,
        owner_cut: share(rates.owner)?,
        referral_cuts: referral_cuts(rates, &profile.chain, exact)?,
        interest_rate: profile.interest_rate,
    };

    // The splits never exceed what the buyer paid
    let excess = split.distributed() - gross_amount;
    if excess > Decimal::ZERO {
        let capped = (split.seller_net - excess).max(Decimal::ZERO);
        warn!(
            party = profile.party,
            market = profile.market,
            gross = %gross_amount,
            seller_net = %split.seller_net,
            capped = %capped,
            "Splits exceed the gross amount, seller net reduced"
        );
        split.seller_net = money::truncate_to(capped, AMOUNT_SCALE);
    }
    Ok(split)
}

/// Load the rate snapshot and seller profile, then split the sale
pub async fn calculate_for_seller(
    tx: &mut dyn StoreTx,
    seller: PartyId,
    market: MarketId,
    gross_amount: Decimal,
    exchange_commission_applies: bool,
) -> MarketResult<(CommissionSplit, SellerProfile)> {
    let snapshot = rates::global_rates(tx).await?;
    let profile = rates::seller_profile(tx, seller, market).await?;
    let split = calculate_commissions(
        &snapshot,
        &profile,
        gross_amount,
        exchange_commission_applies,
    )?;
    Ok((split, profile))
}
