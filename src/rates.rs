//! Rate Registry
//!
//! Global commission percentages, per-(seller, market) interest rates and the
//! referral relationships that divert part of a sale to another party.
//!
//! Referral relationships are plain optional ids resolved one hop deep: a
//! seller's own mentor, renter and recruiter. Nothing here walks further.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::core_types::{MarketId, PartyId};
use crate::error::{MarketError, MarketResult};
use crate::models::{CommissionRates, RateAssignment, RenterAssignment, ServiceType};
use crate::store::StoreTx;

/// Direct referral-role holders for one seller on one market
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReferralChain {
    pub mentor: Option<PartyId>,
    pub renter: Option<RenterAssignment>,
    pub recruiter: Option<PartyId>,
}

impl ReferralChain {
    /// Party filling `service`, if any
    pub fn holder(&self, service: ServiceType) -> Option<PartyId> {
        match service {
            ServiceType::Mentor => self.mentor,
            ServiceType::RenterLvl1 => match self.renter {
                Some(RenterAssignment::Lvl1(id)) => Some(id),
                _ => None,
            },
            ServiceType::RenterLvl2 => match self.renter {
                Some(RenterAssignment::Lvl2(id)) => Some(id),
                _ => None,
            },
            ServiceType::Recruiter => self.recruiter,
        }
    }

    /// Filled roles in ledger order
    pub fn roles(&self) -> impl Iterator<Item = (ServiceType, PartyId)> + '_ {
        ServiceType::ALL
            .into_iter()
            .filter_map(|service| self.holder(service).map(|id| (service, id)))
    }

    pub fn is_empty(&self) -> bool {
        self.mentor.is_none() && self.renter.is_none() && self.recruiter.is_none()
    }
}

/// Everything the calculator needs to know about a seller on one market
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SellerProfile {
    pub party: PartyId,
    pub market: MarketId,
    /// 0 when no rate assignment exists
    pub interest_rate: u8,
    pub chain: ReferralChain,
}

// ============================================================================
// Lookups
// ============================================================================

/// The active global rate record
pub async fn global_rates(tx: &mut dyn StoreTx) -> MarketResult<CommissionRates> {
    tx.commission_rates()
        .await?
        .ok_or_else(|| MarketError::Configuration("no global commission rates configured".into()))
}

/// Interest rate override for (party, market), `0` when unset
pub async fn interest_rate(
    tx: &mut dyn StoreTx,
    party: PartyId,
    market: MarketId,
) -> MarketResult<u8> {
    match tx.rate_assignment(party, market).await? {
        Some(assignment) => Ok(assignment.interest_rate),
        None => {
            warn!(
                party,
                market, "No interest rate configured, seller earns nothing on this market"
            );
            Ok(0)
        }
    }
}

/// Renter tier assigned on (party, market); `None` without an assignment row
pub async fn referral_assignment(
    tx: &mut dyn StoreTx,
    party: PartyId,
    market: MarketId,
) -> MarketResult<Option<RenterAssignment>> {
    Ok(tx
        .rate_assignment(party, market)
        .await?
        .and_then(|a| a.renter))
}

/// Direct mentor, renter and recruiter of a seller on a market
pub async fn referral_chain(
    tx: &mut dyn StoreTx,
    party: PartyId,
    market: MarketId,
) -> MarketResult<ReferralChain> {
    let seller = tx
        .party(party)
        .await?
        .ok_or_else(|| MarketError::not_found("Party", party))?;
    let renter = referral_assignment(tx, party, market).await?;

    Ok(ReferralChain {
        mentor: seller.mentor,
        renter,
        recruiter: seller.recruiter,
    })
}

/// Interest rate plus referral chain in one pass
pub async fn seller_profile(
    tx: &mut dyn StoreTx,
    party: PartyId,
    market: MarketId,
) -> MarketResult<SellerProfile> {
    let chain = referral_chain(tx, party, market).await?;
    let interest_rate = interest_rate(tx, party, market).await?;
    debug!(party, market, interest_rate, ?chain, "Seller profile loaded");

    Ok(SellerProfile {
        party,
        market,
        interest_rate,
        chain,
    })
}

// ============================================================================
// Derived rates
// ============================================================================

/// What is left for the seller after the platform and referral cuts:
/// `100 − owner − technical − Σ applicable role rates`.
///
/// Display and reconciliation only. Splitting always uses the seller's
/// configured interest rate, which is set independently and may differ.
pub fn seller_total_rate(rates: &CommissionRates, chain: &ReferralChain) -> Decimal {
    chain.roles().fold(
        Decimal::ONE_HUNDRED - rates.owner - rates.technical,
        |total, (service, _)| total - rates.rate_for(service),
    )
}

/// Reject rate records outside 0..=100 and platform cuts above 100%
pub fn validate_rates(rates: &CommissionRates) -> MarketResult<()> {
    let all = [
        ("exchange", rates.exchange),
        ("owner", rates.owner),
        ("technical", rates.technical),
        ("mentor", rates.mentor),
        ("renter_lvl1", rates.renter_lvl1),
        ("renter_lvl2", rates.renter_lvl2),
        ("recruiter", rates.recruiter),
    ];
    for (name, rate) in all {
        if rate.is_sign_negative() || rate > Decimal::ONE_HUNDRED {
            return Err(MarketError::Configuration(format!(
                "{} rate out of range: {}",
                name, rate
            )));
        }
    }
    if rates.owner + rates.technical > Decimal::ONE_HUNDRED {
        return Err(MarketError::Configuration(
            "owner and technical rates exceed 100%".into(),
        ));
    }
    Ok(())
}

/// Interest rate must be 1..=100 and a party cannot rent to itself
pub fn validate_rate_assignment(assignment: &RateAssignment) -> MarketResult<()> {
    if !(1..=100).contains(&assignment.interest_rate) {
        return Err(MarketError::Validation(format!(
            "interest rate must be within 1..=100, got {}",
            assignment.interest_rate
        )));
    }
    if let Some(renter) = assignment.renter
        && renter.provider() == assignment.party
    {
        return Err(MarketError::Validation(
            "a party cannot be its own renter".into(),
        ));
    }
    Ok(())
}

// ============================================================================
// Relations a party provides to others
// ============================================================================

/// One renter relationship supplied by a party
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RentalRelation {
    pub seller: String,
    pub market: String,
    pub tier: ServiceType,
}

/// Who a party mentors, recruited, and rents to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceRelations {
    pub mentees: Vec<String>,
    pub recruits: Vec<String>,
    pub rentals: Vec<RentalRelation>,
}

impl ServiceRelations {
    pub fn is_empty(&self) -> bool {
        self.mentees.is_empty() && self.recruits.is_empty() && self.rentals.is_empty()
    }
}

pub async fn service_relations(
    tx: &mut dyn StoreTx,
    party: PartyId,
) -> MarketResult<ServiceRelations> {
    if tx.party(party).await?.is_none() {
        return Err(MarketError::not_found("Party", party));
    }

    let mentees = tx
        .parties_mentored_by(party)
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();
    let recruits = tx
        .parties_recruited_by(party)
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();

    let mut rentals = Vec::new();
    for assignment in tx.assignments_rented_by(party).await? {
        let Some(renter) = assignment.renter else {
            continue;
        };
        let seller = match tx.party(assignment.party).await? {
            Some(p) => p.name,
            None => {
                warn!(party = assignment.party, "Rented seller missing, skipped");
                continue;
            }
        };
        let market = match tx.market(assignment.market).await? {
            Some(m) => m.label(),
            None => assignment.market.to_string(),
        };
        rentals.push(RentalRelation {
            seller,
            market,
            tier: renter.service_type(),
        });
    }

    Ok(ServiceRelations {
        mentees,
        recruits,
        rentals,
    })
}
