// models.rs - Parties, listings, orders and commission ledger rows

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::{BreakdownId, ListingId, MarketId, OrderId, OrderNumber, PartyId};

// ============================================================
// PARTIES & MARKETS
// ============================================================

/// Marketplace participant ("seller"). The owner and technical platform
/// accounts are parties too.
///
/// `balance` is a cache written by the balance aggregator; it is never a
/// source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub id: PartyId,
    pub name: String,
    /// Telegram chat id (or any notifier handle)
    pub notify_handle: Option<String>,
    pub balance: Decimal,
    /// Direct mentor, one hop only
    pub mentor: Option<PartyId>,
    /// Direct recruiter, one hop only
    pub recruiter: Option<PartyId>,
}

impl Party {
    pub fn new(id: PartyId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            notify_handle: None,
            balance: Decimal::ZERO,
            mentor: None,
            recruiter: None,
        }
    }

    pub fn with_mentor(mut self, mentor: PartyId) -> Self {
        self.mentor = Some(mentor);
        self
    }

    pub fn with_recruiter(mut self, recruiter: PartyId) -> Self {
        self.recruiter = Some(recruiter);
        self
    }

    pub fn with_notify_handle(mut self, handle: impl Into<String>) -> Self {
        self.notify_handle = Some(handle.into());
        self
    }
}

/// Game server / region a listing is scoped to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub server_name: String,
    pub game_name: String,
    pub region: String,
    pub fraction: String,
}

impl Market {
    /// "server - game" label used in notifications and relation listings
    pub fn label(&self) -> String {
        format!("{} - {}", self.server_name, self.game_name)
    }
}

// ============================================================
// LISTINGS
// ============================================================

/// Which market quote a listing follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingStrategy {
    Minimal,
    Balanced,
    Expensive,
    DoubleMinimal,
}

impl PricingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingStrategy::Minimal => "minimal",
            PricingStrategy::Balanced => "balanced",
            PricingStrategy::Expensive => "expensive",
            PricingStrategy::DoubleMinimal => "double_minimal",
        }
    }
}

impl fmt::Display for PricingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PricingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimal" => Ok(PricingStrategy::Minimal),
            "balanced" => Ok(PricingStrategy::Balanced),
            "expensive" => Ok(PricingStrategy::Expensive),
            "double_minimal" => Ok(PricingStrategy::DoubleMinimal),
            other => Err(format!("unknown pricing strategy: {}", other)),
        }
    }
}

/// A party's sale posting on one market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub party: PartyId,
    pub market: MarketId,
    pub strategy: PricingStrategy,
    pub stock: u32,
    /// Units held back for orders that are not delivered yet
    pub reserved_stock: u32,
    pub min_units_per_order: u32,
    pub active: bool,
    /// Set while any order on (party, market) awaits delivery; blocks stock edits
    pub has_open_order: bool,
    pub face_to_face: bool,
    pub mail_delivery: bool,
    pub auction_house: bool,
}

impl Listing {
    /// New listing with the defaults a freshly added server gets
    pub fn new(party: PartyId, market: MarketId) -> Self {
        Self {
            id: 0,
            party,
            market,
            strategy: PricingStrategy::Balanced,
            stock: 0,
            reserved_stock: 0,
            min_units_per_order: 0,
            active: false,
            has_open_order: false,
            face_to_face: true,
            mail_delivery: true,
            auction_house: true,
        }
    }
}

/// Audit row written whenever stock or the active flag changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockChange {
    pub party: PartyId,
    pub market: MarketId,
    pub stock: u32,
    pub active: bool,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================
// RATES
// ============================================================

/// Global commission percentages, loaded once per operation as a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionRates {
    pub exchange: Decimal,
    pub owner: Decimal,
    pub technical: Decimal,
    pub mentor: Decimal,
    pub renter_lvl1: Decimal,
    pub renter_lvl2: Decimal,
    pub recruiter: Decimal,
}

impl CommissionRates {
    /// Rate for one referral role
    pub fn rate_for(&self, service: ServiceType) -> Decimal {
        match service {
            ServiceType::Mentor => self.mentor,
            ServiceType::RenterLvl1 => self.renter_lvl1,
            ServiceType::RenterLvl2 => self.renter_lvl2,
            ServiceType::Recruiter => self.recruiter,
        }
    }
}

/// Rental service supplier on one market; a seller has at most one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenterAssignment {
    Lvl1(PartyId),
    Lvl2(PartyId),
}

impl RenterAssignment {
    pub fn provider(&self) -> PartyId {
        match self {
            RenterAssignment::Lvl1(id) | RenterAssignment::Lvl2(id) => *id,
        }
    }

    pub fn service_type(&self) -> ServiceType {
        match self {
            RenterAssignment::Lvl1(_) => ServiceType::RenterLvl1,
            RenterAssignment::Lvl2(_) => ServiceType::RenterLvl2,
        }
    }
}

/// Per-(party, market) interest rate and renter assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateAssignment {
    pub party: PartyId,
    pub market: MarketId,
    /// Seller's share of the post-exchange base, 1..=100
    pub interest_rate: u8,
    pub renter: Option<RenterAssignment>,
}

// ============================================================
// ORDERS
// ============================================================

/// Order flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    /// Sale on the external exchange (exchange commission applies)
    Sold,
    /// Peer-to-peer sale on the internal market
    Internal,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Sold => "sold",
            OrderKind::Internal => "internal",
        }
    }

    /// Cross-market sales pay the exchange first
    #[inline]
    pub fn exchange_commission_applies(&self) -> bool {
        matches!(self, OrderKind::Sold)
    }
}

/// Reference to an order of either flavor. Row ids are only unique within
/// one flavor, so the tag is part of the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrderRef {
    Sold(OrderId),
    Internal(OrderId),
}

impl OrderRef {
    pub fn new(kind: OrderKind, id: OrderId) -> Self {
        match kind {
            OrderKind::Sold => OrderRef::Sold(id),
            OrderKind::Internal => OrderRef::Internal(id),
        }
    }

    pub fn kind(&self) -> OrderKind {
        match self {
            OrderRef::Sold(_) => OrderKind::Sold,
            OrderRef::Internal(_) => OrderKind::Internal,
        }
    }

    pub fn id(&self) -> OrderId {
        match self {
            OrderRef::Sold(id) | OrderRef::Internal(id) => *id,
        }
    }
}

impl fmt::Display for OrderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind().as_str(), self.id())
    }
}

/// Order lifecycle status
///
/// ```text
/// DELIVERING → DELIVERED → COMPLETED
///     ↓
/// CANCEL_REQUESTED | CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Delivering,
    Delivered,
    Completed,
    CancelRequested,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Delivering => "DELIVERING",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::CancelRequested => "CANCEL_REQUESTED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// No further transitions possible
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::CancelRequested | OrderStatus::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Delivering, OrderStatus::Delivered)
                | (OrderStatus::Delivering, OrderStatus::CancelRequested)
                | (OrderStatus::Delivering, OrderStatus::Cancelled)
                | (OrderStatus::Delivered, OrderStatus::Completed)
        )
    }

    /// Statuses whose billed seller earnings count toward a seller balance
    #[inline]
    pub fn counts_for_seller(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivering | OrderStatus::Delivered | OrderStatus::Completed
        )
    }

    /// Statuses whose billed cuts count toward owner / technical balances
    #[inline]
    pub fn counts_for_platform(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Completed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DELIVERING" => Ok(OrderStatus::Delivering),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "CANCEL_REQUESTED" => Ok(OrderStatus::CancelRequested),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

/// How the goods reach the buyer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    FaceToFace,
    Mail,
    AuctionHouse,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::FaceToFace => "face_to_face",
            DeliveryMethod::Mail => "mail",
            DeliveryMethod::AuctionHouse => "auction_house",
        }
    }
}

impl FromStr for DeliveryMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "face_to_face" => Ok(DeliveryMethod::FaceToFace),
            "mail" => Ok(DeliveryMethod::Mail),
            "auction_house" => Ok(DeliveryMethod::AuctionHouse),
            other => Err(format!("unknown delivery method: {}", other)),
        }
    }
}

/// Who bought. The buyer decides the order flavor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Buyer {
    /// Exchange customer, known only by name
    External(String),
    /// Marketplace party buying on the internal market
    Party(PartyId),
}

impl Buyer {
    pub fn order_kind(&self) -> OrderKind {
        match self {
            Buyer::External(_) => OrderKind::Sold,
            Buyer::Party(_) => OrderKind::Internal,
        }
    }

    pub fn party(&self) -> Option<PartyId> {
        match self {
            Buyer::Party(id) => Some(*id),
            Buyer::External(_) => None,
        }
    }
}

/// Persisted order of either flavor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub market: MarketId,
    pub seller: PartyId,
    pub buyer: Buyer,
    pub character_name: String,
    pub delivery: DeliveryMethod,
    pub quantity: u32,
    /// Units the seller reports as delivered
    pub sent_quantity: u32,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    /// Proceeds after the exchange cut (equals total for internal orders)
    pub base_amount: Decimal,
    pub seller_net: Decimal,
    pub owner_cut: Decimal,
    pub technical_cut: Decimal,
    /// Interest rate applied when the order was split
    pub interest_rate: u8,
    pub status: OrderStatus,
    pub proof_location: Option<String>,
    pub proof_recorded: bool,
    pub billed: bool,
    pub paid_to_seller: bool,
    pub paid_to_owner: bool,
    pub paid_to_technical: bool,
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn kind(&self) -> OrderKind {
        self.buyer.order_kind()
    }

    #[inline]
    pub fn order_ref(&self) -> OrderRef {
        OrderRef::new(self.kind(), self.id)
    }

    /// Awaiting delivery: holds the listing's open-order flag
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Delivering && !self.proof_recorded
    }
}

// ============================================================
// COMMISSION BREAKDOWN (referral ledger)
// ============================================================

/// Referral role that earns a slice of a seller's proceeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Mentor,
    RenterLvl1,
    RenterLvl2,
    Recruiter,
}

impl ServiceType {
    pub const ALL: [ServiceType; 4] = [
        ServiceType::Mentor,
        ServiceType::RenterLvl1,
        ServiceType::RenterLvl2,
        ServiceType::Recruiter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Mentor => "mentor",
            ServiceType::RenterLvl1 => "renter_lvl1",
            ServiceType::RenterLvl2 => "renter_lvl2",
            ServiceType::Recruiter => "recruiter",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mentor" => Ok(ServiceType::Mentor),
            "renter_lvl1" => Ok(ServiceType::RenterLvl1),
            "renter_lvl2" => Ok(ServiceType::RenterLvl2),
            "recruiter" => Ok(ServiceType::Recruiter),
            other => Err(format!("unknown service type: {}", other)),
        }
    }
}

/// One ledgered payout owed to a referral-role holder for one order.
/// Append-only: only the two flags ever change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownRow {
    pub id: BreakdownId,
    pub order: OrderRef,
    pub party: PartyId,
    pub service_type: ServiceType,
    pub amount: Decimal,
    pub billed: bool,
    pub paid_out: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a breakdown row
#[derive(Debug, Clone, PartialEq)]
pub struct NewBreakdown {
    pub order: OrderRef,
    pub party: PartyId,
    pub service_type: ServiceType,
    pub amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use OrderStatus::*;
        assert!(Delivering.can_transition_to(Delivered));
        assert!(Delivering.can_transition_to(Cancelled));
        assert!(Delivering.can_transition_to(CancelRequested));
        assert!(Delivered.can_transition_to(Completed));

        assert!(!Delivering.can_transition_to(Completed));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Delivered));
        assert!(!CancelRequested.can_transition_to(Delivering));
        assert!(!Completed.can_transition_to(Delivered));
    }

    #[test]
    fn test_status_eligibility() {
        assert!(OrderStatus::Delivering.counts_for_seller());
        assert!(!OrderStatus::Delivering.counts_for_platform());
        assert!(OrderStatus::Delivered.counts_for_platform());
        assert!(OrderStatus::Completed.counts_for_platform());
        assert!(!OrderStatus::Cancelled.counts_for_seller());
        assert!(!OrderStatus::CancelRequested.counts_for_platform());
    }

    #[test]
    fn test_status_str_roundtrip() {
        for status in [
            OrderStatus::Delivering,
            OrderStatus::Delivered,
            OrderStatus::Completed,
            OrderStatus::CancelRequested,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("SHIPPED".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_ref_identity() {
        // Same row id, different flavors: distinct references
        assert_ne!(OrderRef::Sold(1), OrderRef::Internal(1));
        assert_eq!(OrderRef::new(OrderKind::Internal, 9), OrderRef::Internal(9));
        assert_eq!(OrderRef::Sold(4).to_string(), "sold:4");
    }

    #[test]
    fn test_buyer_decides_kind() {
        assert_eq!(Buyer::External("bob".into()).order_kind(), OrderKind::Sold);
        assert_eq!(Buyer::Party(3).order_kind(), OrderKind::Internal);
        assert!(OrderKind::Sold.exchange_commission_applies());
        assert!(!OrderKind::Internal.exchange_commission_applies());
    }

    #[test]
    fn test_renter_assignment() {
        let renter = RenterAssignment::Lvl2(12);
        assert_eq!(renter.provider(), 12);
        assert_eq!(renter.service_type(), ServiceType::RenterLvl2);
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            "double_minimal".parse::<PricingStrategy>().unwrap(),
            PricingStrategy::DoubleMinimal
        );
        assert!("mean10_lot".parse::<PricingStrategy>().is_err());
    }
}
