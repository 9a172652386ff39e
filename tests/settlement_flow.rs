//! End-to-end settlement flows against the in-memory store

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;

use g2g_settlement::notify::{NotificationWorker, RecordingNotifier, notification_channel};
use g2g_settlement::pricing::StaticQuotes;
use g2g_settlement::{
    AccountKind, Buyer, CommissionRates, DeliveryMethod, ListingField, Market, MarketService,
    MemoryStore, NewOrder, Order, OrderStatus, Party, PlatformAccounts, PricingStrategy,
    RateAssignment, RenterAssignment, ServiceType,
};

const OWNER: i64 = 1;
const TECHNICAL: i64 = 2;
const MENTOR: i64 = 10;
const SELLER: i64 = 11;
const BUYER: i64 = 12;
const NO_RATES: i64 = 13;
const RECRUITER: i64 = 20;
const RENTER: i64 = 30;
const MARKET: i64 = 100;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

struct Harness {
    store: MemoryStore,
    service: MarketService,
    notifier: Arc<RecordingNotifier>,
    worker: NotificationWorker,
    quotes: Arc<StaticQuotes>,
}

async fn harness() -> Harness {
    let store = MemoryStore::new();
    let notifier = Arc::new(RecordingNotifier::new());
    let quotes = Arc::new(StaticQuotes::new());
    let (dispatcher, worker) = notification_channel(64, notifier.clone(), Vec::new());
    let service = MarketService::new(
        Arc::new(store.clone()),
        quotes.clone(),
        dispatcher,
        PlatformAccounts {
            owner: OWNER,
            technical: TECHNICAL,
        },
        3,
    );

    for party in [
        Party::new(OWNER, "owner"),
        Party::new(TECHNICAL, "technical"),
        Party::new(MENTOR, "mentor").with_notify_handle("10"),
        Party::new(RECRUITER, "recruiter"),
        Party::new(RENTER, "renter"),
        Party::new(SELLER, "alice")
            .with_mentor(MENTOR)
            .with_recruiter(RECRUITER)
            .with_notify_handle("11"),
        Party::new(BUYER, "bob").with_notify_handle("12"),
        Party::new(NO_RATES, "carol"),
    ] {
        service.register_party(&party).await.unwrap();
    }
    service
        .register_market(&Market {
            id: MARKET,
            server_name: "Firemaw".into(),
            game_name: "WoW Classic".into(),
            region: "EU".into(),
            fraction: "Horde".into(),
        })
        .await
        .unwrap();
    service
        .set_commission_rates(&CommissionRates {
            exchange: d("7"),
            owner: d("5"),
            technical: d("5"),
            mentor: d("3"),
            renter_lvl1: d("4"),
            renter_lvl2: d("2"),
            recruiter: d("1"),
        })
        .await
        .unwrap();
    service
        .set_rate_assignment(&RateAssignment {
            party: SELLER,
            market: MARKET,
            interest_rate: 75,
            renter: Some(RenterAssignment::Lvl1(RENTER)),
        })
        .await
        .unwrap();

    for seller in [SELLER, NO_RATES] {
        let listing = service.add_listing(seller, MARKET).await.unwrap();
        service
            .update_listing_field(listing.id, ListingField::Stock(5_000))
            .await
            .unwrap();
        service
            .update_listing_field(listing.id, ListingField::Active(true))
            .await
            .unwrap();
    }

    Harness {
        store,
        service,
        notifier,
        worker,
        quotes,
    }
}

fn external_order(seller: i64, quantity: u32) -> NewOrder {
    NewOrder {
        buyer: Buyer::External("buyer@example.com".into()),
        seller,
        market: MARKET,
        quantity,
        unit_price: Decimal::ONE,
        delivery: DeliveryMethod::FaceToFace,
        character_name: "Thrall".into(),
    }
}

async fn place(h: &Harness, request: NewOrder) -> Order {
    h.service.create_order(request).await.unwrap()
}

async fn listing_state(h: &Harness, seller: i64) -> g2g_settlement::Listing {
    h.store
        .snapshot()
        .await
        .listings
        .into_values()
        .find(|l| l.party == seller && l.market == MARKET)
        .unwrap()
}

#[tokio::test]
async fn test_reference_order_settles_every_party() {
    let h = harness().await;
    let order = place(&h, external_order(SELLER, 1_000)).await;

    assert_eq!(order.status, OrderStatus::Delivering);
    assert_eq!(order.total_amount, d("1000"));
    assert_eq!(order.base_amount, d("930"));
    assert_eq!(order.seller_net, d("697.5"));
    assert_eq!(order.owner_cut, d("46.5"));
    assert_eq!(order.technical_cut, d("46.5"));

    // Nothing is billed before delivery
    assert_eq!(h.service.get_balance(SELLER).await.unwrap(), Decimal::ZERO);
    assert_eq!(h.service.get_balance(MENTOR).await.unwrap(), Decimal::ZERO);

    let status = h
        .service
        .confirm_delivery(order.order_ref(), "proofs/1.mp4", 1_000)
        .await
        .unwrap();
    assert!(!status.already_confirmed);
    assert_eq!(status.status, OrderStatus::Delivered);
    assert_eq!(status.seller_balance, d("697.50"));

    let state = h.store.snapshot().await;
    assert_eq!(state.parties[&SELLER].balance, d("697.50"));
    assert_eq!(state.parties[&OWNER].balance, d("46.50"));
    assert_eq!(state.parties[&TECHNICAL].balance, d("46.50"));

    assert_eq!(h.service.get_balance(MENTOR).await.unwrap(), d("27.90"));
    assert_eq!(h.service.get_balance(RENTER).await.unwrap(), d("37.20"));
    assert_eq!(h.service.get_balance(RECRUITER).await.unwrap(), d("9.30"));

    let distributed: Decimal = order.seller_net
        + order.owner_cut
        + order.technical_cut
        + state.breakdowns.values().map(|row| row.amount).sum::<Decimal>();
    assert!(distributed <= order.base_amount);
    assert!(order.base_amount <= order.total_amount);
}

#[tokio::test]
async fn test_create_order_reserves_stock_and_records_referrals() {
    let h = harness().await;
    let order = place(&h, external_order(SELLER, 400)).await;

    let listing = listing_state(&h, SELLER).await;
    assert_eq!(listing.stock, 4_600);
    assert_eq!(listing.reserved_stock, 400);
    assert!(listing.has_open_order);

    let state = h.store.snapshot().await;
    let rows: Vec<_> = state
        .breakdowns
        .values()
        .filter(|row| row.order == order.order_ref())
        .collect();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| !row.billed && !row.paid_out));
    assert!(
        state
            .stock_history
            .iter()
            .any(|change| change.description.contains(&order.order_number.to_string()))
    );

    // Stock is locked while the order is open
    let err = h
        .service
        .update_listing_field(listing.id, ListingField::Stock(10))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_create_order_rejections() {
    let h = harness().await;

    let err = h
        .service
        .create_order(external_order(SELLER, 6_000))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_STOCK");

    let mut own = external_order(SELLER, 1);
    own.buyer = Buyer::Party(SELLER);
    assert_eq!(
        h.service.create_order(own).await.unwrap_err().code(),
        "VALIDATION_ERROR"
    );

    let mut unknown_buyer = external_order(SELLER, 1);
    unknown_buyer.buyer = Buyer::Party(999);
    assert_eq!(
        h.service.create_order(unknown_buyer).await.unwrap_err().code(),
        "NOT_FOUND"
    );

    let listing = listing_state(&h, SELLER).await;
    h.service
        .update_listing_field(listing.id, ListingField::Active(false))
        .await
        .unwrap();
    assert_eq!(
        h.service
            .create_order(external_order(SELLER, 1))
            .await
            .unwrap_err()
            .code(),
        "VALIDATION_ERROR"
    );

    // Nothing was persisted by the rejected requests
    assert!(h.store.snapshot().await.orders.is_empty());
}

#[tokio::test]
async fn test_missing_rate_assignment_still_sells() {
    let h = harness().await;
    let order = place(&h, external_order(NO_RATES, 100)).await;
    assert_eq!(order.interest_rate, 0);
    assert_eq!(order.seller_net, Decimal::ZERO);
    assert_eq!(order.owner_cut, d("4.65"));

    h.service
        .confirm_delivery(order.order_ref(), "proofs/2.png", 100)
        .await
        .unwrap();
    assert_eq!(h.service.get_balance(NO_RATES).await.unwrap(), Decimal::ZERO);
}

#[tokio::test]
async fn test_confirm_delivery_twice_is_idempotent() {
    let h = harness().await;
    let order = place(&h, external_order(SELLER, 1_000)).await;

    h.service
        .confirm_delivery(order.order_ref(), "proofs/3.mp4", 1_000)
        .await
        .unwrap();
    let first = h.store.snapshot().await;

    let again = h
        .service
        .confirm_delivery(order.order_ref(), "proofs/other.mp4", 1_000)
        .await
        .unwrap();
    assert!(again.already_confirmed);
    assert_eq!(again.seller_balance, d("697.50"));

    let second = h.store.snapshot().await;
    assert_eq!(first.orders, second.orders);
    assert_eq!(first.breakdowns, second.breakdowns);
    assert_eq!(
        second.orders[&order.order_ref()].proof_location.as_deref(),
        Some("proofs/3.mp4")
    );
}

#[tokio::test]
async fn test_failed_balance_write_rolls_back_confirmation() {
    let h = harness().await;
    let order = place(&h, external_order(SELLER, 1_000)).await;

    h.store.set_fail_balance_writes(true);
    let err = h
        .service
        .confirm_delivery(order.order_ref(), "proofs/4.mp4", 1_000)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "DATABASE_ERROR");

    let state = h.store.snapshot().await;
    let stored = &state.orders[&order.order_ref()];
    assert!(!stored.billed);
    assert!(!stored.proof_recorded);
    assert_eq!(stored.status, OrderStatus::Delivering);
    assert!(state.breakdowns.values().all(|row| !row.billed));
    assert!(listing_state(&h, SELLER).await.has_open_order);

    h.store.set_fail_balance_writes(false);
    h.service
        .confirm_delivery(order.order_ref(), "proofs/4.mp4", 1_000)
        .await
        .unwrap();
    assert_eq!(h.store.snapshot().await.parties[&SELLER].balance, d("697.50"));
}

#[tokio::test]
async fn test_listing_stays_reserved_while_another_order_is_open() {
    let h = harness().await;
    let first = place(&h, external_order(SELLER, 100)).await;
    let second = place(&h, external_order(SELLER, 200)).await;
    assert_eq!(listing_state(&h, SELLER).await.reserved_stock, 300);

    let status = h
        .service
        .confirm_delivery(first.order_ref(), "proofs/a.mp4", 100)
        .await
        .unwrap();
    assert!(!status.listing_released);
    assert!(listing_state(&h, SELLER).await.has_open_order);

    let status = h
        .service
        .confirm_delivery(second.order_ref(), "proofs/b.mp4", 200)
        .await
        .unwrap();
    assert!(status.listing_released);
    let listing = listing_state(&h, SELLER).await;
    assert!(!listing.has_open_order);
    assert_eq!(listing.reserved_stock, 0);
    assert_eq!(listing.stock, 4_700);
}

#[tokio::test]
async fn test_concurrent_confirmations_release_listing() {
    let h = harness().await;
    let first = place(&h, external_order(SELLER, 100)).await;
    let second = place(&h, external_order(SELLER, 200)).await;

    let (a, b) = tokio::join!(
        h.service
            .confirm_delivery(first.order_ref(), "proofs/a.mp4", 100),
        h.service
            .confirm_delivery(second.order_ref(), "proofs/b.mp4", 200),
    );
    let released = [a.unwrap(), b.unwrap()]
        .iter()
        .filter(|status| status.listing_released)
        .count();
    assert_eq!(released, 1);

    let listing = listing_state(&h, SELLER).await;
    assert!(!listing.has_open_order);
    assert_eq!(listing.reserved_stock, 0);
}

#[tokio::test]
async fn test_order_below_minimum_units_rejected() {
    let h = harness().await;
    let listing = listing_state(&h, SELLER).await;
    h.service
        .update_listing_field(listing.id, ListingField::MinUnitsPerOrder(500))
        .await
        .unwrap();

    let err = h
        .service
        .create_order(external_order(SELLER, 499))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert!(h.store.snapshot().await.orders.is_empty());
    assert_eq!(listing_state(&h, SELLER).await.stock, 5_000);

    let order = place(&h, external_order(SELLER, 500)).await;
    assert_eq!(order.quantity, 500);
}

#[tokio::test]
async fn test_internal_purchase_reduces_buyer_balance() {
    let mut h = harness().await;
    let order = place(
        &h,
        NewOrder {
            buyer: Buyer::Party(BUYER),
            seller: SELLER,
            market: MARKET,
            quantity: 100,
            unit_price: d("2"),
            delivery: DeliveryMethod::Mail,
            character_name: "Sylvanas".into(),
        },
    )
    .await;

    // No exchange commission on the internal market
    assert_eq!(order.base_amount, d("200"));
    assert_eq!(order.seller_net, d("150"));
    assert_eq!(h.service.get_balance(BUYER).await.unwrap(), d("-200.00"));

    h.service
        .confirm_delivery(order.order_ref(), "proofs/mail.png", 100)
        .await
        .unwrap();
    assert_eq!(h.service.get_balance(BUYER).await.unwrap(), d("-200.00"));
    assert_eq!(h.service.get_balance(SELLER).await.unwrap(), d("150.00"));

    h.worker.drain().await;
    let seller_messages = h.notifier.sent_to("11");
    assert_eq!(seller_messages.len(), 1);
    assert!(seller_messages[0].contains("Sylvanas"));
    let buyer_messages = h.notifier.sent_to("12");
    assert_eq!(buyer_messages.len(), 1);
    assert!(buyer_messages[0].contains("mail"));
}

#[tokio::test]
async fn test_get_balance_is_idempotent() {
    let h = harness().await;
    let order = place(&h, external_order(SELLER, 1_000)).await;
    h.service
        .confirm_delivery(order.order_ref(), "proofs/5.mp4", 1_000)
        .await
        .unwrap();

    let before = h.store.snapshot().await;
    let a = h.service.get_balance(MENTOR).await.unwrap();
    let b = h.service.get_balance(MENTOR).await.unwrap();
    assert_eq!(a, b);

    let after = h.store.snapshot().await;
    assert_eq!(before.breakdowns, after.breakdowns);
    assert_eq!(before.orders, after.orders);
}

#[tokio::test]
async fn test_notifications_sent_after_commit_only() {
    let mut h = harness().await;
    let rejected = h.service.create_order(external_order(SELLER, 9_999)).await;
    assert!(rejected.is_err());
    assert_eq!(h.worker.drain().await, 0);

    place(&h, external_order(SELLER, 10)).await;
    assert_eq!(h.worker.drain().await, 1);
    assert_eq!(h.notifier.sent_to("11").len(), 1);
    assert!(h.notifier.sent_to("10").is_empty());
}

#[tokio::test]
async fn test_status_transitions() {
    let h = harness().await;
    let order = place(&h, external_order(SELLER, 10)).await;

    let err = h.service.complete_order(order.order_ref()).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE_TRANSITION");

    h.service
        .confirm_delivery(order.order_ref(), "proofs/6.mp4", 10)
        .await
        .unwrap();
    let err = h.service.cancel_order(order.order_ref()).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE_TRANSITION");

    let completed = h.service.complete_order(order.order_ref()).await.unwrap();
    assert_eq!(completed.status, OrderStatus::Completed);
    // Completed orders keep counting until paid out
    assert_eq!(h.service.get_balance(SELLER).await.unwrap(), d("6.98"));
}

#[tokio::test]
async fn test_cancel_returns_stock_and_releases_listing() {
    let h = harness().await;
    let order = place(&h, external_order(SELLER, 250)).await;

    let cancelled = h.service.cancel_order(order.order_ref()).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let listing = listing_state(&h, SELLER).await;
    assert_eq!(listing.stock, 5_000);
    assert_eq!(listing.reserved_stock, 0);
    assert!(!listing.has_open_order);

    // Unbilled referral rows of a cancelled order never count
    assert_eq!(h.service.get_balance(MENTOR).await.unwrap(), Decimal::ZERO);

    let second = place(&h, external_order(SELLER, 5)).await;
    let requested = h.service.request_cancel(second.order_ref()).await.unwrap();
    assert_eq!(requested.status, OrderStatus::CancelRequested);
    assert!(!listing_state(&h, SELLER).await.has_open_order);
}

#[tokio::test]
async fn test_approve_payout_zeroes_earnings() {
    let mut h = harness().await;
    let order = place(&h, external_order(SELLER, 1_000)).await;
    h.service
        .confirm_delivery(order.order_ref(), "proofs/7.mp4", 1_000)
        .await
        .unwrap();

    let seller = h.service.approve_payout(SELLER).await.unwrap();
    assert_eq!(seller.kind, AccountKind::Seller);
    assert_eq!(seller.orders_paid, 1);
    assert_eq!(seller.paid_amount, d("697.5"));
    assert_eq!(seller.balance, Decimal::ZERO);

    let mentor = h.service.approve_payout(MENTOR).await.unwrap();
    assert_eq!(mentor.breakdowns_paid, 1);
    assert_eq!(mentor.balance, Decimal::ZERO);

    let owner = h.service.approve_payout(OWNER).await.unwrap();
    assert_eq!(owner.kind, AccountKind::Owner);
    assert_eq!(owner.paid_amount, d("46.5"));
    // Technical share is untouched by the owner payout
    assert_eq!(h.service.get_balance(TECHNICAL).await.unwrap(), d("46.50"));

    let again = h.service.approve_payout(SELLER).await.unwrap();
    assert_eq!(again.orders_paid, 0);

    h.worker.drain().await;
    assert!(h.notifier.sent_to("11").iter().any(|m| m.contains("Payout")));
    assert_eq!(h.service.my_services(MENTOR).await.unwrap().len(), 1);
    assert!(h.service.my_services(MENTOR).await.unwrap()[0].paid_out);
}

#[tokio::test]
async fn test_delete_order_removes_breakdowns() {
    let h = harness().await;
    let order = place(&h, external_order(SELLER, 100)).await;
    h.service.delete_order(order.order_ref()).await.unwrap();

    let state = h.store.snapshot().await;
    assert!(state.orders.is_empty());
    assert!(state.breakdowns.is_empty());
    assert!(!listing_state(&h, SELLER).await.has_open_order);

    let err = h.service.delete_order(order.order_ref()).await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_service_relations_and_my_services() {
    let h = harness().await;
    let order = place(&h, external_order(SELLER, 1_000)).await;

    let rows = h.service.my_services(RENTER).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].service_type, ServiceType::RenterLvl1);
    assert_eq!(rows[0].order, order.order_ref());
    assert_eq!(rows[0].amount, d("37.2"));

    let relations = h.service.service_relations(MENTOR).await.unwrap();
    assert_eq!(relations.mentees, vec!["alice".to_string()]);
    let relations = h.service.service_relations(RENTER).await.unwrap();
    assert_eq!(relations.rentals.len(), 1);
    assert_eq!(relations.rentals[0].tier, ServiceType::RenterLvl1);
}

#[tokio::test]
async fn test_listing_feed_hides_busy_listings() {
    let h = harness().await;
    h.quotes
        .set(MARKET, PricingStrategy::Balanced, d("2.5"));

    let feed = h.service.get_listing_feed(BUYER).await.unwrap();
    assert_eq!(feed.len(), 2);
    assert!(feed.iter().all(|row| row.quote == Some(d("2.5"))));
    assert!(feed.iter().all(|row| row.price_after_exchange == Some(d("2.325"))));

    place(&h, external_order(SELLER, 10)).await;
    let feed = h.service.get_listing_feed(BUYER).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].listing.party, NO_RATES);

    // Sellers do not see their own listings
    let feed = h.service.get_listing_feed(NO_RATES).await.unwrap();
    assert!(feed.is_empty());
}
