//! Matching buy orders against listings.
//!
//! For each matchable buy order, the API works out how much of the order is still uncommitted and buys that quantity
//! from compatible listings, cheapest first. A listing is only compatible if seller and buyer have granted each other
//! `for_sale_browse` access.
//!
//! Each purchase is executed through [`PurchaseManagement::create_purchase`], which decrements the listing and
//! inserts the purchase in one transaction, and re-checks the buy order's committed quantity under the write lock.
//! Two overlapping passes therefore cannot sell the same units twice, nor push an order past its desired quantity.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{BuyOrder, ForSaleItem, NewPurchase, PurchaseTransaction, ServiceType},
    events::EventProducers,
    helpers::ContractKey,
    trade_api::{errors::SyncError, notification_api::describe_purchase, sync_objects::FulfillSummary},
    traits::{
        BuyOrderManagement,
        ListingManagement,
        NameLookup,
        NotificationOutbox,
        PermissionManagement,
        PurchaseManagement,
        StoreError,
    },
};

pub struct AutoFulfillApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for AutoFulfillApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AutoFulfillApi")
    }
}

impl<B> AutoFulfillApi<B>
where B: BuyOrderManagement
        + ListingManagement
        + PermissionManagement
        + PurchaseManagement
        + NotificationOutbox
        + NameLookup
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub async fn sync_all(&self) -> Result<FulfillSummary, SyncError> {
        let orders = self.db.fetch_matchable_buy_orders().await?;
        debug!("🤝 Matching {} buy orders", orders.len());
        Ok(self.fulfill_orders(&orders).await)
    }

    pub async fn sync_for_user(&self, buyer_user_id: i64) -> Result<FulfillSummary, SyncError> {
        let orders = self.db.fetch_matchable_buy_orders_for_user(buyer_user_id).await?;
        debug!("🤝 Matching {} buy orders for user {buyer_user_id}", orders.len());
        Ok(self.fulfill_orders(&orders).await)
    }

    async fn fulfill_orders(&self, orders: &[BuyOrder]) -> FulfillSummary {
        let mut summary = FulfillSummary::default();
        for order in orders {
            summary.orders += 1;
            match self.fulfill_order(order).await {
                Ok(OrderOutcome::Saturated) => summary.saturated += 1,
                Ok(OrderOutcome::Purchased(purchases)) => {
                    summary.purchases += purchases.len();
                    summary.quantity += purchases.iter().map(|p| p.quantity_purchased).sum::<i64>();
                },
                Err(e) => {
                    warn!("🤝 Could not match buy order #{}: {e}", order.id);
                    summary.failed += 1;
                },
            }
        }
        info!("🤝 Auto-fulfill pass complete: {summary}");
        summary
    }

    /// Buys as much of the order's remaining quantity as compatible listings allow.
    pub async fn fulfill_order(&self, order: &BuyOrder) -> Result<OrderOutcome, SyncError> {
        if !order.is_matchable() {
            trace!("🤝 Buy order #{} is not matchable", order.id);
            return Ok(OrderOutcome::Purchased(Vec::new()));
        }
        let pending = self.db.pending_quantity_for_buy_order(order.id).await?;
        let mut remaining = order.quantity_desired - pending;
        if remaining <= 0 {
            trace!("🤝 Buy order #{} is fully committed ({pending}/{})", order.id, order.quantity_desired);
            return Ok(OrderOutcome::Saturated);
        }
        let candidates = self.db.fetch_matching_listings(order).await?;
        let mut purchases = Vec::new();
        for item in candidates {
            if remaining <= 0 {
                break;
            }
            if !self.mutually_trusted(item.user_id, order.buyer_user_id).await {
                continue;
            }
            let quantity = remaining.min(item.quantity_available);
            if quantity <= 0 {
                continue;
            }
            let purchase = NewPurchase::auto_fulfill(order, &item, quantity, ContractKey::generate());
            match self.db.create_purchase(purchase).await {
                Ok(purchase) => {
                    info!(
                        "🤝 Buy order #{} bought {quantity} of type {} from listing #{} at {}",
                        order.id, order.type_id, item.id, purchase.price_per_unit
                    );
                    remaining -= quantity;
                    self.notify(&purchase, &item).await;
                    purchases.push(purchase);
                },
                Err(e @ StoreError::BuyOrderOverCommitted { .. }) => {
                    warn!("🤝 {e}. Another pass got there first.");
                    break;
                },
                Err(e) => {
                    warn!("🤝 Purchase of {quantity} from listing #{} for buy order #{} failed: {e}", item.id, order.id);
                },
            }
        }
        Ok(OrderOutcome::Purchased(purchases))
    }

    /// Both directions of `for_sale_browse` must be granted. Lookup failures count as a denial.
    async fn mutually_trusted(&self, seller_user_id: i64, buyer_user_id: i64) -> bool {
        let service = ServiceType::ForSaleBrowse;
        for (granting, receiving) in [(seller_user_id, buyer_user_id), (buyer_user_id, seller_user_id)] {
            match self.db.check_permission(granting, receiving, service).await {
                Ok(true) => {},
                Ok(false) => {
                    trace!("🤝 User {granting} has not granted {service} to user {receiving}");
                    return false;
                },
                Err(e) => {
                    warn!("🤝 Permission check {granting} -> {receiving} failed. Treating it as a denial. {e}");
                    return false;
                },
            }
        }
        true
    }

    /// Enqueues the purchase notification without waiting. If that succeeds the outbox entry is closed, otherwise it
    /// is left for the outbox worker.
    async fn notify(&self, purchase: &PurchaseTransaction, item: &ForSaleItem) {
        let event = describe_purchase(&self.db, purchase.clone(), Some(item.location_id)).await;
        if !self.producers.try_publish_purchase_created(&event) {
            debug!("🤝 Notification for purchase #{} deferred to the outbox", purchase.id);
            return;
        }
        if let Err(e) = self.db.mark_purchase_dispatched(purchase.id).await {
            warn!("🤝 Could not close the outbox entry of purchase #{}. It may be delivered twice. {e}", purchase.id);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    /// The order's desired quantity was already fully committed by earlier purchases.
    Saturated,
    /// The purchases made for the order in this pass. May be empty.
    Purchased(Vec<PurchaseTransaction>),
}

impl OrderOutcome {
    pub fn purchases(&self) -> &[PurchaseTransaction] {
        match self {
            OrderOutcome::Saturated => &[],
            OrderOutcome::Purchased(p) => p.as_slice(),
        }
    }
}

#[cfg(test)]
mod test {
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        db_types::PurchaseStatus,
        events::{EventProducer, PurchaseCreatedEvent},
        test_utils::{
            prepare_env::new_test_db,
            seed::{self, HOME_STATION, PYERITE, TRITANIUM},
        },
        SqliteDatabase,
    };

    const SELLER: i64 = 1;
    const BUYER: i64 = 2;
    const OTHER_SELLER: i64 = 3;

    async fn setup() -> SqliteDatabase {
        let db = new_test_db().await;
        seed::user(&db, SELLER, "Seller").await;
        seed::user(&db, BUYER, "Buyer").await;
        seed::user(&db, OTHER_SELLER, "Other seller").await;
        db
    }

    fn api(db: &SqliteDatabase) -> AutoFulfillApi<SqliteDatabase> {
        AutoFulfillApi::new(db.clone(), EventProducers::default())
    }

    fn listening_api(
        db: &SqliteDatabase,
        capacity: usize,
    ) -> (AutoFulfillApi<SqliteDatabase>, mpsc::Receiver<PurchaseCreatedEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let producers = EventProducers {
            purchase_created_producer: vec![EventProducer::new(sender)],
            ..Default::default()
        };
        (AutoFulfillApi::new(db.clone(), producers), receiver)
    }

    #[tokio::test]
    async fn buys_the_remaining_quantity() {
        let db = setup().await;
        seed::trust(&db, SELLER, BUYER).await;
        let listing = seed::listing(&db, SELLER, TRITANIUM, 500, 8.0).await;
        let order = seed::buy_order(&db, BUYER, TRITANIUM, 100, 8.0, 8.0).await;

        let outcome = api(&db).fulfill_order(&order).await.unwrap();
        let purchases = outcome.purchases();
        assert_eq!(purchases.len(), 1);
        let purchase = &purchases[0];
        assert_eq!(purchase.quantity_purchased, 100);
        assert_eq!(purchase.price_per_unit, 8.0.into());
        assert_eq!(purchase.total_price, 800.0.into());
        assert_eq!(purchase.status, PurchaseStatus::Pending);
        assert_eq!(purchase.buyer_user_id, BUYER);
        assert_eq!(purchase.seller_user_id, SELLER);
        assert_eq!(purchase.buy_order_id, Some(order.id));
        assert!(purchase.is_auto_fulfilled);
        assert!(purchase.contract_key.as_deref().is_some_and(|k| k.starts_with("PT-")));
        let listing = db.fetch_listing(listing.id).await.unwrap().unwrap();
        assert_eq!(listing.quantity_available, 400);

        let again = api(&db).fulfill_order(&order).await.unwrap();
        assert_eq!(again, OrderOutcome::Saturated);
        assert_eq!(db.fetch_listing(listing.id).await.unwrap().unwrap().quantity_available, 400);
    }

    #[tokio::test]
    async fn pending_purchases_count_against_the_order() {
        let db = setup().await;
        seed::trust(&db, SELLER, BUYER).await;
        let listing = seed::listing(&db, SELLER, TRITANIUM, 500, 8.0).await;
        let order = seed::buy_order(&db, BUYER, TRITANIUM, 100, 8.0, 8.0).await;
        let earlier = NewPurchase::auto_fulfill(&order, &listing, 60, ContractKey::generate());
        db.create_purchase(earlier).await.unwrap();

        let outcome = api(&db).fulfill_order(&order).await.unwrap();
        assert_eq!(outcome.purchases().len(), 1);
        assert_eq!(outcome.purchases()[0].quantity_purchased, 40);
        assert_eq!(db.pending_quantity_for_buy_order(order.id).await.unwrap(), 100);
        assert_eq!(db.fetch_listing(listing.id).await.unwrap().unwrap().quantity_available, 400);
    }

    #[tokio::test]
    async fn completed_purchases_free_up_the_order() {
        let db = setup().await;
        seed::trust(&db, SELLER, BUYER).await;
        let listing = seed::listing(&db, SELLER, TRITANIUM, 500, 8.0).await;
        let order = seed::buy_order(&db, BUYER, TRITANIUM, 100, 8.0, 8.0).await;
        let earlier = db.create_purchase(NewPurchase::auto_fulfill(&order, &listing, 100, ContractKey::generate())).await;
        let earlier = earlier.unwrap();
        seed::contract_created_with_key(&db, earlier.id, "DELIVERY-1").await;
        db.complete_with_contract_id(earlier.id, 42).await.unwrap();

        let outcome = api(&db).fulfill_order(&order).await.unwrap();
        assert_eq!(outcome.purchases()[0].quantity_purchased, 100);
    }

    #[tokio::test]
    async fn cheapest_listings_are_used_first() {
        let db = setup().await;
        seed::trust(&db, SELLER, BUYER).await;
        seed::trust(&db, OTHER_SELLER, BUYER).await;
        let dear = seed::listing(&db, SELLER, TRITANIUM, 100, 8.0).await;
        let cheap = seed::listing(&db, OTHER_SELLER, TRITANIUM, 30, 7.0).await;
        let too_dear = seed::listing(&db, OTHER_SELLER, TRITANIUM, 500, 11.0).await;
        let order = seed::buy_order(&db, BUYER, TRITANIUM, 100, 5.0, 10.0).await;

        let outcome = api(&db).fulfill_order(&order).await.unwrap();
        let bought = outcome.purchases().iter().map(|p| (p.for_sale_item_id, p.quantity_purchased)).collect::<Vec<_>>();
        assert_eq!(bought, vec![(cheap.id, 30), (dear.id, 70)]);
        assert_eq!(db.fetch_listing(cheap.id).await.unwrap().unwrap().quantity_available, 0);
        assert_eq!(db.fetch_listing(dear.id).await.unwrap().unwrap().quantity_available, 30);
        assert_eq!(db.fetch_listing(too_dear.id).await.unwrap().unwrap().quantity_available, 500);
    }

    #[tokio::test]
    async fn permission_must_be_granted_both_ways() {
        let db = setup().await;
        seed::listing(&db, SELLER, TRITANIUM, 500, 8.0).await;
        seed::listing(&db, OTHER_SELLER, TRITANIUM, 500, 8.0).await;
        db.set_permission(SELLER, BUYER, ServiceType::ForSaleBrowse, true).await.unwrap();
        db.set_permission(BUYER, OTHER_SELLER, ServiceType::ForSaleBrowse, true).await.unwrap();
        let order = seed::buy_order(&db, BUYER, TRITANIUM, 100, 8.0, 8.0).await;

        let outcome = api(&db).fulfill_order(&order).await.unwrap();
        assert_eq!(outcome, OrderOutcome::Purchased(Vec::new()));
        assert_eq!(db.pending_quantity_for_buy_order(order.id).await.unwrap(), 0);

        db.set_permission(BUYER, SELLER, ServiceType::ForSaleBrowse, true).await.unwrap();
        let outcome = api(&db).fulfill_order(&order).await.unwrap();
        assert_eq!(outcome.purchases().len(), 1);
        assert_eq!(outcome.purchases()[0].seller_user_id, SELLER);
    }

    #[tokio::test]
    async fn own_listings_are_never_bought() {
        let db = setup().await;
        seed::trust(&db, SELLER, BUYER).await;
        seed::listing(&db, BUYER, TRITANIUM, 500, 6.0).await;
        let listing = seed::listing(&db, SELLER, TRITANIUM, 500, 8.0).await;
        let order = seed::buy_order(&db, BUYER, TRITANIUM, 100, 5.0, 10.0).await;

        let outcome = api(&db).fulfill_order(&order).await.unwrap();
        assert_eq!(outcome.purchases().len(), 1);
        assert_eq!(outcome.purchases()[0].for_sale_item_id, listing.id);
    }

    #[tokio::test]
    async fn short_listing_is_emptied() {
        let db = setup().await;
        seed::trust(&db, SELLER, BUYER).await;
        let listing = seed::listing(&db, SELLER, TRITANIUM, 40, 8.0).await;
        let order = seed::buy_order(&db, BUYER, TRITANIUM, 100, 8.0, 8.0).await;

        let outcome = api(&db).fulfill_order(&order).await.unwrap();
        assert_eq!(outcome.purchases()[0].quantity_purchased, 40);
        let listing = db.fetch_listing(listing.id).await.unwrap().unwrap();
        assert_eq!(listing.quantity_available, 0);

        // Nothing left to buy, but the order is not saturated either
        let outcome = api(&db).fulfill_order(&order).await.unwrap();
        assert_eq!(outcome, OrderOutcome::Purchased(Vec::new()));
    }

    #[tokio::test]
    async fn unmatchable_orders_are_skipped() {
        let db = setup().await;
        seed::trust(&db, SELLER, BUYER).await;
        seed::listing(&db, SELLER, TRITANIUM, 500, 8.0).await;
        let free = seed::buy_order(&db, BUYER, TRITANIUM, 100, 0.0, 0.0).await;
        let inactive = seed::buy_order(&db, BUYER, TRITANIUM, 100, 8.0, 8.0).await;
        db.deactivate_buy_order(inactive.id).await.unwrap();
        let inactive = db.fetch_buy_order(inactive.id).await.unwrap().unwrap();

        assert_eq!(api(&db).fulfill_order(&free).await.unwrap(), OrderOutcome::Purchased(Vec::new()));
        assert_eq!(api(&db).fulfill_order(&inactive).await.unwrap(), OrderOutcome::Purchased(Vec::new()));
        let summary = api(&db).sync_all().await.unwrap();
        assert_eq!(summary.orders, 0);
    }

    #[tokio::test]
    async fn sync_all_summarises_the_pass() {
        let db = setup().await;
        seed::trust(&db, SELLER, BUYER).await;
        seed::listing(&db, SELLER, TRITANIUM, 500, 8.0).await;
        seed::listing(&db, SELLER, PYERITE, 10, 12.0).await;
        seed::buy_order(&db, BUYER, TRITANIUM, 100, 8.0, 8.0).await;
        seed::buy_order(&db, BUYER, PYERITE, 25, 10.0, 12.0).await;

        let summary = api(&db).sync_all().await.unwrap();
        assert_eq!(summary.orders, 2);
        assert_eq!(summary.purchases, 2);
        assert_eq!(summary.quantity, 110);
        assert_eq!(summary.failed, 0);

        let summary = api(&db).sync_for_user(BUYER).await.unwrap();
        assert_eq!(summary.saturated, 1);
        assert_eq!(summary.purchases, 0);
    }

    #[tokio::test]
    async fn purchases_are_announced() {
        let db = setup().await;
        seed::trust(&db, SELLER, BUYER).await;
        seed::item_type(&db, TRITANIUM, "Tritanium").await;
        seed::location(&db, HOME_STATION, "Jita IV - Moon 4").await;
        seed::listing(&db, SELLER, TRITANIUM, 500, 8.0).await;
        let order = seed::buy_order(&db, BUYER, TRITANIUM, 100, 8.0, 8.0).await;
        let (api, mut events) = listening_api(&db, 10);

        let outcome = api.fulfill_order(&order).await.unwrap();
        let event = events.try_recv().unwrap();
        assert_eq!(event.purchase, outcome.purchases()[0]);
        assert_eq!(event.seller_name.as_deref(), Some("Seller"));
        assert_eq!(event.buyer_name.as_deref(), Some("Buyer"));
        assert_eq!(event.type_name.as_deref(), Some("Tritanium"));
        assert_eq!(event.location_name.as_deref(), Some("Jita IV - Moon 4"));
        assert!(db.fetch_undispatched(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn undelivered_announcements_stay_in_the_outbox() {
        let db = setup().await;
        seed::trust(&db, SELLER, BUYER).await;
        seed::trust(&db, OTHER_SELLER, BUYER).await;
        seed::listing(&db, SELLER, TRITANIUM, 50, 7.0).await;
        seed::listing(&db, OTHER_SELLER, TRITANIUM, 50, 8.0).await;
        let order = seed::buy_order(&db, BUYER, TRITANIUM, 100, 5.0, 10.0).await;
        let (api, mut events) = listening_api(&db, 1);

        let outcome = api.fulfill_order(&order).await.unwrap();
        assert_eq!(outcome.purchases().len(), 2);
        let pending = db.fetch_undispatched(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].purchase_id, outcome.purchases()[1].id);
        assert_eq!(events.try_recv().unwrap().purchase.id, outcome.purchases()[0].id);
        assert!(events.try_recv().is_err());
    }
}
