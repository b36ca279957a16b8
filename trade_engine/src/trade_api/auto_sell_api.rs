//! Supply-side reconciliation.
//!
//! Every active auto-sell container is compared against its current contents. Each item type in the container gets
//! exactly one active listing, re-priced and re-counted on every pass. Types without a usable reference price, and
//! types that have left the container, have their listing deactivated.
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt::Debug,
};

use log::*;

use crate::{
    db_types::{AutoSellContainer, ForSaleItem, NewForSaleItem},
    pricing::PricingPolicy,
    trade_api::{errors::SyncError, sync_objects::SyncSummary},
    traits::{AssetSnapshot, ListingManagement, PurchaseManagement, ReferencePrices},
};

pub struct AutoSellApi<B, A> {
    db: B,
    assets: A,
    region_id: i64,
}

impl<B, A> Debug for AutoSellApi<B, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AutoSellApi (region {})", self.region_id)
    }
}

impl<B, A> AutoSellApi<B, A>
where
    B: ListingManagement + PurchaseManagement + ReferencePrices,
    A: AssetSnapshot,
{
    pub fn new(db: B, assets: A, region_id: i64) -> Self {
        Self { db, assets, region_id }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    /// Synchronises every active auto-sell container.
    pub async fn sync_all(&self) -> Result<SyncSummary, SyncError> {
        let containers = self.db.fetch_active_auto_sell_containers().await?;
        debug!("🏷️ Syncing {} auto-sell containers", containers.len());
        Ok(self.sync_containers(&containers).await)
    }

    /// Synchronises the active auto-sell containers of a single user.
    pub async fn sync_for_user(&self, user_id: i64) -> Result<SyncSummary, SyncError> {
        let containers = self.db.fetch_auto_sell_containers_for_user(user_id).await?;
        debug!("🏷️ Syncing {} auto-sell containers for user {user_id}", containers.len());
        Ok(self.sync_containers(&containers).await)
    }

    async fn sync_containers(&self, containers: &[AutoSellContainer]) -> SyncSummary {
        let mut summary = SyncSummary::default();
        for container in containers {
            match self.sync_container(container).await {
                Ok(result) => summary += result,
                Err(e) => {
                    warn!("🏷️ Could not sync auto-sell container #{} ({}): {e}", container.id, container.container_id);
                    summary.entities += 1;
                    summary.failed += 1;
                },
            }
        }
        info!("🏷️ Auto-sell pass complete: {summary}");
        summary
    }

    /// Brings the listings of one container in line with its contents.
    ///
    /// An error is returned if the contents, prices or existing listings cannot be loaded. Failures to write
    /// individual listings are logged, and the rest of the container is still processed.
    pub async fn sync_container(&self, container: &AutoSellContainer) -> Result<SyncSummary, SyncError> {
        let contents =
            self.assets.items_in_container(container.owner_type, container.owner_id, container.container_id).await?;
        let mut quantities = BTreeMap::<i64, i64>::new();
        for item in contents {
            *quantities.entry(item.type_id).or_default() += item.quantity;
        }
        let type_ids = quantities.keys().copied().collect::<Vec<_>>();
        let prices = self.db.prices_for_types(&type_ids, self.region_id).await?;
        let overrides = self
            .db
            .fetch_auto_sell_overrides(container)
            .await?
            .into_iter()
            .map(|o| (o.type_id, o))
            .collect::<HashMap<_, _>>();
        let existing = self
            .db
            .fetch_active_listings_for_container(container.id)
            .await?
            .into_iter()
            .map(|l| (l.type_id, l))
            .collect::<HashMap<i64, ForSaleItem>>();
        let default_policy = PricingPolicy::for_container(container);

        let mut summary = SyncSummary { entities: 1, ..Default::default() };
        let mut keep = HashSet::new();
        for (type_id, quantity) in quantities {
            let policy = match overrides.get(&type_id) {
                Some(o) => PricingPolicy::layered(default_policy, o.price_source, o.price_percentage),
                None => default_policy,
            };
            let Some(price) = prices.get(&type_id).and_then(|p| policy.unit_price(p)) else {
                debug!("🏷️ No usable {} price for type {type_id} in container #{}", policy.source, container.id);
                continue;
            };
            let committed = match self.db.committed_quantity_for_auto_sell(container.id, type_id).await {
                Ok(q) => q,
                Err(e) => {
                    warn!("🏷️ Could not read committed quantity of type {type_id} in container #{}. {e}", container.id);
                    keep.insert(type_id);
                    continue;
                },
            };
            let available = (quantity - committed).max(0);
            let item = NewForSaleItem::for_container(container, type_id, available, price);
            keep.insert(type_id);
            match self.db.upsert_auto_sell_listing(item).await {
                Ok(listing) => {
                    trace!("🏷️ Listing #{} now offers {available} of type {type_id} at {price}", listing.id);
                    summary.upserted += 1;
                },
                Err(e) => warn!("🏷️ Could not upsert listing for type {type_id} in container #{}: {e}", container.id),
            }
        }

        for (type_id, listing) in existing {
            if keep.contains(&type_id) {
                continue;
            }
            match self.db.deactivate_listing(listing.id).await {
                Ok(()) => {
                    debug!("🏷️ Listing #{} for type {type_id} deactivated", listing.id);
                    summary.deactivated += 1;
                },
                Err(e) => warn!("🏷️ Could not deactivate listing #{}: {e}", listing.id),
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        db_types::{AutoSellOverride, NewPurchase, OwnerType, PriceSource},
        helpers::ContractKey,
        test_utils::{
            fakes::FlakyAssets,
            prepare_env::new_test_db,
            seed::{self, HOME_STATION, JITA, MEXALLON, PYERITE, TRITANIUM},
        },
        traits::BuyOrderManagement,
        SqliteDatabase,
    };

    const SELLER: i64 = 1;
    const BUYER: i64 = 2;

    async fn setup() -> (SqliteDatabase, AutoSellApi<SqliteDatabase, SqliteDatabase>) {
        let db = new_test_db().await;
        seed::user(&db, SELLER, "Seller").await;
        seed::user(&db, BUYER, "Buyer").await;
        let api = AutoSellApi::new(db.clone(), db.clone(), JITA);
        (db, api)
    }

    fn by_type(listings: &[ForSaleItem], type_id: i64) -> Option<&ForSaleItem> {
        listings.iter().find(|l| l.type_id == type_id)
    }

    #[tokio::test]
    async fn listing_from_container_contents() {
        let (db, api) = setup().await;
        let container = seed::auto_sell_container(&db, SELLER, 1001, PriceSource::JitaBuy, 90.0).await;
        seed::asset_in_container(&db, SELLER, 1001, TRITANIUM, 600).await;
        seed::asset_in_container(&db, SELLER, 1001, TRITANIUM, 400).await;
        seed::price(&db, TRITANIUM, Some(5.0), Some(6.0)).await;

        let summary = api.sync_all().await.unwrap();
        assert_eq!(summary, SyncSummary { entities: 1, failed: 0, upserted: 1, deactivated: 0 });
        let listings = db.fetch_active_listings_for_container(container.id).await.unwrap();
        assert_eq!(listings.len(), 1);
        let listing = &listings[0];
        assert_eq!(listing.type_id, TRITANIUM);
        assert_eq!(listing.quantity_available, 1000);
        assert_eq!(listing.price_per_unit, 4.5.into());
        assert_eq!(listing.user_id, SELLER);
        assert_eq!(listing.location_id, HOME_STATION);
        assert_eq!(listing.container_id, Some(1001));
        assert_eq!(listing.auto_sell_container_id, Some(container.id));
        assert!(listing.is_active);
    }

    #[tokio::test]
    async fn repeated_syncs_are_idempotent() {
        let (db, api) = setup().await;
        let container = seed::auto_sell_container(&db, SELLER, 1001, PriceSource::JitaSell, 110.0).await;
        seed::asset_in_container(&db, SELLER, 1001, TRITANIUM, 1000).await;
        seed::asset_in_container(&db, SELLER, 1001, PYERITE, 250).await;
        seed::price(&db, TRITANIUM, Some(5.0), Some(6.0)).await;
        seed::price(&db, PYERITE, Some(10.0), Some(12.0)).await;

        api.sync_all().await.unwrap();
        let first = db.fetch_active_listings_for_container(container.id).await.unwrap();
        let summary = api.sync_all().await.unwrap();
        let second = db.fetch_active_listings_for_container(container.id).await.unwrap();
        assert_eq!(summary.deactivated, 0);
        assert_eq!(first.len(), 2);
        let key = |l: &ForSaleItem| (l.id, l.type_id, l.quantity_available, l.price_per_unit, l.is_active);
        assert_eq!(first.iter().map(key).collect::<Vec<_>>(), second.iter().map(key).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn removed_items_are_deactivated() {
        let (db, api) = setup().await;
        let container = seed::auto_sell_container(&db, SELLER, 1001, PriceSource::JitaBuy, 100.0).await;
        seed::asset_in_container(&db, SELLER, 1001, TRITANIUM, 1000).await;
        seed::asset_in_container(&db, SELLER, 1001, PYERITE, 250).await;
        seed::price(&db, TRITANIUM, Some(5.0), None).await;
        seed::price(&db, PYERITE, Some(10.0), None).await;
        api.sync_all().await.unwrap();
        let before = db.fetch_active_listings_for_container(container.id).await.unwrap();
        let pyerite = by_type(&before, PYERITE).unwrap().clone();

        seed::empty_container(&db, SELLER, 1001).await;
        seed::asset_in_container(&db, SELLER, 1001, TRITANIUM, 1000).await;
        let summary = api.sync_all().await.unwrap();
        assert_eq!(summary.deactivated, 1);

        let after = db.fetch_active_listings_for_container(container.id).await.unwrap();
        assert_eq!(after.len(), 1);
        assert!(by_type(&after, PYERITE).is_none());
        let old = db.fetch_listing(pyerite.id).await.unwrap().unwrap();
        assert!(!old.is_active);
    }

    #[tokio::test]
    async fn missing_price_deactivates_listing() {
        let (db, api) = setup().await;
        let container = seed::auto_sell_container(&db, SELLER, 1001, PriceSource::JitaBuy, 90.0).await;
        seed::asset_in_container(&db, SELLER, 1001, TRITANIUM, 1000).await;
        seed::asset_in_container(&db, SELLER, 1001, MEXALLON, 50).await;
        seed::price(&db, TRITANIUM, Some(5.0), Some(6.0)).await;
        seed::price(&db, MEXALLON, Some(80.0), Some(90.0)).await;
        api.sync_all().await.unwrap();
        assert_eq!(db.fetch_active_listings_for_container(container.id).await.unwrap().len(), 2);

        // Mexallon is still in the container, but nobody is buying it any more
        seed::price(&db, MEXALLON, None, Some(90.0)).await;
        let summary = api.sync_all().await.unwrap();
        assert_eq!(summary.deactivated, 1);
        let listings = db.fetch_active_listings_for_container(container.id).await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].type_id, TRITANIUM);
    }

    #[tokio::test]
    async fn split_price_needs_both_sides() {
        let (db, api) = setup().await;
        let container = seed::auto_sell_container(&db, SELLER, 1001, PriceSource::JitaSplit, 100.0).await;
        seed::asset_in_container(&db, SELLER, 1001, TRITANIUM, 10).await;
        seed::price(&db, TRITANIUM, Some(5.0), Some(7.0)).await;
        api.sync_all().await.unwrap();
        let listings = db.fetch_active_listings_for_container(container.id).await.unwrap();
        assert_eq!(listings[0].price_per_unit, 6.0.into());

        seed::price(&db, TRITANIUM, Some(5.0), None).await;
        api.sync_all().await.unwrap();
        assert!(db.fetch_active_listings_for_container(container.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn per_item_overrides() {
        let (db, api) = setup().await;
        let container = seed::auto_sell_container(&db, SELLER, 1001, PriceSource::JitaBuy, 90.0).await;
        seed::asset_in_container(&db, SELLER, 1001, TRITANIUM, 10).await;
        seed::asset_in_container(&db, SELLER, 1001, PYERITE, 10).await;
        seed::price(&db, TRITANIUM, Some(5.0), Some(6.0)).await;
        seed::price(&db, PYERITE, Some(10.0), Some(12.0)).await;
        let ov = AutoSellOverride {
            user_id: SELLER,
            owner_type: OwnerType::Character,
            owner_id: SELLER,
            type_id: PYERITE,
            price_source: Some(PriceSource::JitaSell),
            price_percentage: None,
        };
        db.upsert_auto_sell_override(ov).await.unwrap();
        api.sync_all().await.unwrap();
        let listings = db.fetch_active_listings_for_container(container.id).await.unwrap();
        assert_eq!(by_type(&listings, TRITANIUM).unwrap().price_per_unit, 4.5.into());
        // jita_sell from the override, 90% from the container
        assert_eq!(by_type(&listings, PYERITE).unwrap().price_per_unit, 10.8.into());
    }

    #[tokio::test]
    async fn failing_container_does_not_block_others() {
        let (db, _) = setup().await;
        seed::user(&db, 3, "Other seller").await;
        let broken = seed::auto_sell_container(&db, SELLER, 1001, PriceSource::JitaBuy, 100.0).await;
        let healthy = seed::auto_sell_container(&db, 3, 2002, PriceSource::JitaBuy, 100.0).await;
        seed::asset_in_container(&db, SELLER, 1001, TRITANIUM, 10).await;
        seed::asset_in_container(&db, 3, 2002, TRITANIUM, 20).await;
        seed::price(&db, TRITANIUM, Some(5.0), None).await;
        let api = AutoSellApi::new(db.clone(), FlakyAssets::new(db.clone(), &[1001]), JITA);

        let summary = api.sync_all().await.unwrap();
        assert_eq!(summary, SyncSummary { entities: 2, failed: 1, upserted: 1, deactivated: 0 });
        assert!(db.fetch_active_listings_for_container(broken.id).await.unwrap().is_empty());
        assert_eq!(db.fetch_active_listings_for_container(healthy.id).await.unwrap()[0].quantity_available, 20);

        let summary = api.sync_for_user(3).await.unwrap();
        assert_eq!(summary.entities, 1);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn sold_units_are_not_offered_again() {
        let (db, api) = setup().await;
        let container = seed::auto_sell_container(&db, SELLER, 1001, PriceSource::JitaBuy, 100.0).await;
        seed::asset_in_container(&db, SELLER, 1001, TRITANIUM, 1000).await;
        seed::price(&db, TRITANIUM, Some(5.0), None).await;
        api.sync_all().await.unwrap();
        let listing = db.fetch_active_listings_for_container(container.id).await.unwrap().remove(0);

        let order = db
            .insert_buy_order(crate::db_types::NewBuyOrder {
                buyer_user_id: BUYER,
                type_id: TRITANIUM,
                location_id: HOME_STATION,
                quantity_desired: 300,
                min_price_per_unit: 1.0.into(),
                max_price_per_unit: 10.0.into(),
                auto_buy_config_id: None,
            })
            .await
            .unwrap();
        let purchase = NewPurchase::auto_fulfill(&order, &listing, 300, ContractKey::generate());
        db.create_purchase(purchase).await.unwrap();

        // The goods have not left the container yet
        api.sync_all().await.unwrap();
        let listing = db.fetch_listing(listing.id).await.unwrap().unwrap();
        assert!(listing.is_active);
        assert_eq!(listing.quantity_available, 700);
    }

    #[tokio::test]
    async fn price_gap_keeps_sold_units_reserved() {
        let (db, api) = setup().await;
        let container = seed::auto_sell_container(&db, SELLER, 1001, PriceSource::JitaBuy, 100.0).await;
        seed::asset_in_container(&db, SELLER, 1001, TRITANIUM, 1000).await;
        seed::price(&db, TRITANIUM, Some(5.0), None).await;
        api.sync_all().await.unwrap();
        let listing = db.fetch_active_listings_for_container(container.id).await.unwrap().remove(0);
        let order = seed::buy_order(&db, BUYER, TRITANIUM, 300, 5.0, 5.0).await;
        db.create_purchase(NewPurchase::auto_fulfill(&order, &listing, 300, ContractKey::generate())).await.unwrap();

        seed::price(&db, TRITANIUM, None, None).await;
        let summary = api.sync_all().await.unwrap();
        assert_eq!(summary.deactivated, 1);
        assert!(db.fetch_active_listings_for_container(container.id).await.unwrap().is_empty());

        seed::price(&db, TRITANIUM, Some(5.0), None).await;
        api.sync_all().await.unwrap();
        let listings = db.fetch_active_listings_for_container(container.id).await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].id, listing.id);
        assert_eq!(listings[0].quantity_available, 700);
    }

    #[tokio::test]
    async fn manual_listings_are_left_alone() {
        let (db, api) = setup().await;
        seed::auto_sell_container(&db, SELLER, 1001, PriceSource::JitaBuy, 100.0).await;
        let manual = seed::listing(&db, SELLER, PYERITE, 50, 11.0).await;
        api.sync_all().await.unwrap();
        let manual = db.fetch_listing(manual.id).await.unwrap().unwrap();
        assert!(manual.is_active);
        assert_eq!(manual.quantity_available, 50);
    }
}
