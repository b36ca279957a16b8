use crate::{
    db_types::{AutoSellContainer, AutoSellOverride, BuyOrder, ForSaleItem, NewAutoSellContainer, NewForSaleItem},
    traits::StoreError,
};

/// Storage for the supply side: auto-sell policies and the listings derived from them.
#[allow(async_fn_in_trait)]
pub trait ListingManagement {
    /// Creates a new auto-sell container policy for a user.
    async fn insert_auto_sell_container(&self, container: NewAutoSellContainer)
        -> Result<AutoSellContainer, StoreError>;

    /// Sets (or replaces) the per-item pricing override for everything the given owner auto-sells.
    async fn upsert_auto_sell_override(&self, ov: AutoSellOverride) -> Result<(), StoreError>;

    /// All active auto-sell containers, ordered by id.
    async fn fetch_active_auto_sell_containers(&self) -> Result<Vec<AutoSellContainer>, StoreError>;

    /// The active auto-sell containers for one user, ordered by id.
    async fn fetch_auto_sell_containers_for_user(&self, user_id: i64) -> Result<Vec<AutoSellContainer>, StoreError>;

    /// The per-item overrides that apply to the container's owner scope.
    async fn fetch_auto_sell_overrides(&self, container: &AutoSellContainer)
        -> Result<Vec<AutoSellOverride>, StoreError>;

    /// The currently active listings derived from the given auto-sell container.
    async fn fetch_active_listings_for_container(&self, container_id: i64) -> Result<Vec<ForSaleItem>, StoreError>;

    /// Updates the active listing for `(auto_sell_container_id, type_id)` in place, or inserts a new one if there is
    /// none. Price and quantity are always overwritten.
    async fn upsert_auto_sell_listing(&self, item: NewForSaleItem) -> Result<ForSaleItem, StoreError>;

    /// Inserts a listing that is not tied to any auto-sell container.
    async fn insert_listing(&self, item: NewForSaleItem) -> Result<ForSaleItem, StoreError>;

    async fn fetch_listing(&self, id: i64) -> Result<Option<ForSaleItem>, StoreError>;

    /// Marks the listing inactive. Listings are never deleted.
    async fn deactivate_listing(&self, id: i64) -> Result<(), StoreError>;

    /// Active listings of the order's type with available stock, priced within the order's range, and not owned by
    /// the buyer. Cheapest first, then oldest first.
    async fn fetch_matching_listings(&self, order: &BuyOrder) -> Result<Vec<ForSaleItem>, StoreError>;
}
