use std::collections::HashMap;

use crate::{db_types::MarketPrice, traits::StoreError};

#[allow(async_fn_in_trait)]
pub trait ReferencePrices {
    /// Batch-fetches reference prices for the given types. Types without a price record are simply absent from the
    /// result.
    async fn prices_for_types(&self, type_ids: &[i64], region_id: i64)
        -> Result<HashMap<i64, MarketPrice>, StoreError>;

    /// Saves the price record, replacing any previous record for the same type and region.
    async fn set_market_price(&self, price: &MarketPrice) -> Result<(), StoreError>;
}
