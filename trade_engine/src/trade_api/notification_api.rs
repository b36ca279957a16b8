//! Purchase notifications.
//!
//! Every committed purchase leaves an entry in the purchase outbox. The matcher tries to deliver the notification
//! right after the commit. Anything it could not deliver (a full event channel, a crash between commit and delivery)
//! is picked up by [`NotificationApi::dispatch_pending`].
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::PurchaseTransaction,
    events::{EventProducers, PurchaseCreatedEvent},
    trade_api::errors::SyncError,
    traits::{ListingManagement, NameLookup, NotificationOutbox, PurchaseManagement},
};

pub struct NotificationApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for NotificationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotificationApi")
    }
}

impl<B> NotificationApi<B>
where B: NotificationOutbox + PurchaseManagement + ListingManagement + NameLookup
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    /// Re-delivers up to `limit` undispatched notifications, oldest first. Stops early if the event channel is full.
    /// Returns the number of notifications delivered.
    pub async fn dispatch_pending(&self, limit: i64) -> Result<usize, SyncError> {
        let entries = self.db.fetch_undispatched(limit).await?;
        let mut delivered = 0;
        for entry in entries {
            let Some(purchase) = self.db.fetch_purchase(entry.purchase_id).await? else {
                warn!("📬️ Outbox entry #{} refers to missing purchase #{}. Dropping it.", entry.id, entry.purchase_id);
                self.db.mark_dispatched(entry.id).await?;
                continue;
            };
            let location_id = match self.db.fetch_listing(purchase.for_sale_item_id).await {
                Ok(listing) => listing.map(|l| l.location_id),
                Err(e) => {
                    warn!("📬️ Could not look up the listing of purchase #{}: {e}", purchase.id);
                    None
                },
            };
            let event = describe_purchase(&self.db, purchase, location_id).await;
            if !self.producers.try_publish_purchase_created(&event) {
                info!("📬️ Event channel is busy. {delivered} notifications re-delivered; the rest will be retried.");
                break;
            }
            self.db.mark_dispatched(entry.id).await?;
            delivered += 1;
        }
        if delivered > 0 {
            info!("📬️ {delivered} pending purchase notifications delivered");
        }
        Ok(delivered)
    }
}

/// Builds the notification for a purchase. Names that cannot be looked up are left empty.
pub(crate) async fn describe_purchase<B: NameLookup>(
    db: &B,
    purchase: PurchaseTransaction,
    location_id: Option<i64>,
) -> PurchaseCreatedEvent {
    let seller_name = best_effort("seller", db.user_name(purchase.seller_user_id).await);
    let buyer_name = best_effort("buyer", db.user_name(purchase.buyer_user_id).await);
    let type_name = best_effort("item type", db.type_name(purchase.type_id).await);
    let location_name = match location_id {
        Some(id) => best_effort("location", db.location_name(id).await),
        None => None,
    };
    PurchaseCreatedEvent { purchase, seller_name, buyer_name, type_name, location_name }
}

fn best_effort<E: std::fmt::Display>(what: &str, result: Result<Option<String>, E>) -> Option<String> {
    result.unwrap_or_else(|e| {
        debug!("📬️ Could not look up {what} name: {e}");
        None
    })
}
