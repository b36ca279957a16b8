use futures::future::BoxFuture;
use log::*;
use trade_engine::events::{EventHandlers, EventHooks, PurchaseCompletedEvent, PurchaseCreatedEvent};

/// Event handlers that write purchase notifications to the log.
///
/// The JSON payload is logged at debug level so that an external shipper can forward it.
pub fn create_notification_handlers(buffer_size: usize) -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_purchase_created(|ev| {
        info!("📬️ {}", describe_created(&ev));
        log_payload(&ev);
        no_op()
    });
    hooks.on_purchase_completed(|ev| {
        info!("📬️ {}", describe_completed(&ev));
        log_payload(&ev);
        no_op()
    });
    EventHandlers::new(buffer_size, hooks)
}

pub fn describe_created(ev: &PurchaseCreatedEvent) -> String {
    let p = &ev.purchase;
    let unknown = || "?".to_string();
    format!(
        "{} bought {} x {} from {} at {} for {} (purchase #{}, key {})",
        ev.buyer_name.clone().unwrap_or_else(|| format!("user {}", p.buyer_user_id)),
        p.quantity_purchased,
        ev.type_name.clone().unwrap_or_else(|| format!("type {}", p.type_id)),
        ev.seller_name.clone().unwrap_or_else(|| format!("user {}", p.seller_user_id)),
        ev.location_name.clone().unwrap_or_else(unknown),
        p.total_price,
        p.id,
        p.contract_key.clone().unwrap_or_else(unknown),
    )
}

pub fn describe_completed(ev: &PurchaseCompletedEvent) -> String {
    format!(
        "Purchase #{} of {} x type {} settled by contract {}",
        ev.purchase.id, ev.purchase.quantity_purchased, ev.purchase.type_id, ev.contract_id
    )
}

fn log_payload<T: serde::Serialize>(ev: &T) {
    match serde_json::to_string(ev) {
        Ok(json) => debug!("📬️ {json}"),
        Err(e) => warn!("📬️ Could not serialize event. {e}"),
    }
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use trade_engine::db_types::{PurchaseStatus, PurchaseTransaction};

    use super::*;

    fn purchase() -> PurchaseTransaction {
        PurchaseTransaction {
            id: 17,
            for_sale_item_id: 3,
            buy_order_id: Some(5),
            buyer_user_id: 2,
            seller_user_id: 1,
            type_id: 34,
            quantity_purchased: 100,
            price_per_unit: 8.0.into(),
            total_price: 800.0.into(),
            status: PurchaseStatus::Pending,
            is_auto_fulfilled: true,
            contract_key: Some("PT-7K2M9QX".into()),
            eve_contract_id: None,
            purchased_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn created_with_names() {
        let ev = PurchaseCreatedEvent {
            purchase: purchase(),
            seller_name: Some("Seller".into()),
            buyer_name: Some("Buyer".into()),
            type_name: Some("Tritanium".into()),
            location_name: Some("Jita IV - Moon 4".into()),
        };
        let text = describe_created(&ev);
        assert!(text.starts_with("Buyer bought 100 x Tritanium from Seller at Jita IV - Moon 4"));
        assert!(text.ends_with("(purchase #17, key PT-7K2M9QX)"));
    }

    #[test]
    fn created_without_names() {
        let ev = PurchaseCreatedEvent::new(purchase());
        let text = describe_created(&ev);
        assert!(text.starts_with("user 2 bought 100 x type 34 from user 1 at ?"));
    }

    #[test]
    fn completed() {
        let ev = PurchaseCompletedEvent::new(purchase(), 5555);
        assert_eq!(describe_completed(&ev), "Purchase #17 of 100 x type 34 settled by contract 5555");
    }
}
