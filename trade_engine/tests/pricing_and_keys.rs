use chrono::Utc;
use trade_engine::{
    db_types::{MarketPrice, PriceSource, PurchaseStatus, PurchaseTransaction},
    helpers::{extract_contract_keys, ContractKey},
    index_by_buyer,
    match_keys,
    pricing::{resolve_base_price, PricingPolicy},
};

const TRITANIUM: i64 = 34;
const JITA: i64 = 10000002;

fn purchase(id: i64, buyer_user_id: i64, contract_key: Option<&str>) -> PurchaseTransaction {
    PurchaseTransaction {
        id,
        for_sale_item_id: 1,
        buy_order_id: None,
        buyer_user_id,
        seller_user_id: 1,
        type_id: TRITANIUM,
        quantity_purchased: 10,
        price_per_unit: 8.0.into(),
        total_price: 80.0.into(),
        status: PurchaseStatus::ContractCreated,
        is_auto_fulfilled: true,
        contract_key: contract_key.map(String::from),
        eve_contract_id: None,
        purchased_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn base_prices() {
    let price = MarketPrice::new(TRITANIUM, JITA, Some(5.0), Some(6.0));
    assert_eq!(resolve_base_price(&price, PriceSource::JitaBuy), Some(5.0.into()));
    assert_eq!(resolve_base_price(&price, PriceSource::JitaSell), Some(6.0.into()));
    assert_eq!(resolve_base_price(&price, PriceSource::JitaSplit), Some(5.5.into()));

    let one_sided = MarketPrice::new(TRITANIUM, JITA, None, Some(6.0));
    assert_eq!(resolve_base_price(&one_sided, PriceSource::JitaBuy), None);
    assert_eq!(resolve_base_price(&one_sided, PriceSource::JitaSplit), None);
}

#[test]
fn unit_prices() {
    let price = MarketPrice::new(TRITANIUM, JITA, Some(5.0), Some(6.0));
    assert_eq!(PricingPolicy::new(PriceSource::JitaBuy, 90.0).unit_price(&price), Some(4.5.into()));
    assert_eq!(PricingPolicy::new(PriceSource::JitaSplit, 200.0).unit_price(&price), Some(11.0.into()));
    assert_eq!(PricingPolicy::new(PriceSource::JitaBuy, 0.0).unit_price(&price), None);
    assert_eq!(PricingPolicy::new(PriceSource::JitaBuy, -10.0).unit_price(&price), None);

    let free = MarketPrice::new(TRITANIUM, JITA, Some(0.0), Some(6.0));
    assert_eq!(PricingPolicy::new(PriceSource::JitaBuy, 100.0).unit_price(&free), None);
}

#[test]
fn unknown_price_sources_fall_back_to_buy() {
    assert_eq!(PriceSource::from("jita_sell"), PriceSource::JitaSell);
    assert_eq!(PriceSource::from("amarr_buy"), PriceSource::JitaBuy);
    assert_eq!(PriceSource::from(""), PriceSource::JitaBuy);
}

#[test]
fn override_layers() {
    let default = PricingPolicy::new(PriceSource::JitaBuy, 90.0);
    assert_eq!(PricingPolicy::layered(default, None, None), default);
    let policy = PricingPolicy::layered(default, None, Some(110.0));
    assert_eq!(policy, PricingPolicy::new(PriceSource::JitaBuy, 110.0));
    let policy = PricingPolicy::layered(default, Some(PriceSource::JitaSplit), Some(110.0));
    assert_eq!(policy, PricingPolicy::new(PriceSource::JitaSplit, 110.0));
}

#[test]
fn generated_keys_are_found_in_titles() {
    let a = ContractKey::generate();
    let b = ContractKey::generate();
    let title = format!("Delivery {a}, {b} and {a} again");
    let found = extract_contract_keys(&title);
    assert_eq!(found.len(), if a == b { 1 } else { 2 });
    assert_eq!(found[0], a);
    assert!(extract_contract_keys("Delivery PT-").is_empty());
}

#[test]
fn corrupted_keys_are_rejected() {
    let key = ContractKey::generate().to_string();
    let last = key.chars().last().unwrap();
    let other = if last == '0' { '1' } else { '0' };
    let corrupted = format!("{}{other}", &key[..key.len() - 1]);
    assert!(ContractKey::parse(&corrupted).is_none());
    assert!(ContractKey::parse("PT-ILOU000").is_none());
    assert!(ContractKey::parse(&format!("{key}X")).is_none());
}

#[test]
fn keys_are_grouped_per_buyer() {
    let purchases = vec![
        purchase(1, 2, Some("BATCH-1")),
        purchase(2, 2, Some("BATCH-1")),
        purchase(3, 2, Some("BATCH-2")),
        purchase(4, 3, Some("BATCH-1")),
        purchase(5, 3, None),
        purchase(6, 3, Some("")),
    ];
    let buyers = index_by_buyer(purchases);
    assert_eq!(buyers.len(), 2);
    assert_eq!(buyers[&2]["BATCH-1"].iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(buyers[&2]["BATCH-2"].len(), 1);
    assert_eq!(buyers[&3].len(), 1);

    assert_eq!(match_keys("Corp delivery BATCH-1", &buyers[&2]), vec!["BATCH-1".to_string()]);
    assert_eq!(match_keys("BATCH-1 + BATCH-2", &buyers[&2]).len(), 2);
    assert!(match_keys("Corp delivery", &buyers[&2]).is_empty());
}
