//! Settlement of purchases against in-game delivery contracts.
//!
//! A purchase moves to `contract_created` once the seller has been handed a contract key (see
//! [`ContractSyncApi::prepare_delivery`]). The key is meant to be pasted into the title of the in-game item-exchange
//! contract that delivers the goods. This API scans the contract histories of each buyer's characters, and of their
//! corporations where a character holds the corporation-contracts scope, for finished item exchanges whose title
//! carries one of the buyer's outstanding keys.
//!
//! Titles are first searched for structured keys (`PT-` plus a checksummed body). If there are none, a plain
//! case-sensitive substring search over the buyer's keys is used, so hand-made keys still work. A title that matches
//! more than one outstanding key settles nothing; it is flagged for manual review instead.
use std::{
    collections::{BTreeMap, HashSet},
    fmt::Debug,
};

use chrono::Utc;
use log::*;

use crate::{
    db_types::{AccessCredential, Character, ExternalContract, PurchaseTransaction, SettlementReview},
    events::{EventProducers, PurchaseCompletedEvent},
    helpers::{extract_contract_keys, ContractKey},
    trade_api::{errors::SyncError, sync_objects::SettlementSummary},
    traits::{CharacterManagement, ContractHistory, PurchaseManagement},
};

/// Outstanding purchases of one buyer, indexed by contract key. One key may cover several purchases.
pub type KeyIndex = BTreeMap<String, Vec<PurchaseTransaction>>;

pub struct ContractSyncApi<B, C> {
    db: B,
    contracts: C,
    producers: EventProducers,
}

impl<B, C> Debug for ContractSyncApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContractSyncApi")
    }
}

impl<B, C> ContractSyncApi<B, C>
where
    B: PurchaseManagement + CharacterManagement,
    C: ContractHistory,
{
    pub fn new(db: B, contracts: C, producers: EventProducers) -> Self {
        Self { db, contracts, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    /// Issues one fresh contract key for a batch of the seller's pending purchases and moves them to
    /// `contract_created`. Either every purchase is updated, or none is.
    pub async fn prepare_delivery(
        &self,
        seller_user_id: i64,
        purchase_ids: &[i64],
    ) -> Result<(ContractKey, Vec<PurchaseTransaction>), SyncError> {
        if purchase_ids.is_empty() {
            return Err(SyncError::InvalidRequest("No purchases given".into()));
        }
        let key = ContractKey::generate();
        let purchases = self.db.assign_contract_key(seller_user_id, purchase_ids, &key).await?;
        info!("📜 Contract key {key} issued to seller {seller_user_id} for {} purchases", purchases.len());
        Ok((key, purchases))
    }

    /// Settles outstanding purchases for every buyer.
    pub async fn sync_all(&self) -> Result<SettlementSummary, SyncError> {
        let outstanding = self.db.fetch_contract_created_with_keys().await?;
        let buyers = index_by_buyer(outstanding);
        debug!("📜 {} buyers have purchases awaiting settlement", buyers.len());
        let mut summary = SettlementSummary::default();
        for (buyer_user_id, index) in buyers {
            summary += self.settle_buyer(buyer_user_id, index).await;
        }
        info!("📜 Contract sync complete: {summary}");
        Ok(summary)
    }

    /// Settles outstanding purchases for one buyer.
    pub async fn sync_buyer(&self, buyer_user_id: i64) -> Result<SettlementSummary, SyncError> {
        let outstanding = self.db.fetch_contract_created_with_keys().await?;
        let mut buyers = index_by_buyer(outstanding.into_iter().filter(|p| p.buyer_user_id == buyer_user_id));
        let summary = match buyers.remove(&buyer_user_id) {
            Some(index) => self.settle_buyer(buyer_user_id, index).await,
            None => SettlementSummary::default(),
        };
        debug!("📜 Contract sync for buyer {buyer_user_id} complete: {summary}");
        Ok(summary)
    }

    async fn settle_buyer(&self, buyer_user_id: i64, mut index: KeyIndex) -> SettlementSummary {
        let mut summary = SettlementSummary { buyers: 1, ..Default::default() };
        let characters = match self.db.characters_for_user(buyer_user_id).await {
            Ok(c) => c,
            Err(e) => {
                warn!("📜 Could not load the characters of buyer {buyer_user_id}: {e}");
                summary.failed += 1;
                return summary;
            },
        };
        if characters.is_empty() {
            debug!("📜 Buyer {buyer_user_id} has no linked characters");
        }
        let mut corporations_seen = HashSet::new();
        for character in characters {
            if index.is_empty() {
                break;
            }
            let credential = match self.fresh_credential(&character).await {
                Ok(c) => c,
                Err(e) => {
                    warn!("📜 Skipping character {} of buyer {buyer_user_id}: {e}", character.character_id);
                    summary.failed += 1;
                    continue;
                },
            };
            match self.contracts.character_contracts(character.character_id, &credential).await {
                Ok(contracts) => self.settle_contracts(buyer_user_id, &contracts, &mut index, &mut summary).await,
                Err(e) => {
                    warn!("📜 {e}");
                    summary.failed += 1;
                },
            }
            let corporation_id = character.corporation_id;
            if !character.can_read_corporation_contracts() || !corporations_seen.insert(corporation_id) {
                continue;
            }
            if index.is_empty() {
                break;
            }
            match self.contracts.corporation_contracts(corporation_id, &credential).await {
                Ok(contracts) => self.settle_contracts(buyer_user_id, &contracts, &mut index, &mut summary).await,
                Err(e) => {
                    warn!("📜 {e}");
                    summary.failed += 1;
                    // Another character of the same corporation may still succeed
                    corporations_seen.remove(&corporation_id);
                },
            }
        }
        summary
    }

    /// Returns a usable credential for the character, refreshing (and persisting) it first if it has expired.
    async fn fresh_credential(&self, character: &Character) -> Result<AccessCredential, SyncError> {
        let credential = character.credential();
        if !character.token_expired(Utc::now()) {
            return Ok(credential);
        }
        debug!("📜 Refreshing the access credential of character {}", character.character_id);
        let refreshed = self.contracts.refresh_credential(character.character_id, &credential).await?;
        self.db.update_character_credential(character.character_id, &refreshed).await?;
        Ok(refreshed)
    }

    async fn settle_contracts(
        &self,
        buyer_user_id: i64,
        contracts: &[ExternalContract],
        index: &mut KeyIndex,
        summary: &mut SettlementSummary,
    ) {
        for contract in contracts.iter().filter(|c| c.is_settlement_candidate()) {
            if index.is_empty() {
                return;
            }
            summary.contracts_scanned += 1;
            let matched = match_keys(&contract.title, index);
            match matched.len() {
                0 => {},
                1 => {
                    let key = &matched[0];
                    let Some(purchases) = index.remove(key) else { continue };
                    summary.completed += self.complete(contract.contract_id, key, purchases).await;
                },
                _ => {
                    warn!(
                        "📜 Contract {} of buyer {buyer_user_id} matches {} keys ({}). Flagging it for review.",
                        contract.contract_id,
                        matched.len(),
                        matched.join(", ")
                    );
                    let review = SettlementReview {
                        contract_id: contract.contract_id,
                        buyer_user_id,
                        title: contract.title.clone(),
                        matched_keys: matched,
                    };
                    match self.db.flag_for_review(review).await {
                        Ok(()) => summary.flagged += 1,
                        Err(e) => warn!("📜 Could not flag contract {}: {e}", contract.contract_id),
                    }
                },
            }
        }
    }

    async fn complete(&self, contract_id: i64, key: &str, purchases: Vec<PurchaseTransaction>) -> usize {
        let mut completed = 0;
        for purchase in purchases {
            match self.db.complete_with_contract_id(purchase.id, contract_id).await {
                Ok(done) => {
                    completed += 1;
                    let event = PurchaseCompletedEvent::new(done, contract_id);
                    if !self.producers.try_publish_purchase_completed(&event) {
                        debug!("📜 Completion of purchase #{} was not announced to every subscriber", event.purchase.id);
                    }
                },
                Err(e) => warn!("📜 Could not complete purchase #{} with contract {contract_id}: {e}", purchase.id),
            }
        }
        info!("📜 Contract {contract_id} settled {completed} purchases with key {key}");
        completed
    }
}

/// Groups purchases by buyer, then by contract key.
pub fn index_by_buyer<I>(purchases: I) -> BTreeMap<i64, KeyIndex>
where I: IntoIterator<Item = PurchaseTransaction> {
    let mut buyers = BTreeMap::<i64, KeyIndex>::new();
    for purchase in purchases {
        let Some(key) = purchase.contract_key.clone().filter(|k| !k.is_empty()) else {
            continue;
        };
        buyers.entry(purchase.buyer_user_id).or_default().entry(key).or_default().push(purchase);
    }
    buyers
}

/// The outstanding keys found in `title`.
///
/// Structured keys take precedence. Substring matching is only used when the title carries no structured key that
/// belongs to the buyer, and a key only matches where it is not directly preceded or followed by a letter or digit,
/// so `BATCH-1` is not found in `BATCH-12`.
pub fn match_keys(title: &str, index: &KeyIndex) -> Vec<String> {
    let structured = extract_contract_keys(title)
        .into_iter()
        .map(String::from)
        .filter(|k| index.contains_key(k))
        .collect::<Vec<_>>();
    if !structured.is_empty() {
        return structured;
    }
    index.keys().filter(|k| contains_token(title, k)).cloned().collect()
}

fn contains_token(title: &str, key: &str) -> bool {
    if key.is_empty() {
        return false;
    }
    title.match_indices(key).any(|(start, _)| {
        let before = title[..start].chars().next_back();
        let after = title[start + key.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod test {
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        db_types::{ContractStatus, ContractType, NewPurchase, PurchaseStatus, CORPORATION_CONTRACTS_SCOPE},
        events::EventProducer,
        test_utils::{
            fakes::{finished_exchange, FakeContractHistory},
            prepare_env::new_test_db,
            seed::{self, TRITANIUM},
        },
        traits::StoreError,
        SqliteDatabase,
    };

    const SELLER: i64 = 1;
    const BUYER: i64 = 2;
    const PILOT: i64 = 9001;
    const ALT: i64 = 9002;
    const CORP: i64 = 98000001;
    const CHARACTER_SCOPE: &str = "esi-contracts.read_character_contracts.v1";

    type Api = ContractSyncApi<SqliteDatabase, FakeContractHistory>;

    async fn setup() -> (SqliteDatabase, FakeContractHistory, Api) {
        let db = new_test_db().await;
        seed::user(&db, SELLER, "Seller").await;
        seed::user(&db, BUYER, "Buyer").await;
        let contracts = FakeContractHistory::default();
        let api = ContractSyncApi::new(db.clone(), contracts.clone(), EventProducers::default());
        (db, contracts, api)
    }

    fn corp_scopes() -> String {
        format!("{CHARACTER_SCOPE} {CORPORATION_CONTRACTS_SCOPE}")
    }

    /// `count` pending purchases of 10 units each from one listing.
    async fn pending_purchases(db: &SqliteDatabase, count: usize) -> Vec<PurchaseTransaction> {
        let listing = seed::listing(db, SELLER, TRITANIUM, 1000, 8.0).await;
        let order = seed::buy_order(db, BUYER, TRITANIUM, 1000, 8.0, 8.0).await;
        let mut purchases = Vec::with_capacity(count);
        for _ in 0..count {
            let purchase = NewPurchase::auto_fulfill(&order, &listing, 10, ContractKey::generate());
            purchases.push(db.create_purchase(purchase).await.unwrap());
        }
        purchases
    }

    async fn status_of(db: &SqliteDatabase, id: i64) -> PurchaseStatus {
        db.fetch_purchase(id).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn delivery_key_settles_the_batch() {
        let (db, contracts, api) = setup().await;
        seed::linked_character(&db, &seed::character(PILOT, BUYER, CORP, CHARACTER_SCOPE, false)).await;
        let purchases = pending_purchases(&db, 2).await;
        let ids = purchases.iter().map(|p| p.id).collect::<Vec<_>>();

        let (key, prepared) = api.prepare_delivery(SELLER, &ids).await.unwrap();
        assert_eq!(prepared.len(), 2);
        for p in &prepared {
            assert_eq!(p.status, PurchaseStatus::ContractCreated);
            assert_eq!(p.contract_key.as_deref(), Some(key.as_str()));
        }

        contracts.add_character_contract(PILOT, finished_exchange(7001, &format!("Your Tritanium {key}")));
        let summary = api.sync_all().await.unwrap();
        assert_eq!(summary.buyers, 1);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 0);
        for id in ids {
            let purchase = db.fetch_purchase(id).await.unwrap().unwrap();
            assert_eq!(purchase.status, PurchaseStatus::Completed);
            assert_eq!(purchase.eve_contract_id, Some(7001));
        }

        let summary = api.sync_all().await.unwrap();
        assert_eq!(summary, SettlementSummary::default());
    }

    #[tokio::test]
    async fn prepare_delivery_is_all_or_nothing() {
        let (db, _, api) = setup().await;
        let purchases = pending_purchases(&db, 2).await;
        let ids = purchases.iter().map(|p| p.id).collect::<Vec<_>>();

        let err = api.prepare_delivery(BUYER, &ids).await.unwrap_err();
        assert!(matches!(err, SyncError::Store(StoreError::NotTheSeller { seller_user_id: BUYER, .. })));
        assert!(matches!(api.prepare_delivery(SELLER, &[]).await, Err(SyncError::InvalidRequest(_))));

        api.prepare_delivery(SELLER, &ids[..1]).await.unwrap();
        let err = api.prepare_delivery(SELLER, &[ids[1], ids[0]]).await.unwrap_err();
        assert!(matches!(err, SyncError::Store(StoreError::InvalidStatusTransition { .. })));
        assert_eq!(status_of(&db, ids[1]).await, PurchaseStatus::Pending);

        let err = api.prepare_delivery(SELLER, &[ids[1], 999]).await.unwrap_err();
        assert!(matches!(err, SyncError::Store(StoreError::PurchaseNotFound(999))));
        assert_eq!(status_of(&db, ids[1]).await, PurchaseStatus::Pending);
    }

    #[tokio::test]
    async fn corporation_contract_settles_hand_typed_key() {
        let (db, contracts, _) = setup().await;
        let (sender, mut completed) = mpsc::channel(10);
        let producers =
            EventProducers { purchase_completed_producer: vec![EventProducer::new(sender)], ..Default::default() };
        let api = ContractSyncApi::new(db.clone(), contracts.clone(), producers);
        seed::linked_character(&db, &seed::character(PILOT, BUYER, CORP, &corp_scopes(), false)).await;
        let purchases = pending_purchases(&db, 2).await;
        for p in &purchases {
            seed::contract_created_with_key(&db, p.id, "BATCH-1").await;
        }
        contracts.add_corporation_contract(CORP, finished_exchange(5555, "Corp delivery BATCH-1"));

        let summary = api.sync_buyer(BUYER).await.unwrap();
        assert_eq!(summary.completed, 2);
        assert_eq!(contracts.corporation_calls(), vec![CORP]);
        for p in &purchases {
            assert_eq!(status_of(&db, p.id).await, PurchaseStatus::Completed);
            let event = completed.try_recv().unwrap();
            assert_eq!(event.contract_id, 5555);
            assert_eq!(event.purchase.id, p.id);
        }
    }

    #[tokio::test]
    async fn corporation_contracts_need_the_scope() {
        let (db, contracts, api) = setup().await;
        seed::linked_character(&db, &seed::character(PILOT, BUYER, CORP, CHARACTER_SCOPE, false)).await;
        let purchases = pending_purchases(&db, 1).await;
        seed::contract_created_with_key(&db, purchases[0].id, "BATCH-1").await;
        contracts.add_corporation_contract(CORP, finished_exchange(5555, "Corp delivery BATCH-1"));

        let summary = api.sync_all().await.unwrap();
        assert_eq!(summary.completed, 0);
        assert!(contracts.corporation_calls().is_empty());
        assert_eq!(status_of(&db, purchases[0].id).await, PurchaseStatus::ContractCreated);
    }

    #[tokio::test]
    async fn corporation_is_queried_once_per_buyer() {
        let (db, contracts, api) = setup().await;
        seed::linked_character(&db, &seed::character(PILOT, BUYER, CORP, &corp_scopes(), false)).await;
        seed::linked_character(&db, &seed::character(ALT, BUYER, CORP, &corp_scopes(), false)).await;
        let purchases = pending_purchases(&db, 1).await;
        seed::contract_created_with_key(&db, purchases[0].id, "BATCH-1").await;

        api.sync_all().await.unwrap();
        assert_eq!(contracts.corporation_calls(), vec![CORP]);
    }

    #[tokio::test]
    async fn ambiguous_titles_are_flagged() {
        let (db, contracts, api) = setup().await;
        seed::linked_character(&db, &seed::character(PILOT, BUYER, CORP, CHARACTER_SCOPE, false)).await;
        let purchases = pending_purchases(&db, 2).await;
        seed::contract_created_with_key(&db, purchases[0].id, "BATCH-1").await;
        seed::contract_created_with_key(&db, purchases[1].id, "BATCH-12").await;
        contracts.add_character_contract(PILOT, finished_exchange(6000, "Delivery BATCH-1 + BATCH-12"));

        let summary = api.sync_all().await.unwrap();
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.flagged, 1);
        assert_eq!(status_of(&db, purchases[0].id).await, PurchaseStatus::ContractCreated);
        assert_eq!(status_of(&db, purchases[1].id).await, PurchaseStatus::ContractCreated);

        api.sync_all().await.unwrap();
        let reviews = db.fetch_settlement_reviews().await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].contract_id, 6000);
        assert_eq!(reviews[0].buyer_user_id, BUYER);
        assert_eq!(reviews[0].matched_keys, vec!["BATCH-1".to_string(), "BATCH-12".to_string()]);
    }

    #[tokio::test]
    async fn longer_legacy_key_settles_on_its_own() {
        let (db, contracts, api) = setup().await;
        seed::linked_character(&db, &seed::character(PILOT, BUYER, CORP, CHARACTER_SCOPE, false)).await;
        let purchases = pending_purchases(&db, 2).await;
        seed::contract_created_with_key(&db, purchases[0].id, "BATCH-1").await;
        seed::contract_created_with_key(&db, purchases[1].id, "BATCH-12").await;
        contracts.add_character_contract(PILOT, finished_exchange(6000, "Delivery BATCH-12"));

        let summary = api.sync_all().await.unwrap();
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.flagged, 0);
        assert_eq!(status_of(&db, purchases[0].id).await, PurchaseStatus::ContractCreated);
        assert_eq!(status_of(&db, purchases[1].id).await, PurchaseStatus::Completed);
        assert!(db.fetch_settlement_reviews().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn full_event_channel_does_not_stall_settlement() {
        let (db, contracts, _) = setup().await;
        let (sender, mut completed) = mpsc::channel(1);
        let producers =
            EventProducers { purchase_completed_producer: vec![EventProducer::new(sender)], ..Default::default() };
        let api = ContractSyncApi::new(db.clone(), contracts.clone(), producers);
        seed::linked_character(&db, &seed::character(PILOT, BUYER, CORP, CHARACTER_SCOPE, false)).await;
        let purchases = pending_purchases(&db, 3).await;
        for p in &purchases {
            seed::contract_created_with_key(&db, p.id, "BATCH-1").await;
        }
        contracts.add_character_contract(PILOT, finished_exchange(7001, "BATCH-1"));

        let summary = tokio::time::timeout(std::time::Duration::from_secs(5), api.sync_all()).await.unwrap().unwrap();
        assert_eq!(summary.completed, 3);
        for p in &purchases {
            assert_eq!(status_of(&db, p.id).await, PurchaseStatus::Completed);
        }
        assert_eq!(completed.try_recv().unwrap().purchase.id, purchases[0].id);
        assert!(completed.try_recv().is_err());
    }

    #[tokio::test]
    async fn only_finished_item_exchanges_settle() {
        let (db, contracts, api) = setup().await;
        seed::linked_character(&db, &seed::character(PILOT, BUYER, CORP, CHARACTER_SCOPE, false)).await;
        let purchases = pending_purchases(&db, 1).await;
        seed::contract_created_with_key(&db, purchases[0].id, "BATCH-1").await;
        let mut outstanding = finished_exchange(1, "BATCH-1");
        outstanding.status = ContractStatus::Outstanding;
        let mut courier = finished_exchange(2, "BATCH-1");
        courier.contract_type = ContractType::Courier;
        contracts.add_character_contract(PILOT, outstanding);
        contracts.add_character_contract(PILOT, courier);

        let summary = api.sync_all().await.unwrap();
        assert_eq!(summary.contracts_scanned, 0);
        assert_eq!(status_of(&db, purchases[0].id).await, PurchaseStatus::ContractCreated);
    }

    #[tokio::test]
    async fn expired_credentials_are_refreshed_and_stored() {
        let (db, contracts, api) = setup().await;
        seed::linked_character(&db, &seed::character(PILOT, BUYER, CORP, CHARACTER_SCOPE, true)).await;
        let purchases = pending_purchases(&db, 1).await;
        seed::contract_created_with_key(&db, purchases[0].id, "BATCH-1").await;
        contracts.add_character_contract(PILOT, finished_exchange(7001, "BATCH-1"));

        let summary = api.sync_all().await.unwrap();
        assert_eq!(summary.completed, 1);
        assert_eq!(contracts.refreshed(), vec![PILOT]);
        let stored = db.characters_for_user(BUYER).await.unwrap().remove(0);
        assert_eq!(stored.esi_token, format!("refreshed-{PILOT}"));
        assert!(!stored.token_expired(Utc::now()));
    }

    #[tokio::test]
    async fn failing_characters_do_not_block_others() {
        let (db, contracts, api) = setup().await;
        seed::linked_character(&db, &seed::character(PILOT, BUYER, CORP, CHARACTER_SCOPE, true)).await;
        seed::linked_character(&db, &seed::character(ALT, BUYER, CORP, CHARACTER_SCOPE, false)).await;
        seed::linked_character(&db, &seed::character(9003, BUYER, CORP, CHARACTER_SCOPE, false)).await;
        let purchases = pending_purchases(&db, 1).await;
        seed::contract_created_with_key(&db, purchases[0].id, "BATCH-1").await;
        contracts.fail_refresh(PILOT);
        contracts.fail_character(ALT);
        contracts.add_character_contract(9003, finished_exchange(7001, "BATCH-1"));

        let summary = api.sync_all().await.unwrap();
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(status_of(&db, purchases[0].id).await, PurchaseStatus::Completed);
    }

    #[test]
    fn structured_keys_win_over_substrings() {
        let key = ContractKey::generate();
        let mut index = KeyIndex::new();
        index.insert(key.to_string(), Vec::new());
        index.insert("BATCH-1".to_string(), Vec::new());

        let title = format!("BATCH-1 leftovers {key}");
        assert_eq!(match_keys(&title, &index), vec![key.to_string()]);
        assert_eq!(match_keys("BATCH-1 leftovers", &index), vec!["BATCH-1".to_string()]);
        assert!(match_keys("batch-1", &index).is_empty());
        assert!(match_keys("BATCH-12 and BATCH-1a", &index).is_empty());
        assert_eq!(match_keys("(BATCH-1)", &index), vec!["BATCH-1".to_string()]);
        // A structured key that is not outstanding falls back to substring matching
        let title = format!("{} BATCH-1", ContractKey::generate());
        assert_eq!(match_keys(&title, &index), vec!["BATCH-1".to_string()]);
    }
}
