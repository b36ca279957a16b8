//! In-memory stand-ins for the external collaborators.
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use chrono::{Duration, Utc};
use trade_common::Secret;

use crate::{
    db_types::{
        AccessCredential,
        AutoBuyConfig,
        ContainerItem,
        ContractStatus,
        ContractType,
        ExternalContract,
        OwnerType,
        StockpileDeficit,
    },
    traits::{AssetSnapshot, ContractHistory, StockpileDeficits, UpstreamError},
};

pub fn finished_exchange(contract_id: i64, title: &str) -> ExternalContract {
    ExternalContract {
        contract_id,
        title: title.to_string(),
        contract_type: ContractType::ItemExchange,
        status: ContractStatus::Finished,
    }
}

#[derive(Default)]
struct ContractBook {
    character: HashMap<i64, Vec<ExternalContract>>,
    corporation: HashMap<i64, Vec<ExternalContract>>,
    failing_characters: HashSet<i64>,
    failing_refresh: HashSet<i64>,
    refreshed: Vec<i64>,
    corporation_calls: Vec<i64>,
}

/// Contract histories held in memory. Clones share state.
#[derive(Clone, Default)]
pub struct FakeContractHistory {
    book: Arc<Mutex<ContractBook>>,
}

impl FakeContractHistory {
    pub fn add_character_contract(&self, character_id: i64, contract: ExternalContract) {
        self.book.lock().unwrap().character.entry(character_id).or_default().push(contract);
    }

    pub fn add_corporation_contract(&self, corporation_id: i64, contract: ExternalContract) {
        self.book.lock().unwrap().corporation.entry(corporation_id).or_default().push(contract);
    }

    pub fn fail_character(&self, character_id: i64) {
        self.book.lock().unwrap().failing_characters.insert(character_id);
    }

    pub fn fail_refresh(&self, character_id: i64) {
        self.book.lock().unwrap().failing_refresh.insert(character_id);
    }

    /// Characters whose credential was refreshed, in call order.
    pub fn refreshed(&self) -> Vec<i64> {
        self.book.lock().unwrap().refreshed.clone()
    }

    /// Corporations whose contracts were requested, in call order.
    pub fn corporation_calls(&self) -> Vec<i64> {
        self.book.lock().unwrap().corporation_calls.clone()
    }
}

impl ContractHistory for FakeContractHistory {
    async fn character_contracts(
        &self,
        character_id: i64,
        _credential: &AccessCredential,
    ) -> Result<Vec<ExternalContract>, UpstreamError> {
        let book = self.book.lock().unwrap();
        if book.failing_characters.contains(&character_id) {
            return Err(UpstreamError::ContractHistory {
                owner: format!("character {character_id}"),
                reason: "503 Service Unavailable".into(),
            });
        }
        Ok(book.character.get(&character_id).cloned().unwrap_or_default())
    }

    async fn corporation_contracts(
        &self,
        corporation_id: i64,
        _credential: &AccessCredential,
    ) -> Result<Vec<ExternalContract>, UpstreamError> {
        let mut book = self.book.lock().unwrap();
        book.corporation_calls.push(corporation_id);
        Ok(book.corporation.get(&corporation_id).cloned().unwrap_or_default())
    }

    async fn refresh_credential(
        &self,
        character_id: i64,
        _credential: &AccessCredential,
    ) -> Result<AccessCredential, UpstreamError> {
        let mut book = self.book.lock().unwrap();
        if book.failing_refresh.contains(&character_id) {
            return Err(UpstreamError::CredentialRefresh { character_id, reason: "invalid_grant".into() });
        }
        book.refreshed.push(character_id);
        Ok(AccessCredential {
            access_token: Secret::new(format!("refreshed-{character_id}")),
            refresh_token: Secret::new(format!("refresh-{character_id}-2")),
            expires_at: Utc::now() + Duration::minutes(20),
        })
    }
}

/// Wraps an asset snapshot so that selected containers fail to load.
#[derive(Clone)]
pub struct FlakyAssets<A> {
    inner: A,
    failing: HashSet<i64>,
}

impl<A> FlakyAssets<A> {
    pub fn new(inner: A, failing_containers: &[i64]) -> Self {
        Self { inner, failing: failing_containers.iter().copied().collect() }
    }
}

impl<A: AssetSnapshot> AssetSnapshot for FlakyAssets<A> {
    async fn items_in_container(
        &self,
        owner_type: OwnerType,
        owner_id: i64,
        container_id: i64,
    ) -> Result<Vec<ContainerItem>, UpstreamError> {
        if self.failing.contains(&container_id) {
            return Err(UpstreamError::ContainerContents { container_id, reason: "asset cache unavailable".into() });
        }
        self.inner.items_in_container(owner_type, owner_id, container_id).await
    }
}

/// Stockpile deficits set directly by the test, keyed by auto-buy config id.
#[derive(Clone, Default)]
pub struct FixedDeficits {
    deficits: Arc<Mutex<HashMap<i64, Vec<StockpileDeficit>>>>,
}

impl FixedDeficits {
    pub fn set(&self, config_id: i64, deficits: Vec<StockpileDeficit>) {
        self.deficits.lock().unwrap().insert(config_id, deficits);
    }

    /// A deficit line without overrides.
    pub fn line(type_id: i64, deficit: i64) -> StockpileDeficit {
        StockpileDeficit {
            type_id,
            desired_quantity: deficit.max(0),
            current_quantity: 0,
            deficit,
            price_source: None,
            price_percentage: None,
        }
    }
}

impl StockpileDeficits for FixedDeficits {
    async fn deficits_for_config(&self, config: &AutoBuyConfig) -> Result<Vec<StockpileDeficit>, UpstreamError> {
        self.deficits.lock().unwrap().get(&config.id).cloned().ok_or_else(|| UpstreamError::StockpileDeficits {
            config_id: config.id,
            reason: "no stockpile data".into(),
        })
    }
}
