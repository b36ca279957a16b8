//! Narrow interfaces to the collaborators that live outside the engine.
use crate::{
    db_types::{AccessCredential, AutoBuyConfig, Character, ContainerItem, ExternalContract, OwnerType, StockpileDeficit},
    traits::{StoreError, UpstreamError},
};

/// Current container contents, as last seen by the asset importer.
#[allow(async_fn_in_trait)]
pub trait AssetSnapshot {
    /// The distinct types in the container with their total quantity.
    async fn items_in_container(
        &self,
        owner_type: OwnerType,
        owner_id: i64,
        container_id: i64,
    ) -> Result<Vec<ContainerItem>, UpstreamError>;
}

#[allow(async_fn_in_trait)]
pub trait StockpileDeficits {
    /// At most one line per item type covered by the config, including types whose target is already met
    /// (`deficit <= 0`).
    async fn deficits_for_config(&self, config: &AutoBuyConfig) -> Result<Vec<StockpileDeficit>, UpstreamError>;
}

/// Read access to in-game contract histories.
#[allow(async_fn_in_trait)]
pub trait ContractHistory {
    async fn character_contracts(
        &self,
        character_id: i64,
        credential: &AccessCredential,
    ) -> Result<Vec<ExternalContract>, UpstreamError>;

    /// Corporation contracts, read through one of the corporation's characters.
    async fn corporation_contracts(
        &self,
        corporation_id: i64,
        credential: &AccessCredential,
    ) -> Result<Vec<ExternalContract>, UpstreamError>;

    /// Exchanges the refresh token for a new access credential.
    async fn refresh_credential(
        &self,
        character_id: i64,
        credential: &AccessCredential,
    ) -> Result<AccessCredential, UpstreamError>;
}

/// The characters a user has linked, and their game API credentials.
#[allow(async_fn_in_trait)]
pub trait CharacterManagement {
    async fn characters_for_user(&self, user_id: i64) -> Result<Vec<Character>, StoreError>;

    async fn upsert_character(&self, character: &Character) -> Result<(), StoreError>;

    async fn update_character_credential(
        &self,
        character_id: i64,
        credential: &AccessCredential,
    ) -> Result<(), StoreError>;
}

/// Display names used to enrich notifications.
#[allow(async_fn_in_trait)]
pub trait NameLookup {
    async fn user_name(&self, user_id: i64) -> Result<Option<String>, StoreError>;
    async fn type_name(&self, type_id: i64) -> Result<Option<String>, StoreError>;
    async fn location_name(&self, location_id: i64) -> Result<Option<String>, StoreError>;
}
