//! Adapts the game API client to the engine's [`ContractHistory`] collaborator.
use chrono::Utc;
use esi_tools::{EsiApi, EsiApiError, EsiConfig, EsiContract};
use log::*;
use serde::de::DeserializeOwned;
use trade_common::Secret;
use trade_engine::{
    db_types::{AccessCredential, ContractStatus, ContractType, ExternalContract},
    traits::{ContractHistory, UpstreamError},
};

#[derive(Clone)]
pub struct EsiContractHistory {
    api: EsiApi,
}

impl EsiContractHistory {
    pub fn new(api: EsiApi) -> Self {
        Self { api }
    }

    pub fn from_config(config: EsiConfig) -> Result<Self, EsiApiError> {
        Ok(Self::new(EsiApi::new(config)?))
    }
}

impl ContractHistory for EsiContractHistory {
    async fn character_contracts(
        &self,
        character_id: i64,
        credential: &AccessCredential,
    ) -> Result<Vec<ExternalContract>, UpstreamError> {
        let contracts =
            self.api.character_contracts(character_id, credential.access_token.reveal()).await.map_err(|e| {
                UpstreamError::ContractHistory { owner: format!("character {character_id}"), reason: e.to_string() }
            })?;
        Ok(contracts.into_iter().map(to_external_contract).collect())
    }

    async fn corporation_contracts(
        &self,
        corporation_id: i64,
        credential: &AccessCredential,
    ) -> Result<Vec<ExternalContract>, UpstreamError> {
        let contracts =
            self.api.corporation_contracts(corporation_id, credential.access_token.reveal()).await.map_err(|e| {
                UpstreamError::ContractHistory { owner: format!("corporation {corporation_id}"), reason: e.to_string() }
            })?;
        Ok(contracts.into_iter().map(to_external_contract).collect())
    }

    async fn refresh_credential(
        &self,
        character_id: i64,
        credential: &AccessCredential,
    ) -> Result<AccessCredential, UpstreamError> {
        let token = self
            .api
            .refresh_token(credential.refresh_token.reveal())
            .await
            .map_err(|e| UpstreamError::CredentialRefresh { character_id, reason: e.to_string() })?;
        let expires_at = token.expires_at(Utc::now());
        debug!("🔑️ Access token of character {character_id} refreshed. It expires at {expires_at}");
        Ok(AccessCredential {
            access_token: Secret::new(token.access_token),
            refresh_token: Secret::new(token.refresh_token),
            expires_at,
        })
    }
}

pub fn to_external_contract(contract: EsiContract) -> ExternalContract {
    ExternalContract {
        contract_id: contract.contract_id,
        title: contract.title,
        contract_type: parse_tag(&contract.contract_type).unwrap_or(ContractType::Unknown),
        status: parse_tag(&contract.status).unwrap_or(ContractStatus::Unknown),
    }
}

/// Decodes a snake_case tag into one of the engine's enums.
fn parse_tag<T: DeserializeOwned>(tag: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(tag.to_string())).ok()
}
