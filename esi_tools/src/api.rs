use std::sync::Arc;

use log::*;
use reqwest::{header::HeaderMap, Client, Method, Response};
use serde::de::DeserializeOwned;

use crate::{config::EsiConfig, data_objects::EsiContract, EsiApiError, TokenResponse};

/// Paged endpoints report their page count in this header.
const PAGES_HEADER: &str = "x-pages";

#[derive(Clone)]
pub struct EsiApi {
    config: EsiConfig,
    client: Arc<Client>,
}

impl EsiApi {
    pub fn new(config: EsiConfig) -> Result<Self, EsiApiError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| EsiApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    async fn authorized_get(&self, path: &str, page: u32, access_token: &str) -> Result<Response, EsiApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url} (page {page})");
        let response = self
            .client
            .request(Method::GET, url)
            .bearer_auth(access_token)
            .query(&[("page", page)])
            .send()
            .await
            .map_err(|e| EsiApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| EsiApiError::RestResponseError(e.to_string()))?;
            Err(EsiApiError::QueryError { status, message })
        }
    }

    /// Fetches every page of a paged endpoint.
    pub async fn paged_query<T: DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
    ) -> Result<Vec<T>, EsiApiError> {
        let mut result = Vec::new();
        let mut page = 1;
        loop {
            let response = self.authorized_get(path, page, access_token).await?;
            let pages = page_count(response.headers());
            let items = response.json::<Vec<T>>().await.map_err(|e| EsiApiError::JsonError(e.to_string()))?;
            result.extend(items);
            if page >= pages {
                break;
            }
            page += 1;
        }
        Ok(result)
    }

    pub async fn character_contracts(
        &self,
        character_id: i64,
        access_token: &str,
    ) -> Result<Vec<EsiContract>, EsiApiError> {
        let path = format!("/characters/{character_id}/contracts/");
        let contracts = self.paged_query::<EsiContract>(&path, access_token).await?;
        debug!("Fetched {} contracts of character {character_id}", contracts.len());
        Ok(contracts)
    }

    pub async fn corporation_contracts(
        &self,
        corporation_id: i64,
        access_token: &str,
    ) -> Result<Vec<EsiContract>, EsiApiError> {
        let path = format!("/corporations/{corporation_id}/contracts/");
        let contracts = self.paged_query::<EsiContract>(&path, access_token).await?;
        debug!("Fetched {} contracts of corporation {corporation_id}", contracts.len());
        Ok(contracts)
    }

    /// Exchanges a refresh token for a new access token. The login server may rotate the refresh token, so callers
    /// must store the one returned here.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, EsiApiError> {
        debug!("Refreshing access token");
        let response = self
            .client
            .request(Method::POST, self.config.login_url.as_str())
            .basic_auth(&self.config.client_id, Some(self.config.client_secret.reveal()))
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .send()
            .await
            .map_err(|e| EsiApiError::RestResponseError(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| EsiApiError::RestResponseError(e.to_string()))?;
            return Err(EsiApiError::TokenRefreshError { status, message });
        }
        response.json::<TokenResponse>().await.map_err(|e| EsiApiError::JsonError(e.to_string()))
    }
}

/// Missing or malformed headers count as a single page.
fn page_count(headers: &HeaderMap) -> u32 {
    headers
        .get(PAGES_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(1)
        .max(1)
}

#[cfg(test)]
mod test {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn pages_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(page_count(&headers), 1);
        headers.insert(PAGES_HEADER, HeaderValue::from_static("3"));
        assert_eq!(page_count(&headers), 3);
        headers.insert(PAGES_HEADER, HeaderValue::from_static("0"));
        assert_eq!(page_count(&headers), 1);
        headers.insert(PAGES_HEADER, HeaderValue::from_static("many"));
        assert_eq!(page_count(&headers), 1);
    }

    #[test]
    fn urls() {
        let config = EsiConfig { base_url: "https://esi.example.com/latest".into(), ..Default::default() };
        let api = EsiApi::new(config).unwrap();
        assert_eq!(api.url("/characters/1/contracts/"), "https://esi.example.com/latest/characters/1/contracts/");
    }
}
