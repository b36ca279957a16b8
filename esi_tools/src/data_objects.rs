use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A contract as returned by the character and corporation contract endpoints.
///
/// Only the fields needed to settle purchases are kept. `contract_type` and `status` are passed through as strings;
/// new values are added upstream from time to time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsiContract {
    pub contract_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type")]
    pub contract_type: String,
    pub status: String,
    pub issuer_id: i64,
    pub issuer_corporation_id: i64,
    pub assignee_id: i64,
    #[serde(default)]
    pub acceptor_id: i64,
    #[serde(default)]
    pub for_corporation: bool,
    pub date_issued: DateTime<Utc>,
    #[serde(default)]
    pub date_completed: Option<DateTime<Utc>>,
}

/// The body of a successful OAuth refresh-token grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
    pub token_type: String,
    pub refresh_token: String,
}

impl TokenResponse {
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        issued_at + Duration::seconds(self.expires_in)
    }
}
