use log::*;
use trade_common::Secret;

pub const DEFAULT_ESI_BASE_URL: &str = "https://esi.evetech.net/latest";
pub const DEFAULT_ESI_LOGIN_URL: &str = "https://login.eveonline.com/v2/oauth/token";

#[derive(Debug, Clone)]
pub struct EsiConfig {
    pub base_url: String,
    /// The OAuth token endpoint used to refresh access tokens.
    pub login_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub user_agent: String,
}

impl Default for EsiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ESI_BASE_URL.to_string(),
            login_url: DEFAULT_ESI_LOGIN_URL.to_string(),
            client_id: String::default(),
            client_secret: Secret::default(),
            user_agent: format!("trade_worker/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl EsiConfig {
    pub fn new_from_env_or_default() -> Self {
        let defaults = Self::default();
        let base_url = std::env::var("TRD_ESI_BASE_URL").unwrap_or_else(|_| {
            info!("🪛️ TRD_ESI_BASE_URL not set, using {}", defaults.base_url);
            defaults.base_url
        });
        let login_url = std::env::var("TRD_ESI_LOGIN_URL").unwrap_or_else(|_| {
            info!("🪛️ TRD_ESI_LOGIN_URL not set, using {}", defaults.login_url);
            defaults.login_url
        });
        let client_id = std::env::var("TRD_ESI_CLIENT_ID").unwrap_or_else(|_| {
            warn!("🪛️ TRD_ESI_CLIENT_ID not set. Expired access tokens cannot be refreshed.");
            defaults.client_id
        });
        let client_secret = std::env::var("TRD_ESI_CLIENT_SECRET").map(Secret::new).unwrap_or_else(|_| {
            warn!("🪛️ TRD_ESI_CLIENT_SECRET not set. Expired access tokens cannot be refreshed.");
            defaults.client_secret
        });
        let user_agent = std::env::var("TRD_ESI_USER_AGENT").unwrap_or(defaults.user_agent);
        Self { base_url: base_url.trim_end_matches('/').to_string(), login_url, client_id, client_secret, user_agent }
    }
}
